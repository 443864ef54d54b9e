//! InsuredId - identity of a party demanding coverage
//!
//! Pools address insureds by an opaque string (an account address, a DID, or
//! a policy reference). The ledger only needs equality, hashing and ordering.

use serde::{Deserialize, Serialize};

/// Identifier of an insured participating in a pool
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InsuredId(String);

impl InsuredId {
    /// Wrap an identifier string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InsuredId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for InsuredId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for InsuredId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
