//! Storage proof wire model.
//!
//! Farmers answer a challenge with a nested array proof:
//!
//! ```text
//! [ [ [ "<response>" ], "<sibling0>" ], "<sibling1>" ]
//! ```
//!
//! The innermost single-element array carries the challenge response; every
//! enclosing pair holds the sub-proof on one side and a sibling hash on the
//! other, so the position of the sub-proof encodes left/right.

use serde::{Deserialize, Serialize};

/// One element of a nested proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProofElement {
    /// Hex-encoded hash or challenge response
    Hash(String),
    /// Nested proof level
    Branch(Vec<ProofElement>),
}

/// A storage proof returned by a farmer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageProof(pub ProofElement);

impl StorageProof {
    pub fn root(&self) -> &ProofElement {
        &self.0
    }
}
