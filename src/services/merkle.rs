//! Storage proof verification.
//!
//! A proof is a nested array whose innermost single-element array holds the
//! challenge response. Each enclosing level pairs the sub-proof with one
//! sibling hash; the sub-proof's position says which side it hashes on.
//! The leaf is `SHA-256(response)` and every parent is
//! `SHA-256(left || right)`. A proof passes when both the recomputed root
//! and the number of pair levels match what was committed at contract time.

use sha2::{Digest, Sha256};

use crate::domain::errors::ProofError;
use crate::domain::models::{ProofElement, StorageProof};

/// Deepest proof accepted. Real trees are far shallower.
pub const MAX_PROOF_DEPTH: usize = 64;

/// Root and depth recomputed from a proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofRoot {
    pub root: [u8; 32],
    pub depth: u32,
}

impl ProofRoot {
    pub fn root_hex(&self) -> String {
        hex::encode(self.root)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Recompute the Merkle root a proof commits to.
pub fn compute_root(proof: &StorageProof) -> Result<ProofRoot, ProofError> {
    let mut levels: Vec<(Side, &str)> = Vec::new();
    let mut current = proof.root();

    let response = loop {
        let ProofElement::Branch(items) = current else {
            return Err(ProofError::Malformed("expected an array".to_string()));
        };

        match items.as_slice() {
            [ProofElement::Hash(response)] => break response,
            [ProofElement::Branch(_), ProofElement::Hash(sibling)] => {
                levels.push((Side::Left, sibling.as_str()));
                current = &items[0];
            }
            [ProofElement::Hash(sibling), ProofElement::Branch(_)] => {
                levels.push((Side::Right, sibling.as_str()));
                current = &items[1];
            }
            [ProofElement::Branch(_)] => {
                return Err(ProofError::Malformed("response must be a string".to_string()));
            }
            [_, _] => {
                return Err(ProofError::Malformed(
                    "each level needs exactly one sub-proof and one sibling".to_string(),
                ));
            }
            other => {
                return Err(ProofError::Malformed(format!(
                    "level has {} elements",
                    other.len()
                )));
            }
        }

        if levels.len() > MAX_PROOF_DEPTH {
            return Err(ProofError::TooDeep(MAX_PROOF_DEPTH));
        }
    };

    let mut node: [u8; 32] = Sha256::digest(hex::decode(response)?).into();
    for (side, sibling) in levels.iter().rev() {
        let sibling = decode_hash(sibling)?;
        let mut hasher = Sha256::new();
        match side {
            Side::Left => {
                hasher.update(node);
                hasher.update(sibling);
            }
            Side::Right => {
                hasher.update(sibling);
                hasher.update(node);
            }
        }
        node = hasher.finalize().into();
    }

    Ok(ProofRoot {
        root: node,
        // Bounded by MAX_PROOF_DEPTH
        depth: levels.len() as u32,
    })
}

/// Check `proof` against the root and depth committed at contract time.
///
/// `Ok(false)` means the proof is well formed but proves something else.
pub fn verify_storage_proof(
    proof: &StorageProof,
    expected_root: &str,
    expected_depth: u32,
) -> Result<bool, ProofError> {
    let computed = compute_root(proof)?;
    Ok(computed.depth == expected_depth && computed.root_hex().eq_ignore_ascii_case(expected_root))
}

fn decode_hash(s: &str) -> Result<[u8; 32], ProofError> {
    let bytes = hex::decode(s)?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
        ProofError::Malformed(format!("sibling is {} bytes, expected 32", bytes.len()))
    })
}
