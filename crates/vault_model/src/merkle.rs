//! Merkle inclusion proofs for reward distributions
//!
//! Leaves and interior nodes are SHA-256 with distinct domain tags. Pairs
//! are hashed in sorted order, so a proof is just the list of siblings
//! with no left/right flags. An odd node at the end of a layer is carried
//! up unchanged and contributes no proof element at that level.

use alloc::vec::Vec;
use sha2::{Digest, Sha256};

pub type Hash = [u8; 32];

/// Domain tag for claim leaves
pub const LEAF_DOMAIN_V1: &[u8] = b"LOCKVAULT_CLAIM_LEAF_V1";

/// Domain tag for interior nodes
pub const NODE_DOMAIN_V1: &[u8] = b"LOCKVAULT_CLAIM_NODE_V1";

/// Longest accepted proof (2^32 leaves)
pub const MAX_PROOF_DEPTH: usize = 32;

/// Leaf commitment for one distribution entry
///
/// `H(LEAF_DOMAIN || token || index || account || amount)`, integers little-endian.
pub fn claim_leaf(token: &[u8; 32], index: u64, account: &[u8; 32], amount: u128) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(LEAF_DOMAIN_V1);
    hasher.update(token);
    hasher.update(index.to_le_bytes());
    hasher.update(account);
    hasher.update(amount.to_le_bytes());
    hasher.finalize().into()
}

/// Hash two sibling nodes in sorted order
pub fn hash_pair(a: &Hash, b: &Hash) -> Hash {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = Sha256::new();
    hasher.update(NODE_DOMAIN_V1);
    hasher.update(lo);
    hasher.update(hi);
    hasher.finalize().into()
}

/// Check that `leaf` is included under `root` via `path`
pub fn verify(root: &Hash, leaf: &Hash, path: &[Hash]) -> bool {
    if path.len() > MAX_PROOF_DEPTH {
        log::debug!("proof rejected: depth {} above {}", path.len(), MAX_PROOF_DEPTH);
        return false;
    }
    let computed = path.iter().fold(*leaf, |acc, sibling| hash_pair(&acc, sibling));
    computed == *root
}

/// Root over `leaves`; the all-zero hash for an empty set
pub fn compute_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return [0u8; 32];
    }
    let mut layer: Vec<Hash> = leaves.to_vec();
    while layer.len() > 1 {
        layer = next_layer(&layer);
    }
    layer[0]
}

/// Sibling path for the leaf at `index`
pub fn proof_for(leaves: &[Hash], index: usize) -> Option<Vec<Hash>> {
    if index >= leaves.len() {
        return None;
    }
    let mut path = Vec::new();
    let mut layer: Vec<Hash> = leaves.to_vec();
    let mut idx = index;
    while layer.len() > 1 {
        let sibling = idx ^ 1;
        if sibling < layer.len() {
            path.push(layer[sibling]);
        }
        layer = next_layer(&layer);
        idx /= 2;
    }
    Some(path)
}

fn next_layer(layer: &[Hash]) -> Vec<Hash> {
    let mut out = Vec::with_capacity((layer.len() + 1) / 2);
    for pair in layer.chunks(2) {
        if pair.len() == 2 {
            out.push(hash_pair(&pair[0], &pair[1]));
        } else {
            out.push(pair[0]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: u64) -> Vec<Hash> {
        let token = [7u8; 32];
        let account = [9u8; 32];
        (0..n).map(|i| claim_leaf(&token, i, &account, 1_000 + i as u128)).collect()
    }

    #[test]
    fn test_every_leaf_verifies() {
        for n in [1u64, 2, 3, 5, 8, 13] {
            let set = leaves(n);
            let root = compute_root(&set);
            for i in 0..set.len() {
                let path = proof_for(&set, i).unwrap();
                assert!(verify(&root, &set[i], &path), "leaf {} of {}", i, n);
            }
        }
    }

    #[test]
    fn test_wrong_leaf_rejected() {
        let set = leaves(5);
        let root = compute_root(&set);
        let path = proof_for(&set, 2).unwrap();
        assert!(!verify(&root, &set[3], &path));

        let forged = claim_leaf(&[7u8; 32], 2, &[9u8; 32], 999_999);
        assert!(!verify(&root, &forged, &path));
    }

    #[test]
    fn test_leaf_binds_every_field() {
        let base = claim_leaf(&[1u8; 32], 0, &[2u8; 32], 5);
        assert_ne!(base, claim_leaf(&[3u8; 32], 0, &[2u8; 32], 5));
        assert_ne!(base, claim_leaf(&[1u8; 32], 1, &[2u8; 32], 5));
        assert_ne!(base, claim_leaf(&[1u8; 32], 0, &[4u8; 32], 5));
        assert_ne!(base, claim_leaf(&[1u8; 32], 0, &[2u8; 32], 6));
    }

    #[test]
    fn test_oversized_proof_rejected() {
        let leaf = [1u8; 32];
        let path = alloc::vec![[2u8; 32]; MAX_PROOF_DEPTH + 1];
        let root = path.iter().fold(leaf, |acc, s| hash_pair(&acc, s));
        assert!(!verify(&root, &leaf, &path));
    }

    #[test]
    fn test_proof_out_of_range() {
        assert!(proof_for(&leaves(3), 3).is_none());
        assert_eq!(compute_root(&[]), [0u8; 32]);
    }
}

#[cfg(kani)]
mod proofs {
    use super::*;

    /// Sorted pair hashing is symmetric
    #[kani::proof]
    #[kani::unwind(3)]
    fn proof_hash_pair_symmetric() {
        let a: Hash = kani::any();
        let b: Hash = kani::any();
        assert!(hash_pair(&a, &b) == hash_pair(&b, &a));
    }
}
