use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// 32-byte SHA-256 digest, used for public-key hashes, identity commitments
/// and VDF input hashes alike.
pub type HashValue = [u8; 32];

pub fn hash(data: &[u8]) -> HashValue {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Set of byte strings, used to deduplicate ballot serial numbers.
#[derive(Default)]
pub struct BytesSet {
    inner: HashSet<Vec<u8>>,
}

impl BytesSet {
    pub fn new() -> Self {
        BytesSet::default()
    }

    pub fn contains(&self, p: &[u8]) -> bool {
        self.inner.contains(p)
    }

    /// Returns false if the value was already present.
    pub fn add(&mut self, p: &[u8]) -> bool {
        self.inner.insert(p.to_vec())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable() {
        assert_eq!(hash(b"abc"), hash(b"abc"));
        assert_ne!(hash(b"abc"), hash(b"abd"));
    }

    #[test]
    fn bytes_set() {
        let mut set = BytesSet::new();
        assert!(!set.contains(b"serial"));
        assert!(set.add(b"serial"));
        assert!(set.contains(b"serial"));
        assert!(!set.add(b"serial"));
        assert_eq!(set.len(), 1);
    }
}
