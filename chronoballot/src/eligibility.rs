use crate::*;
use std::collections::HashMap;

const ELL_MAGIC: u32 = 0x454c4c01;

/// Public roster of participants admitted to an election: an ordered list of
/// (public-key-hash, id-commitment) pairs with unique public-key hashes.
/// Built during election setup, serialized into the parameters, immutable
/// thereafter.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct EligibilityList {
    public_key_hashes: Vec<HashValue>,
    id_commitments: HashMap<HashValue, HashValue>,
}

impl EligibilityList {
    pub fn new() -> Self {
        EligibilityList::default()
    }

    /// Returns false if the public-key hash is already present; the existing
    /// entry is never overwritten.
    pub fn add(&mut self, pkh: HashValue, id_commitment: HashValue) -> bool {
        if self.id_commitments.contains_key(&pkh) {
            return false;
        }
        self.public_key_hashes.push(pkh);
        self.id_commitments.insert(pkh, id_commitment);
        true
    }

    pub fn contains(&self, pkh: &HashValue) -> bool {
        self.id_commitments.contains_key(pkh)
    }

    pub fn id_commitment(&self, pkh: &HashValue) -> Option<&HashValue> {
        self.id_commitments.get(pkh)
    }

    pub fn len(&self) -> usize {
        self.public_key_hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.public_key_hashes.is_empty()
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut w = BufferWriter::new();
        w.write_uint32(ELL_MAGIC);
        for pkh in &self.public_key_hashes {
            w.write(pkh);
            w.write(&self.id_commitments[pkh]);
        }
        w.into_bytes()
    }

    /// Pairs run to the end of the buffer; the magic makes the encoding
    /// self-delimiting when it sits at the tail of a larger object.
    pub fn from_bytes(p: &[u8]) -> Result<Self> {
        let mut r = BufferReader::new(p);
        if r.read_uint32()? != ELL_MAGIC {
            return Err(Error::UnknownMagic);
        }
        let mut list = EligibilityList::new();
        while r.len() != 0 {
            let pkh = r.read_32()?;
            let id_commitment = r.read_32()?;
            if !list.add(pkh, id_commitment) {
                return Err(Error::DuplicateKey);
            }
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkh(n: u8) -> HashValue {
        hash(&[n])
    }

    #[test]
    fn add_and_lookup() {
        let mut list = EligibilityList::new();
        assert!(!list.contains(&pkh(1)));
        assert!(list.add(pkh(1), pkh(101)));
        assert!(list.contains(&pkh(1)));
        assert_eq!(list.id_commitment(&pkh(1)), Some(&pkh(101)));

        // Second add with the same pkh is refused and does not overwrite.
        assert!(!list.add(pkh(1), pkh(102)));
        assert_eq!(list.id_commitment(&pkh(1)), Some(&pkh(101)));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn bytes_round_trip() {
        let mut list = EligibilityList::new();
        for i in 0..5 {
            list.add(pkh(i), pkh(100 + i));
        }
        let decoded = EligibilityList::from_bytes(&list.bytes()).unwrap();
        assert_eq!(decoded, list);
    }

    #[test]
    fn rejects_bad_magic_and_duplicates() {
        assert!(matches!(
            EligibilityList::from_bytes(&[0, 0, 0, 0]),
            Err(Error::UnknownMagic)
        ));

        let mut w = BufferWriter::new();
        w.write_uint32(0x454c4c01);
        w.write(&pkh(1));
        w.write(&pkh(101));
        w.write(&pkh(1));
        w.write(&pkh(102));
        assert!(matches!(
            EligibilityList::from_bytes(&w.into_bytes()),
            Err(Error::DuplicateKey)
        ));
    }

    #[test]
    fn rejects_truncated_pair() {
        let mut w = BufferWriter::new();
        w.write_uint32(0x454c4c01);
        w.write(&pkh(1));
        w.write(&pkh(101)[..16]);
        assert!(matches!(
            EligibilityList::from_bytes(&w.into_bytes()),
            Err(Error::ShortBuffer)
        ));
    }
}
