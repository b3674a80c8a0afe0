//! Typed participant identity keys.
//!
//! A public key is a tag byte naming the scheme followed by the raw key
//! material. The ed25519 variant signs messages directly; the Tezos variant
//! signs the SHA-256 pre-hash of the message, and its string form is the
//! native Tezos `edpk…` base58-check encoding.

use crate::*;
use ed25519_dalek::{
    ExpandedSecretKey, Keypair, PublicKey as DalekPublicKey, SecretKey as DalekSecretKey,
    Signature, Verifier, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH,
};
use num_enum::TryFromPrimitive;
use std::convert::TryFrom;

/// Prefix bytes forcing the readable `EPK` prefix in check-summed base32.
const ED25519_STRING_PREFIX: [u8; 2] = [238, 78];

/// Tezos ed25519 public-key prefix (`edpk`).
const TEZOS_EDPK_PREFIX: [u8; 4] = [13, 15, 37, 217];

#[derive(TryFromPrimitive, Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyType {
    Ed25519 = 1,
    Tezos = 2,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicKey(Vec<u8>);

#[derive(Debug, Clone)]
pub struct PrivateKey {
    public: PublicKey,
    secret: Vec<u8>,
}

impl PublicKey {
    fn from_parts(key_type: KeyType, material: &[u8]) -> Self {
        let mut p = Vec::with_capacity(material.len() + 1);
        p.push(key_type as u8);
        p.extend_from_slice(material);
        PublicKey(p)
    }

    /// Parse a tagged public key from its raw byte form.
    pub fn from_bytes(p: &[u8]) -> Result<Self> {
        if p.is_empty() {
            return Err(Error::InvalidKeyLength);
        }
        let key_type = KeyType::try_from(p[0]).map_err(|_| Error::UnknownKeyType)?;
        if p.len() != PUBLIC_KEY_LENGTH + 1 {
            return Err(Error::InvalidKeyLength);
        }
        Ok(PublicKey::from_parts(key_type, &p[1..]))
    }

    pub fn key_type(&self) -> Result<KeyType> {
        if self.0.is_empty() {
            return Err(Error::InvalidKeyLength);
        }
        KeyType::try_from(self.0[0]).map_err(|_| Error::UnknownKeyType)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn material(&self) -> &[u8] {
        &self.0[1..]
    }

    /// Hash of the tagged key bytes; the eligibility roster keys on this.
    pub fn hash(&self) -> HashValue {
        hash(&self.0)
    }

    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> Result<()> {
        let key_type = self.key_type()?;
        let pk = DalekPublicKey::from_bytes(self.material())
            .map_err(|_| Error::InvalidKeyLength)?;
        let sig = Signature::try_from(sig).map_err(|_| Error::InvalidSignature)?;
        let verified = match key_type {
            KeyType::Ed25519 => pk.verify(msg, &sig),
            KeyType::Tezos => pk.verify(&hash(msg), &sig),
        };
        verified.map_err(|_| Error::InvalidSignature)
    }

    pub fn encode(&self) -> Result<String> {
        match self.key_type()? {
            KeyType::Ed25519 => {
                let mut p = Vec::with_capacity(self.0.len() + 1);
                p.extend_from_slice(&ED25519_STRING_PREFIX);
                p.extend_from_slice(self.material());
                Ok(base32c::check_encode(&p))
            }
            KeyType::Tezos => {
                let mut p = Vec::with_capacity(self.0.len() + 3);
                p.extend_from_slice(&TEZOS_EDPK_PREFIX);
                p.extend_from_slice(self.material());
                Ok(bs58::encode(p).with_check().into_string())
            }
        }
    }

    /// Parse either string form, re-stamping the scheme tag byte.
    pub fn parse(s: &str) -> Result<PublicKey> {
        if s.starts_with("EPK") {
            let p = base32c::check_decode(s)?;
            if p.len() < 3 || p[0..2] != ED25519_STRING_PREFIX {
                return Err(Error::UnknownKeyType);
            }
            if p.len() != PUBLIC_KEY_LENGTH + 2 {
                return Err(Error::InvalidKeyLength);
            }
            Ok(PublicKey::from_parts(KeyType::Ed25519, &p[2..]))
        } else if s.starts_with("edpk") {
            let p = bs58::decode(s).with_check(None).into_vec()?;
            if p.len() < 4 || p[0..4] != TEZOS_EDPK_PREFIX {
                return Err(Error::UnknownKeyType);
            }
            if p.len() != PUBLIC_KEY_LENGTH + 4 {
                return Err(Error::InvalidKeyLength);
            }
            Ok(PublicKey::from_parts(KeyType::Tezos, &p[4..]))
        } else {
            Err(Error::UnknownKeyType)
        }
    }
}

impl PrivateKey {
    /// Generate a fresh key with a cryptographic RNG.
    pub fn generate(key_type: KeyType) -> Result<PrivateKey> {
        let mut csprng = rand::rngs::OsRng {};
        let Keypair { public, secret } = Keypair::generate(&mut csprng);
        Ok(PrivateKey {
            public: PublicKey::from_parts(key_type, public.as_bytes()),
            secret: secret.as_bytes().to_vec(),
        })
    }

    /// Reassemble a key from persisted parts.
    pub fn from_parts(public: PublicKey, secret: Vec<u8>) -> Result<PrivateKey> {
        public.key_type()?;
        if secret.len() != SECRET_KEY_LENGTH {
            return Err(Error::InvalidKeyLength);
        }
        Ok(PrivateKey { public, secret })
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn key_type(&self) -> Result<KeyType> {
        self.public.key_type()
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn sign(&self, msg: &[u8]) -> Result<Vec<u8>> {
        let secret =
            DalekSecretKey::from_bytes(&self.secret).map_err(|_| Error::InvalidKeyLength)?;
        let public: DalekPublicKey = (&secret).into();
        let expanded: ExpandedSecretKey = (&secret).into();
        let sig = match self.key_type()? {
            KeyType::Ed25519 => expanded.sign(msg, &public),
            KeyType::Tezos => expanded.sign(&hash(msg), &public),
        };
        Ok(sig.to_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        for key_type in &[KeyType::Ed25519, KeyType::Tezos] {
            let priv_key = PrivateKey::generate(*key_type).unwrap();
            let sig = priv_key.sign(b"ballot bytes").unwrap();
            priv_key.public().verify(b"ballot bytes", &sig).unwrap();

            assert!(matches!(
                priv_key.public().verify(b"other bytes", &sig),
                Err(Error::InvalidSignature)
            ));
        }
    }

    #[test]
    fn signatures_do_not_cross_schemes() {
        // Same underlying curve, but the Tezos variant signs a pre-hash.
        let priv_key = PrivateKey::generate(KeyType::Ed25519).unwrap();
        let tezos_pub = PublicKey::from_parts(KeyType::Tezos, priv_key.public().material());
        let sig = priv_key.sign(b"msg").unwrap();
        assert!(tezos_pub.verify(b"msg", &sig).is_err());
    }

    #[test]
    fn encode_parse_round_trip() {
        let ed = PrivateKey::generate(KeyType::Ed25519).unwrap();
        let s = ed.public().encode().unwrap();
        assert!(s.starts_with("EPK"), "got {}", s);
        assert_eq!(&PublicKey::parse(&s).unwrap(), ed.public());

        let tz = PrivateKey::generate(KeyType::Tezos).unwrap();
        let s = tz.public().encode().unwrap();
        assert!(s.starts_with("edpk"), "got {}", s);
        assert_eq!(&PublicKey::parse(&s).unwrap(), tz.public());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            PublicKey::parse("spsig1aaaa"),
            Err(Error::UnknownKeyType)
        ));
        assert!(PublicKey::parse("EPK0000").is_err());
    }

    #[test]
    fn tagged_bytes_round_trip() {
        let key = PrivateKey::generate(KeyType::Ed25519).unwrap();
        let parsed = PublicKey::from_bytes(key.public().as_bytes()).unwrap();
        assert_eq!(&parsed, key.public());

        assert!(matches!(
            PublicKey::from_bytes(&[]),
            Err(Error::InvalidKeyLength)
        ));
        assert!(matches!(
            PublicKey::from_bytes(&[9; 33]),
            Err(Error::UnknownKeyType)
        ));
        assert!(matches!(
            PublicKey::from_bytes(&[1; 5]),
            Err(Error::InvalidKeyLength)
        ));
    }
}
