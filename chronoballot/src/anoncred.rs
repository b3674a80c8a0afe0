//! Anonymous credential system contracts.
//!
//! The election state machine only ever talks to these traits: a secret
//! credential produces a public credential and a stable serial number, a set
//! of public credentials signs and verifies by serial number, and the system
//! reads and aggregates credential bytes. The production zk scheme lives
//! behind this boundary; the constructor receives whichever system the
//! process entry point loaded.

use crate::*;
use ed25519_dalek::{
    ExpandedSecretKey, Keypair, PublicKey as DalekPublicKey, SecretKey as DalekSecretKey,
    Signature, Verifier, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH, SIGNATURE_LENGTH,
};
use std::collections::HashSet;
use std::convert::TryFrom;

pub trait SecretCredential {
    fn bytes(&self) -> Vec<u8>;
    fn public(&self) -> Result<Box<dyn PublicCredential>>;
    /// Stable per-secret identifier, recoverable from any signature by this
    /// credential. Two signatures from the same secret carry the same value.
    fn serial_no(&self) -> Vec<u8>;
}

pub trait PublicCredential {
    fn bytes(&self) -> Vec<u8>;
}

pub trait CredentialSet {
    fn len(&self) -> usize;
    /// Fails with `CredentialNotInSet` when the secret's public credential
    /// was not aggregated into this set.
    fn sign(&self, secret: &dyn SecretCredential, msg: &[u8]) -> Result<Vec<u8>>;
    fn verify(&self, serial_no: &[u8], sig: &[u8], msg: &[u8]) -> Result<()>;
}

pub trait CredentialSystem {
    fn generate_secret_credential(&self) -> Result<Box<dyn SecretCredential>>;
    fn read_secret_credential(&self, p: &[u8]) -> Result<Box<dyn SecretCredential>>;
    fn read_public_credential(&self, p: &[u8]) -> Result<Box<dyn PublicCredential>>;
    fn make_credential_set(
        &self,
        credentials: Vec<Box<dyn PublicCredential>>,
    ) -> Result<Box<dyn CredentialSet>>;
}

/// Ed25519-backed stand-in credential system for tests and local
/// deployments. It honors the full contract -- membership-gated signing,
/// stable serial numbers, serial recovery at verification -- but the serial
/// number is the hash of the member key, so signatures are linkable to set
/// members. Production elections substitute the zk-backed system.
pub struct MockCredentialSystem;

struct MockSecretCredential {
    seed: [u8; SECRET_KEY_LENGTH],
}

struct MockPublicCredential {
    key: [u8; PUBLIC_KEY_LENGTH],
}

struct MockCredentialSet {
    members: HashSet<[u8; PUBLIC_KEY_LENGTH]>,
}

impl MockSecretCredential {
    fn member_key(&self) -> Result<DalekPublicKey> {
        let secret =
            DalekSecretKey::from_bytes(&self.seed).map_err(|_| Error::InvalidKeyLength)?;
        Ok((&secret).into())
    }
}

impl SecretCredential for MockSecretCredential {
    fn bytes(&self) -> Vec<u8> {
        self.seed.to_vec()
    }

    fn public(&self) -> Result<Box<dyn PublicCredential>> {
        let key = self.member_key()?;
        Ok(Box::new(MockPublicCredential {
            key: key.to_bytes(),
        }))
    }

    fn serial_no(&self) -> Vec<u8> {
        match self.member_key() {
            Ok(key) => hash(key.as_bytes()).to_vec(),
            Err(_) => Vec::new(),
        }
    }
}

impl PublicCredential for MockPublicCredential {
    fn bytes(&self) -> Vec<u8> {
        self.key.to_vec()
    }
}

impl CredentialSet for MockCredentialSet {
    fn len(&self) -> usize {
        self.members.len()
    }

    fn sign(&self, secret: &dyn SecretCredential, msg: &[u8]) -> Result<Vec<u8>> {
        let public = secret.public()?;
        let mut key = [0u8; PUBLIC_KEY_LENGTH];
        key.copy_from_slice(&public.bytes());
        if !self.members.contains(&key) {
            return Err(Error::CredentialNotInSet);
        }

        let dalek_secret =
            DalekSecretKey::from_bytes(&secret.bytes()).map_err(|_| Error::InvalidKeyLength)?;
        let dalek_public: DalekPublicKey = (&dalek_secret).into();
        let expanded: ExpandedSecretKey = (&dalek_secret).into();
        let sig = expanded.sign(msg, &dalek_public);

        let mut out = Vec::with_capacity(PUBLIC_KEY_LENGTH + SIGNATURE_LENGTH);
        out.extend_from_slice(&key);
        out.extend_from_slice(&sig.to_bytes());
        Ok(out)
    }

    fn verify(&self, serial_no: &[u8], sig: &[u8], msg: &[u8]) -> Result<()> {
        if sig.len() != PUBLIC_KEY_LENGTH + SIGNATURE_LENGTH {
            return Err(Error::InvalidSignature);
        }
        let mut key = [0u8; PUBLIC_KEY_LENGTH];
        key.copy_from_slice(&sig[..PUBLIC_KEY_LENGTH]);
        if !self.members.contains(&key) {
            return Err(Error::InvalidSignature);
        }
        if hash(&key)[..] != serial_no[..] {
            return Err(Error::InvalidSignature);
        }
        let public =
            DalekPublicKey::from_bytes(&key).map_err(|_| Error::InvalidSignature)?;
        let sig = Signature::try_from(&sig[PUBLIC_KEY_LENGTH..])
            .map_err(|_| Error::InvalidSignature)?;
        public.verify(msg, &sig).map_err(|_| Error::InvalidSignature)
    }
}

impl CredentialSystem for MockCredentialSystem {
    fn generate_secret_credential(&self) -> Result<Box<dyn SecretCredential>> {
        let mut csprng = rand::rngs::OsRng {};
        let Keypair { secret, .. } = Keypair::generate(&mut csprng);
        Ok(Box::new(MockSecretCredential {
            seed: secret.to_bytes(),
        }))
    }

    fn read_secret_credential(&self, p: &[u8]) -> Result<Box<dyn SecretCredential>> {
        if p.len() != SECRET_KEY_LENGTH {
            return Err(Error::InvalidKeyLength);
        }
        let mut seed = [0u8; SECRET_KEY_LENGTH];
        seed.copy_from_slice(p);
        Ok(Box::new(MockSecretCredential { seed }))
    }

    fn read_public_credential(&self, p: &[u8]) -> Result<Box<dyn PublicCredential>> {
        if p.len() != PUBLIC_KEY_LENGTH {
            return Err(Error::InvalidKeyLength);
        }
        DalekPublicKey::from_bytes(p).map_err(|_| Error::InvalidKeyLength)?;
        let mut key = [0u8; PUBLIC_KEY_LENGTH];
        key.copy_from_slice(p);
        Ok(Box::new(MockPublicCredential { key }))
    }

    fn make_credential_set(
        &self,
        credentials: Vec<Box<dyn PublicCredential>>,
    ) -> Result<Box<dyn CredentialSet>> {
        let mut members = HashSet::with_capacity(credentials.len());
        for cred in credentials {
            let bytes = cred.bytes();
            if bytes.len() != PUBLIC_KEY_LENGTH {
                return Err(Error::InvalidKeyLength);
            }
            let mut key = [0u8; PUBLIC_KEY_LENGTH];
            key.copy_from_slice(&bytes);
            members.insert(key);
        }
        Ok(Box::new(MockCredentialSet { members }))
    }
}
