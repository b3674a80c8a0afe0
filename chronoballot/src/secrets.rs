//! Participant secret storage.
//!
//! The election state machine treats secrets as an opaque capability: the
//! identity key, and per election the secret credential, the cast signed
//! ballot and the VDF solution awaiting reveal. Writes happen only on
//! success paths, and the file-backed store writes atomically
//! (write-then-rename) so a crash mid-operation cannot corrupt it.

use crate::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ElectionInfo {
    pub invitation: String,
    pub title: String,
}

pub trait SecretsManager {
    fn get_private_key(&self) -> Result<PrivateKey>;
    /// Loads the stored secret credential for this election, generating and
    /// persisting a fresh one on first use.
    fn get_secret_credential(
        &self,
        sys: &dyn CredentialSystem,
        election: &ElectionId,
    ) -> Result<Box<dyn SecretCredential>>;
    fn get_ballot(&self, election: &ElectionId) -> Result<SignedBallot>;
    fn set_ballot(&self, election: &ElectionId, ballot: &SignedBallot) -> Result<()>;
    fn get_vdf_solution(&self, election: &ElectionId) -> Result<VdfSolution>;
    fn set_vdf_solution(&self, election: &ElectionId, sol: &VdfSolution) -> Result<()>;
    fn set_election(&self, election: &ElectionId, info: &ElectionInfo) -> Result<()>;
}

#[derive(Default)]
struct ElectionSecrets {
    info: Option<ElectionInfo>,
    secret_credential: Option<Vec<u8>>,
    ballot: Option<SignedBallot>,
    vdf_solution: Option<VdfSolution>,
}

/// Volatile secrets manager for tests and short-lived clients.
#[derive(Default)]
pub struct MemorySecretsManager {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    private_key: Option<PrivateKey>,
    elections: HashMap<ElectionId, ElectionSecrets>,
}

impl MemorySecretsManager {
    pub fn new() -> Self {
        MemorySecretsManager::default()
    }

    pub fn with_private_key(private_key: PrivateKey) -> Self {
        let manager = MemorySecretsManager::new();
        manager.set_private_key(private_key);
        manager
    }

    pub fn set_private_key(&self, private_key: PrivateKey) {
        self.inner.lock().unwrap().private_key = Some(private_key);
    }

    pub fn set_secret_credential(&self, election: &ElectionId, credential: &[u8]) {
        self.inner
            .lock()
            .unwrap()
            .elections
            .entry(*election)
            .or_default()
            .secret_credential = Some(credential.to_vec());
    }
}

impl SecretsManager for MemorySecretsManager {
    fn get_private_key(&self) -> Result<PrivateKey> {
        self.inner
            .lock()
            .unwrap()
            .private_key
            .clone()
            .ok_or(Error::MissingSecret("private key"))
    }

    fn get_secret_credential(
        &self,
        sys: &dyn CredentialSystem,
        election: &ElectionId,
    ) -> Result<Box<dyn SecretCredential>> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner.elections.entry(*election).or_default();
        if let Some(stored) = &entry.secret_credential {
            return sys.read_secret_credential(stored);
        }
        let fresh = sys.generate_secret_credential()?;
        entry.secret_credential = Some(fresh.bytes());
        Ok(fresh)
    }

    fn get_ballot(&self, election: &ElectionId) -> Result<SignedBallot> {
        self.inner
            .lock()
            .unwrap()
            .elections
            .get(election)
            .and_then(|e| e.ballot.clone())
            .ok_or(Error::MissingSecret("signed ballot"))
    }

    fn set_ballot(&self, election: &ElectionId, ballot: &SignedBallot) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .elections
            .entry(*election)
            .or_default()
            .ballot = Some(ballot.clone());
        Ok(())
    }

    fn get_vdf_solution(&self, election: &ElectionId) -> Result<VdfSolution> {
        self.inner
            .lock()
            .unwrap()
            .elections
            .get(election)
            .and_then(|e| e.vdf_solution.clone())
            .ok_or(Error::MissingSecret("VDF solution"))
    }

    fn set_vdf_solution(&self, election: &ElectionId, sol: &VdfSolution) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .elections
            .entry(*election)
            .or_default()
            .vdf_solution = Some(sol.clone());
        Ok(())
    }

    fn set_election(&self, election: &ElectionId, info: &ElectionInfo) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .elections
            .entry(*election)
            .or_default()
            .info = Some(info.clone());
        Ok(())
    }
}

// Disk layout: a single JSON document with hex-encoded blobs, keyed by the
// hex election id.

#[derive(Serialize, Deserialize, Default)]
struct SecretsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    private_key: Option<StoredKey>,
    #[serde(default)]
    elections: HashMap<String, StoredElection>,
}

#[derive(Serialize, Deserialize, Clone)]
struct StoredKey {
    key_type: u8,
    public: String,
    secret: String,
}

#[derive(Serialize, Deserialize, Default, Clone)]
struct StoredElection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info: Option<ElectionInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secret_credential: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ballot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vdf_solution: Option<StoredSolution>,
}

#[derive(Serialize, Deserialize, Clone)]
struct StoredSolution {
    input: String,
    output: String,
    proof: String,
}

/// File-backed secrets manager; the whole store is one JSON file.
pub struct FileSecretsManager {
    path: PathBuf,
    state: Mutex<SecretsFile>,
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    hex::decode(s).map_err(|_| Error::MissingSecret("valid hex blob"))
}

impl FileSecretsManager {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            SecretsFile::default()
        };
        Ok(FileSecretsManager {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn set_private_key(&self, private_key: &PrivateKey) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.private_key = Some(StoredKey {
            key_type: private_key.public().as_bytes()[0],
            public: hex::encode(private_key.public().as_bytes()),
            secret: hex::encode(private_key.secret()),
        });
        self.save(&state)
    }

    pub fn elections(&self) -> Vec<ElectionInfo> {
        let state = self.state.lock().unwrap();
        state
            .elections
            .values()
            .filter_map(|e| e.info.clone())
            .collect()
    }

    fn save(&self, state: &SecretsFile) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string_pretty(state)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SecretsManager for FileSecretsManager {
    fn get_private_key(&self) -> Result<PrivateKey> {
        let state = self.state.lock().unwrap();
        let stored = state
            .private_key
            .as_ref()
            .ok_or(Error::MissingSecret("private key"))?;
        let public = PublicKey::from_bytes(&decode_hex(&stored.public)?)?;
        PrivateKey::from_parts(public, decode_hex(&stored.secret)?)
    }

    fn get_secret_credential(
        &self,
        sys: &dyn CredentialSystem,
        election: &ElectionId,
    ) -> Result<Box<dyn SecretCredential>> {
        let mut state = self.state.lock().unwrap();
        let entry = state.elections.entry(hex::encode(election)).or_default();
        if let Some(stored) = &entry.secret_credential {
            let bytes = decode_hex(stored)?;
            return sys.read_secret_credential(&bytes);
        }
        let fresh = sys.generate_secret_credential()?;
        entry.secret_credential = Some(hex::encode(fresh.bytes()));
        self.save(&state)?;
        Ok(fresh)
    }

    fn get_ballot(&self, election: &ElectionId) -> Result<SignedBallot> {
        let state = self.state.lock().unwrap();
        let stored = state
            .elections
            .get(&hex::encode(election))
            .and_then(|e| e.ballot.as_ref())
            .ok_or(Error::MissingSecret("signed ballot"))?;
        SignedBallot::from_bytes(&decode_hex(stored)?)
    }

    fn set_ballot(&self, election: &ElectionId, ballot: &SignedBallot) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .elections
            .entry(hex::encode(election))
            .or_default()
            .ballot = Some(hex::encode(ballot.bytes()));
        self.save(&state)
    }

    fn get_vdf_solution(&self, election: &ElectionId) -> Result<VdfSolution> {
        let state = self.state.lock().unwrap();
        let stored = state
            .elections
            .get(&hex::encode(election))
            .and_then(|e| e.vdf_solution.as_ref())
            .ok_or(Error::MissingSecret("VDF solution"))?;
        Ok(VdfSolution {
            input: decode_hex(&stored.input)?,
            output: decode_hex(&stored.output)?,
            proof: decode_hex(&stored.proof)?,
        })
    }

    fn set_vdf_solution(&self, election: &ElectionId, sol: &VdfSolution) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .elections
            .entry(hex::encode(election))
            .or_default()
            .vdf_solution = Some(StoredSolution {
            input: hex::encode(&sol.input),
            output: hex::encode(&sol.output),
            proof: hex::encode(&sol.proof),
        });
        self.save(&state)
    }

    fn set_election(&self, election: &ElectionId, info: &ElectionInfo) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .elections
            .entry(hex::encode(election))
            .or_default()
            .info = Some(info.clone());
        self.save(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn election_id(n: u8) -> ElectionId {
        hash(&[n])
    }

    #[test]
    fn memory_manager_round_trip() {
        let manager = MemorySecretsManager::new();
        assert!(matches!(
            manager.get_private_key(),
            Err(Error::MissingSecret(_))
        ));

        let key = PrivateKey::generate(KeyType::Ed25519).unwrap();
        manager.set_private_key(key.clone());
        assert_eq!(manager.get_private_key().unwrap().public(), key.public());

        let id = election_id(1);
        let sys = MockCredentialSystem;
        let first = manager.get_secret_credential(&sys, &id).unwrap();
        let second = manager.get_secret_credential(&sys, &id).unwrap();
        assert_eq!(first.serial_no(), second.serial_no());

        // A different election gets a different fresh credential.
        let other = manager.get_secret_credential(&sys, &election_id(2)).unwrap();
        assert_ne!(other.serial_no(), first.serial_no());
    }

    #[test]
    fn file_manager_persists() {
        let mut path = std::env::temp_dir();
        path.push(format!("chronoballot-secrets-{}.json", rand::random::<u64>()));

        let id = election_id(3);
        let sys = MockCredentialSystem;
        let key = PrivateKey::generate(KeyType::Tezos).unwrap();
        let sol = VdfSolution {
            input: vec![1, 2],
            output: vec![3],
            proof: vec![4, 5, 6],
        };

        let serial = {
            let manager = FileSecretsManager::open(&path).unwrap();
            manager.set_private_key(&key).unwrap();
            manager.set_vdf_solution(&id, &sol).unwrap();
            manager
                .set_election(
                    &id,
                    &ElectionInfo {
                        invitation: "INV".to_string(),
                        title: "Test".to_string(),
                    },
                )
                .unwrap();
            manager.get_secret_credential(&sys, &id).unwrap().serial_no()
        };

        // Reopen from disk.
        let manager = FileSecretsManager::open(&path).unwrap();
        assert_eq!(manager.get_private_key().unwrap().public(), key.public());
        assert_eq!(manager.get_vdf_solution(&id).unwrap(), sol);
        assert_eq!(
            manager.get_secret_credential(&sys, &id).unwrap().serial_no(),
            serial
        );
        assert_eq!(manager.elections().len(), 1);
        assert!(matches!(
            manager.get_ballot(&id),
            Err(Error::MissingSecret(_))
        ));

        std::fs::remove_file(&path).ok();
    }
}
