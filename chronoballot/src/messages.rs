//! Broadcast message types and their canonical byte forms.
//!
//! A message on the wire is a one-byte phase tag followed by the variant
//! payload. Exactly one variant per message; parsing rejects empty buffers
//! and unknown tags.

use crate::*;
use aes_gcm::aead::{generic_array::GenericArray, Aead, NewAead};
use aes_gcm::Aes256Gcm;
use hkdf::Hkdf;
use rand::{thread_rng, Rng};
use sha2::Sha256;
use std::convert::TryFrom;

const BALLOT_IV_LENGTH: usize = 12;

/// Plaintext ballot, choice vector encoded per voting method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ballot(pub Vec<u8>);

/// Ballot under the VDF time-lock. The symmetric key derives from the VDF
/// output for the embedded input, so anyone who reproduces (or receives and
/// verifies) the solution can decrypt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBallot {
    pub vdf_input: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

/// Encrypted ballot anonymously signed against the election's credential
/// set. The serial number is the double-vote detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBallot {
    pub encrypted_ballot: EncryptedBallot,
    pub serial_no: Vec<u8>,
    pub signature: Vec<u8>,
}

/// A participant's eligibility-proving credential commitment, signed by
/// their roster identity key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialMessage {
    pub public_key: PublicKey,
    pub credential: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Verifiable VDF solution attestation revealing a ballot's decryption key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionMessage {
    pub input_hash: HashValue,
    pub output: Vec<u8>,
    pub proof: Vec<u8>,
}

fn ballot_key(vdf_output: &[u8]) -> [u8; 32] {
    let h = Hkdf::<Sha256>::new(None, vdf_output);
    let mut out = [0u8; 32];
    h.expand(&[], &mut out)
        .expect("chronoballot: HKDF expand failure");
    out
}

impl Ballot {
    pub fn encrypt(&self, sol: &VdfSolution) -> Result<EncryptedBallot> {
        let key = ballot_key(&sol.output);
        let key = GenericArray::clone_from_slice(&key);
        let aead = Aes256Gcm::new(&key);

        let mut nonce = [0u8; BALLOT_IV_LENGTH];
        thread_rng().fill(&mut nonce);
        let ciphertext = aead
            .encrypt(GenericArray::from_slice(&nonce), self.0.as_slice())
            .map_err(|_| Error::BallotDecryption)?;

        let mut output = Vec::with_capacity(BALLOT_IV_LENGTH + ciphertext.len());
        output.extend_from_slice(&nonce);
        output.extend(ciphertext);

        Ok(EncryptedBallot {
            vdf_input: sol.input.clone(),
            ciphertext: output,
        })
    }
}

impl EncryptedBallot {
    pub fn decrypt(&self, sol: &VdfSolution) -> Result<Ballot> {
        if self.ciphertext.len() < BALLOT_IV_LENGTH {
            return Err(Error::BallotDecryption);
        }
        let key = ballot_key(&sol.output);
        let key = GenericArray::clone_from_slice(&key);
        let aead = Aes256Gcm::new(&key);

        let nonce = GenericArray::from_slice(&self.ciphertext[..BALLOT_IV_LENGTH]);
        let plaintext = aead
            .decrypt(nonce, &self.ciphertext[BALLOT_IV_LENGTH..])
            .map_err(|_| Error::BallotDecryption)?;
        Ok(Ballot(plaintext))
    }

    /// Anonymously sign these ballot bytes against the credential set.
    pub fn sign(
        &self,
        set: &dyn CredentialSet,
        secret: &dyn SecretCredential,
    ) -> Result<SignedBallot> {
        let signature = set.sign(secret, &self.bytes())?;
        Ok(SignedBallot {
            encrypted_ballot: self.clone(),
            serial_no: secret.serial_no(),
            signature,
        })
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut w = BufferWriter::new();
        w.write_vector(&self.vdf_input);
        w.write_vector(&self.ciphertext);
        w.into_bytes()
    }

    fn read_from(r: &mut BufferReader) -> Result<Self> {
        Ok(EncryptedBallot {
            vdf_input: r.read_vector()?.to_vec(),
            ciphertext: r.read_vector()?.to_vec(),
        })
    }
}

impl SignedBallot {
    pub fn verify(&self, set: &dyn CredentialSet) -> Result<()> {
        set.verify(
            &self.serial_no,
            &self.signature,
            &self.encrypted_ballot.bytes(),
        )
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut w = BufferWriter::new();
        w.write(&self.encrypted_ballot.bytes());
        w.write_vector(&self.serial_no);
        w.write_vector(&self.signature);
        w.into_bytes()
    }

    pub fn from_bytes(p: &[u8]) -> Result<Self> {
        let mut r = BufferReader::new(p);
        let encrypted_ballot = EncryptedBallot::read_from(&mut r)?;
        Ok(SignedBallot {
            encrypted_ballot,
            serial_no: r.read_vector()?.to_vec(),
            signature: r.read_vector()?.to_vec(),
        })
    }
}

impl CredentialMessage {
    /// Build and sign a credential commitment. The signature covers the
    /// election identifier, the public credential and the identity key, in
    /// that fixed layout, for both signing and verification.
    pub fn create(
        private_key: &PrivateKey,
        credential: Vec<u8>,
        election_id: &ElectionId,
    ) -> Result<Self> {
        let public_key = private_key.public().clone();
        let signing = Self::signing_bytes(election_id, &credential, &public_key);
        let signature = private_key.sign(&signing)?;
        Ok(CredentialMessage {
            public_key,
            credential,
            signature,
        })
    }

    pub fn verify(&self, election_id: &ElectionId) -> Result<()> {
        let signing = Self::signing_bytes(election_id, &self.credential, &self.public_key);
        self.public_key.verify(&signing, &self.signature)
    }

    fn signing_bytes(
        election_id: &ElectionId,
        credential: &[u8],
        public_key: &PublicKey,
    ) -> Vec<u8> {
        let mut w = BufferWriter::new();
        w.write(election_id);
        w.write_vector(credential);
        w.write_vector(public_key.as_bytes());
        w.into_bytes()
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut w = BufferWriter::new();
        w.write_vector(self.public_key.as_bytes());
        w.write_vector(&self.credential);
        w.write_vector(&self.signature);
        w.into_bytes()
    }

    pub fn from_bytes(p: &[u8]) -> Result<Self> {
        let mut r = BufferReader::new(p);
        Ok(CredentialMessage {
            public_key: PublicKey::from_bytes(r.read_vector()?)?,
            credential: r.read_vector()?.to_vec(),
            signature: r.read_vector()?.to_vec(),
        })
    }
}

impl DecryptionMessage {
    pub fn from_solution(sol: &VdfSolution) -> Self {
        DecryptionMessage {
            input_hash: hash(&sol.input),
            output: sol.output.clone(),
            proof: sol.proof.clone(),
        }
    }

    /// Reassemble the full solution for a ballot whose embedded VDF input
    /// hashes to our input hash.
    pub fn solution_for(&self, vdf_input: &[u8]) -> VdfSolution {
        VdfSolution {
            input: vdf_input.to_vec(),
            output: self.output.clone(),
            proof: self.proof.clone(),
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut w = BufferWriter::new();
        w.write(&self.input_hash);
        w.write_vector(&self.output);
        w.write_vector(&self.proof);
        w.into_bytes()
    }

    pub fn from_bytes(p: &[u8]) -> Result<Self> {
        let mut r = BufferReader::new(p);
        Ok(DecryptionMessage {
            input_hash: r.read_32()?,
            output: r.read_vector()?.to_vec(),
            proof: r.read_vector()?.to_vec(),
        })
    }
}

/// A broadcast-channel message; exactly one variant is ever populated.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Params(ElectionParams),
    Credential(CredentialMessage),
    SignedBallot(SignedBallot),
    Decryption(DecryptionMessage),
}

impl Message {
    pub fn phase_tag(&self) -> ElectionPhase {
        match self {
            Message::Params(_) => ElectionPhase::Setup,
            Message::Credential(_) => ElectionPhase::CredGen,
            Message::SignedBallot(_) => ElectionPhase::Cast,
            Message::Decryption(_) => ElectionPhase::Tally,
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        let payload = match self {
            Message::Params(m) => m.bytes(),
            Message::Credential(m) => m.bytes(),
            Message::SignedBallot(m) => m.bytes(),
            Message::Decryption(m) => m.bytes(),
        };
        let mut out = Vec::with_capacity(payload.len() + 1);
        out.push(self.phase_tag() as u8);
        out.extend(payload);
        out
    }

    pub fn from_bytes(p: &[u8]) -> Result<Self> {
        if p.is_empty() {
            return Err(Error::InvalidMessageSize);
        }
        let phase = ElectionPhase::try_from(p[0]).map_err(|_| Error::InvalidMessageType)?;
        match phase {
            ElectionPhase::Setup => Ok(Message::Params(ElectionParams::from_bytes(&p[1..])?)),
            ElectionPhase::CredGen => {
                Ok(Message::Credential(CredentialMessage::from_bytes(&p[1..])?))
            }
            ElectionPhase::Cast => Ok(Message::SignedBallot(SignedBallot::from_bytes(&p[1..])?)),
            ElectionPhase::Tally => Ok(Message::Decryption(DecryptionMessage::from_bytes(&p[1..])?)),
            ElectionPhase::End => Err(Error::InvalidMessageType),
        }
    }
}

impl From<CredentialMessage> for Message {
    fn from(m: CredentialMessage) -> Self {
        Message::Credential(m)
    }
}

impl From<SignedBallot> for Message {
    fn from(m: SignedBallot) -> Self {
        Message::SignedBallot(m)
    }
}

impl From<DecryptionMessage> for Message {
    fn from(m: DecryptionMessage) -> Self {
        Message::Decryption(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_solution() -> VdfSolution {
        let vdf = WesolowskiVdf {
            max_difficulty: 64,
            difficulty_conversion: 8,
        };
        vdf.create(&Ctx::background(), 4).unwrap()
    }

    #[test]
    fn ballot_encrypt_decrypt() {
        let sol = test_solution();
        let ballot = Ballot(vec![1]);
        let enc = ballot.encrypt(&sol).unwrap();
        assert_eq!(enc.vdf_input, sol.input);
        assert_eq!(enc.decrypt(&sol).unwrap(), ballot);

        // A different output yields a different key and the ballot rejects it.
        let mut wrong = sol;
        wrong.output[0] ^= 1;
        assert!(matches!(
            enc.decrypt(&wrong),
            Err(Error::BallotDecryption)
        ));
    }

    #[test]
    fn credential_message_round_trip() {
        let key = PrivateKey::generate(KeyType::Ed25519).unwrap();
        let election_id = hash(b"election");
        let msg = CredentialMessage::create(&key, vec![7; 32], &election_id).unwrap();
        msg.verify(&election_id).unwrap();

        let decoded = CredentialMessage::from_bytes(&msg.bytes()).unwrap();
        assert_eq!(decoded, msg);
        decoded.verify(&election_id).unwrap();

        // The election id is part of the signing domain.
        assert!(decoded.verify(&hash(b"other election")).is_err());
    }

    #[test]
    fn signed_ballot_round_trip() {
        let sys = MockCredentialSystem;
        let secret = sys.generate_secret_credential().unwrap();
        let set = sys
            .make_credential_set(vec![secret.public().unwrap()])
            .unwrap();

        let enc = Ballot(vec![2]).encrypt(&test_solution()).unwrap();
        let signed = enc.sign(set.as_ref(), secret.as_ref()).unwrap();
        signed.verify(set.as_ref()).unwrap();

        let decoded = SignedBallot::from_bytes(&signed.bytes()).unwrap();
        assert_eq!(decoded, signed);
        decoded.verify(set.as_ref()).unwrap();
    }

    #[test]
    fn decryption_message_round_trip() {
        let sol = test_solution();
        let msg = DecryptionMessage::from_solution(&sol);
        assert_eq!(msg.input_hash, hash(&sol.input));
        let decoded = DecryptionMessage::from_bytes(&msg.bytes()).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.solution_for(&sol.input), sol);
    }

    #[test]
    fn message_tags() {
        let sol = test_solution();
        let msg = Message::from(DecryptionMessage::from_solution(&sol));
        let bytes = msg.bytes();
        assert_eq!(bytes[0], ElectionPhase::Tally as u8);
        assert_eq!(Message::from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn message_parse_rejections() {
        assert!(matches!(
            Message::from_bytes(&[]),
            Err(Error::InvalidMessageSize)
        ));
        assert!(matches!(
            Message::from_bytes(&[9, 1, 2]),
            Err(Error::InvalidMessageType)
        ));
        // End is a phase, not a message tag.
        assert!(matches!(
            Message::from_bytes(&[4]),
            Err(Error::InvalidMessageType)
        ));
    }
}
