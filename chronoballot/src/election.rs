//! The election state machine.
//!
//! Drives the ballot lifecycle over the broadcast log: credential commitment
//! during CredGen, anonymous time-locked ballot submission during Cast, the
//! decryption reveal during Tally, and tally derivation that any observer can
//! reproduce from the log alone. Verification failures on ingested messages
//! drop that message and continue; failures of the caller's own actions
//! surface unchanged.

use crate::*;
use std::str::FromStr;
use std::sync::Arc;

pub struct Election {
    cred_sys: Arc<dyn CredentialSystem>,
    channel: Box<dyn BroadcastChannel>,
    secrets: Box<dyn SecretsManager>,
    vdf: Box<dyn Vdf>,
    method: Box<dyn VotingMethod>,
    params: ElectionParams,
}

/// Progress of an election: the current phase, the count and total of
/// processed items (their meaning shifts with the phase), and the tally once
/// one exists.
#[derive(Serialize, Debug, Clone)]
pub struct ElectionProgress {
    pub phase: ElectionPhase,
    pub count: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tally: Option<Tally>,
}

impl Election {
    /// Fetch the parameters from the broadcast channel and assemble the
    /// election: the voting method selected by name, and the VDF bounded by
    /// the parameters' difficulty and scaled to the Cast window.
    pub fn new(
        ctx: &Ctx,
        channel: Box<dyn BroadcastChannel>,
        secrets: Box<dyn SecretsManager>,
        cred_sys: Arc<dyn CredentialSystem>,
    ) -> Result<Election> {
        let params = channel.params(ctx)?;
        let method = methods::get(&params.voting_method, &params.choices)?;
        let puzzle_duration = params.tally_start.saturating_sub(params.cast_start);
        if puzzle_duration == 0 {
            return Err(Error::InvalidParams("empty cast window"));
        }
        let vdf = Box::new(WesolowskiVdf {
            max_difficulty: params.max_vdf_difficulty,
            difficulty_conversion: params.max_vdf_difficulty / puzzle_duration,
        });
        Ok(Election {
            cred_sys,
            channel,
            secrets,
            vdf,
            method,
            params,
        })
    }

    /// Resolve an invitation to a broadcast channel and build the election.
    /// The election is remembered in the secrets manager for later listing.
    pub fn from_invitation(
        ctx: &Ctx,
        invitation: &str,
        secrets: Box<dyn SecretsManager>,
        cred_sys: Arc<dyn CredentialSystem>,
    ) -> Result<Election> {
        let inv = Invitation::from_str(invitation)?;
        match inv.network.as_str() {
            "http" => {
                if inv.servers.is_empty() {
                    return Err(Error::NoServers);
                }
                let address =
                    String::from_utf8(inv.address.clone()).map_err(|_| Error::InvalidAddress)?;
                let client = BroadcastClient::new(&address, &inv.servers[0])?;
                let election = Election::new(ctx, Box::new(client), secrets, cred_sys)?;
                election.secrets.set_election(
                    &election.id(),
                    &ElectionInfo {
                        invitation: invitation.to_string(),
                        title: election.params.title.clone(),
                    },
                )?;
                Ok(election)
            }
            _ => Err(Error::UnknownNetwork),
        }
    }

    pub fn params(&self) -> &ElectionParams {
        &self.params
    }

    pub fn phase(&self) -> ElectionPhase {
        self.params.phase()
    }

    pub fn id(&self) -> ElectionId {
        self.channel.id()
    }

    fn puzzle_duration(&self) -> u64 {
        self.params.tally_start - self.params.cast_start
    }

    /// Post this participant's public credential, signed by their identity
    /// key. Only valid during CredGen.
    pub fn post_credential(&self, ctx: &Ctx) -> Result<()> {
        if self.params.phase() != ElectionPhase::CredGen {
            return Err(Error::WrongPhase);
        }
        let private_key = self.secrets.get_private_key()?;
        let secret = self
            .secrets
            .get_secret_credential(self.cred_sys.as_ref(), &self.id())?;
        let public = secret.public()?;
        let msg = CredentialMessage::create(&private_key, public.bytes(), &self.id())?;
        self.channel.post(ctx, Message::Credential(msg))
    }

    /// Aggregate the anonymity ring for this election from the log: every
    /// well-signed credential message whose key hash is on the roster, one
    /// per public-key hash, first valid in log order winning.
    pub fn credential_set(&self, ctx: &Ctx) -> Result<Box<dyn CredentialSet>> {
        if self.params.phase() <= ElectionPhase::CredGen {
            return Err(Error::WrongPhase);
        }
        let election_id = self.id();
        let messages = self.channel.get(ctx)?;
        let mut seen = BytesSet::new();
        let mut credentials = Vec::new();
        for msg in &messages {
            let cred_msg = match msg {
                Message::Credential(m) => m,
                _ => continue,
            };
            if let Err(err) = cred_msg.verify(&election_id) {
                log::debug!("dropping credential message: {}", err);
                continue;
            }
            let pkh = cred_msg.public_key.hash();
            if !self.params.eligibility_list.contains(&pkh) {
                log::debug!("dropping credential message: key not on roster");
                continue;
            }
            let credential = match self.cred_sys.read_public_credential(&cred_msg.credential) {
                Ok(c) => c,
                Err(err) => {
                    log::debug!("dropping credential message: {}", err);
                    continue;
                }
            };
            if seen.add(&pkh) {
                credentials.push(credential);
            }
        }
        self.cred_sys.make_credential_set(credentials)
    }

    /// Cast a vote: solve a VDF puzzle sized to the Cast window, persist the
    /// solution for the later reveal, lock the ballot under a key derived
    /// from the solution output, sign it anonymously against the credential
    /// set, persist and post it. Only valid during Cast.
    pub fn vote(&self, ctx: &Ctx, choices: &[usize]) -> Result<()> {
        if self.params.phase() != ElectionPhase::Cast {
            return Err(Error::WrongPhase);
        }
        let election_id = self.id();
        let set = self.credential_set(ctx)?;
        let solution = self.vdf.create(ctx, self.puzzle_duration())?;
        self.secrets.set_vdf_solution(&election_id, &solution)?;
        let secret = self
            .secrets
            .get_secret_credential(self.cred_sys.as_ref(), &election_id)?;
        let ballot = self.method.vote(choices)?;
        let encrypted = ballot.encrypt(&solution)?;
        let signed = encrypted.sign(set.as_ref(), secret.as_ref())?;
        self.secrets.set_ballot(&election_id, &signed)?;
        self.channel.post(ctx, Message::SignedBallot(signed))
    }

    /// Reveal this participant's ballot decryption by posting the persisted
    /// VDF solution.
    pub fn reveal_ballot_decryption(&self, ctx: &Ctx) -> Result<()> {
        let solution = self.secrets.get_vdf_solution(&self.id())?;
        self.post_ballot_decryption(ctx, solution)
    }

    /// Post a decryption message for the given VDF solution. Only valid
    /// during Tally.
    pub fn post_ballot_decryption(&self, ctx: &Ctx, solution: VdfSolution) -> Result<()> {
        if self.params.phase() != ElectionPhase::Tally {
            return Err(Error::WrongPhase);
        }
        let msg = DecryptionMessage::from_solution(&solution);
        self.channel.post(ctx, Message::Decryption(msg))
    }

    /// Derive the progress report from the log alone. Signed ballots are
    /// deduplicated by serial number (first in log order wins) and verified
    /// against the credential set; from Tally onward, each surviving ballot
    /// is decrypted through its revealed, verified VDF solution.
    pub fn progress(&self, ctx: &Ctx) -> Result<ElectionProgress> {
        let phase = self.params.phase();
        if phase <= ElectionPhase::CredGen {
            return Ok(ElectionProgress {
                phase,
                count: 0,
                total: 0,
                tally: None,
            });
        }
        let set = self.credential_set(ctx)?;
        let messages = self.channel.get(ctx)?;

        let mut signed_ballots = Vec::new();
        let mut decryptions = Vec::new();
        for msg in &messages {
            match msg {
                Message::SignedBallot(b) => signed_ballots.push(b),
                Message::Decryption(d) => decryptions.push(d),
                _ => {}
            }
        }

        let mut serial_nos = BytesSet::new();
        let mut decrypted_ballots = Vec::new();
        let mut valid_sign = 0;
        let mut valid_dec = 0;
        let mut invalid_dec = 0;
        for ballot in signed_ballots {
            if serial_nos.contains(&ballot.serial_no) {
                continue;
            }
            if let Err(err) = ballot.verify(set.as_ref()) {
                log::debug!("dropping signed ballot: {}", err);
                continue;
            }
            serial_nos.add(&ballot.serial_no);
            valid_sign += 1;
            if phase >= ElectionPhase::Tally {
                match decrypt_ballot(&ballot.encrypted_ballot, &decryptions, self.vdf.as_ref()) {
                    Ok(plain) => {
                        decrypted_ballots.push(plain);
                        valid_dec += 1;
                    }
                    // The voter has not revealed yet; neither valid nor
                    // invalid.
                    Err(Error::DecryptionNotFound) => {}
                    Err(err) => {
                        log::debug!("ballot failed decryption: {}", err);
                        invalid_dec += 1;
                    }
                }
            }
        }

        Ok(match phase {
            ElectionPhase::Cast => ElectionProgress {
                phase,
                count: valid_sign,
                total: set.len(),
                tally: None,
            },
            ElectionPhase::Tally => ElectionProgress {
                phase,
                count: valid_dec,
                total: valid_sign - invalid_dec,
                tally: Some(self.method.tally(&decrypted_ballots)),
            },
            _ => ElectionProgress {
                phase,
                count: valid_dec,
                total: valid_sign,
                tally: Some(self.method.tally(&decrypted_ballots)),
            },
        })
    }
}

/// Find a revealed, verified VDF solution matching the ballot's embedded
/// input and decrypt through it. Candidates whose proof fails verification
/// are skipped; a well-formed solution whose key the ballot rejects is a
/// decryption failure; no match at all is `DecryptionNotFound`.
fn decrypt_ballot(
    encrypted: &EncryptedBallot,
    decryptions: &[&DecryptionMessage],
    vdf: &dyn Vdf,
) -> Result<Ballot> {
    let input_hash = hash(&encrypted.vdf_input);
    for msg in decryptions {
        if msg.input_hash != input_hash {
            continue;
        }
        let solution = msg.solution_for(&encrypted.vdf_input);
        if vdf.verify(&solution).is_err() {
            continue;
        }
        return encrypted.decrypt(&solution);
    }
    Err(Error::DecryptionNotFound)
}
