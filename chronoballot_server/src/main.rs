//! Broadcast-log server: an in-memory append-only message log per election,
//! the raw params/messages API the voting clients consume, and a small admin
//! surface for creating elections and projecting their progress.

use chronoballot::*;
use rand::RngCore;
use rocket::data::{Data, ToByteUnit};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::Json;
use rocket::State;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[macro_use]
extern crate rocket;

#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate serde;

const MAX_MESSAGE_BYTES: usize = 0x7fff;

// Global election store. Records are append-only once created, mirroring the
// broadcast-log contract.
lazy_static! {
    static ref STORE: Arc<Mutex<Store>> = Arc::new(Mutex::new(Store::default()));
}

#[derive(Default)]
struct Store {
    elections: HashMap<String, ElectionRecord>,
    admin_index: HashMap<String, String>,
}

struct ElectionRecord {
    params: Vec<u8>,
    messages: Vec<Vec<u8>>,
    invitation: String,
}

struct ServerConfig {
    public_url: String,
    admin_pass_hash: Option<[u8; 32]>,
    allow_create: bool,
    allow_post: bool,
}

#[derive(Deserialize)]
struct ElectionSetupParams {
    title: String,
    #[serde(default)]
    description: String,
    voting_method: String,
    choices: Vec<String>,
    cast_start: u64,
    tally_start: u64,
    tally_end: u64,
    #[serde(default = "default_difficulty")]
    max_vdf_difficulty: u64,
    /// Encoded voter public keys (`EPK…` or `edpk…`).
    voters: Vec<String>,
}

fn default_difficulty() -> u64 {
    1_000_000
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "snake_case")]
enum SetupStatus {
    Error,
    Done,
}

#[derive(Serialize, Clone)]
struct SetupInfo {
    status: SetupStatus,
    #[serde(skip_serializing_if = "String::is_empty")]
    error: String,
    backend_id: String,
    invitation: String,
}

/// Status projection of the core's progress report.
#[derive(Serialize)]
struct ElectionStatus {
    title: String,
    phase: ElectionPhase,
    count: usize,
    total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    counts: Option<Tally>,
}

/// Admin guard: requests must carry the configured password in the
/// `x-admin-password` header. Hashes are compared, not the raw strings.
struct AdminAuth;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminAuth {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = match req.guard::<&State<ServerConfig>>().await {
            Outcome::Success(config) => config,
            _ => return Outcome::Error((Status::InternalServerError, ())),
        };
        let expected = match &config.admin_pass_hash {
            Some(expected) => expected,
            None => return Outcome::Success(AdminAuth),
        };
        match req.headers().get_one("x-admin-password") {
            Some(given) if &password_hash(given) == expected => Outcome::Success(AdminAuth),
            _ => Outcome::Error((Status::Forbidden, ())),
        }
    }
}

fn password_hash(password: &str) -> [u8; 32] {
    let digest = Sha256::digest(password.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

fn random_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng {}.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Broadcast channel over a stored election record, for the status
/// projection.
struct LogChannel {
    backend_id: String,
}

impl BroadcastChannel for LogChannel {
    fn id(&self) -> ElectionId {
        hash(self.backend_id.as_bytes())
    }

    fn params(&self, ctx: &Ctx) -> Result<ElectionParams> {
        ctx.check()?;
        let store = STORE.lock().unwrap();
        let record = store
            .elections
            .get(&self.backend_id)
            .ok_or(Error::InvalidAddress)?;
        ElectionParams::from_bytes(&record.params)
    }

    fn get(&self, ctx: &Ctx) -> Result<Vec<Message>> {
        ctx.check()?;
        let store = STORE.lock().unwrap();
        let record = store
            .elections
            .get(&self.backend_id)
            .ok_or(Error::InvalidAddress)?;
        let mut messages = Vec::with_capacity(record.messages.len());
        for raw in &record.messages {
            match Message::from_bytes(raw) {
                Ok(m) => messages.push(m),
                Err(err) => log::debug!("skipping unparseable stored message: {}", err),
            }
        }
        Ok(messages)
    }

    fn post(&self, ctx: &Ctx, m: Message) -> Result<()> {
        ctx.check()?;
        let mut store = STORE.lock().unwrap();
        let record = store
            .elections
            .get_mut(&self.backend_id)
            .ok_or(Error::InvalidAddress)?;
        record.messages.push(m.bytes());
        Ok(())
    }
}

#[get("/params/<backend_id>")]
fn get_params(backend_id: String) -> Option<Vec<u8>> {
    let store = STORE.lock().unwrap();
    store.elections.get(&backend_id).map(|r| r.params.clone())
}

#[get("/messages/<backend_id>")]
fn get_messages(backend_id: String) -> Option<Vec<u8>> {
    let store = STORE.lock().unwrap();
    let record = store.elections.get(&backend_id)?;
    let mut w = BufferWriter::new();
    for msg in &record.messages {
        w.write_vector(msg);
    }
    Some(w.into_bytes())
}

#[post("/messages/<backend_id>", data = "<data>")]
async fn post_message(
    backend_id: String,
    data: Data<'_>,
    config: &State<ServerConfig>,
) -> (Status, &'static str) {
    if !config.allow_post {
        return (Status::Forbidden, "Server does not accept messages");
    }
    let body = match data.open(64.kibibytes()).into_bytes().await {
        Ok(body) if body.is_complete() => body.into_inner(),
        _ => return (Status::BadRequest, "Bad message body"),
    };
    if body.len() > MAX_MESSAGE_BYTES {
        return (Status::BadRequest, "Message too large");
    }
    // Only parseable messages enter the log; semantic validation is the
    // election state machine's job, so invalid-but-well-formed ones are kept.
    if let Err(err) = Message::from_bytes(&body) {
        log::debug!("rejecting unparseable message: {}", err);
        return (Status::BadRequest, "Unparseable message");
    }

    let mut store = STORE.lock().unwrap();
    match store.elections.get_mut(&backend_id) {
        Some(record) => {
            record.messages.push(body);
            (Status::Ok, "OK")
        }
        None => (Status::NotFound, "No such election"),
    }
}

#[post("/create", data = "<setup>")]
fn create(
    _auth: AdminAuth,
    setup: Json<ElectionSetupParams>,
    config: &State<ServerConfig>,
) -> (Status, Json<SetupInfo>) {
    let failed = |error: String| {
        (
            Status::BadRequest,
            Json(SetupInfo {
                status: SetupStatus::Error,
                error,
                backend_id: String::new(),
                invitation: String::new(),
            }),
        )
    };
    if !config.allow_create {
        return failed("Server does not create elections".to_string());
    }

    let mut eligibility_list = EligibilityList::new();
    for voter in &setup.voters {
        let key = match PublicKey::parse(voter) {
            Ok(key) => key,
            Err(err) => return failed(format!("bad voter key {}: {}", voter, err)),
        };
        if !eligibility_list.add(key.hash(), [0; 32]) {
            return failed(format!("duplicate voter key {}", voter));
        }
    }

    let params = ElectionParams {
        version: 0,
        cast_start: setup.cast_start,
        tally_start: setup.tally_start,
        tally_end: setup.tally_end,
        max_vdf_difficulty: setup.max_vdf_difficulty,
        voting_method: setup.voting_method.clone(),
        title: setup.title.clone(),
        description: setup.description.clone(),
        choices: setup.choices.clone(),
        eligibility_list,
    };
    if let Err(err) = params.validate() {
        return failed(err.to_string());
    }

    let backend_id = random_id();
    let admin_id = random_id();
    let invitation = Invitation {
        network: "http".to_string(),
        address: backend_id.as_bytes().to_vec(),
        servers: vec![config.public_url.clone()],
    }
    .to_string();

    let mut store = STORE.lock().unwrap();
    store.elections.insert(
        backend_id.clone(),
        ElectionRecord {
            params: params.bytes(),
            messages: Vec::new(),
            invitation: invitation.clone(),
        },
    );
    store.admin_index.insert(admin_id, backend_id.clone());
    log::info!("created election {} ({})", backend_id, params.title);

    (
        Status::Ok,
        Json(SetupInfo {
            status: SetupStatus::Done,
            error: String::new(),
            backend_id,
            invitation,
        }),
    )
}

#[get("/setup/<admin_id>")]
fn setup_info(_auth: AdminAuth, admin_id: String) -> Option<Json<SetupInfo>> {
    let store = STORE.lock().unwrap();
    let backend_id = store.admin_index.get(&admin_id)?;
    let record = store.elections.get(backend_id)?;
    Some(Json(SetupInfo {
        status: SetupStatus::Done,
        error: String::new(),
        backend_id: backend_id.clone(),
        invitation: record.invitation.clone(),
    }))
}

#[get("/election/<backend_id>")]
fn election_status(backend_id: String) -> std::result::Result<Json<ElectionStatus>, Status> {
    {
        let store = STORE.lock().unwrap();
        if !store.elections.contains_key(&backend_id) {
            return Err(Status::NotFound);
        }
    }
    let channel = LogChannel { backend_id };
    let election = Election::new(
        &Ctx::background(),
        Box::new(channel),
        Box::new(MemorySecretsManager::new()),
        Arc::new(MockCredentialSystem),
    )
    .map_err(|_| Status::InternalServerError)?;
    let progress = election
        .progress(&Ctx::background())
        .map_err(|_| Status::InternalServerError)?;
    Ok(Json(ElectionStatus {
        title: election.params().title.clone(),
        phase: progress.phase,
        count: progress.count,
        total: progress.total,
        counts: progress.tally,
    }))
}

#[launch]
fn rocket() -> _ {
    env_logger::init();

    let config = ServerConfig {
        public_url: std::env::var("CHRONOBALLOT_PUBLIC_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string()),
        admin_pass_hash: std::env::var("CHRONOBALLOT_ADMIN_PASSWORD")
            .ok()
            .map(|p| password_hash(&p)),
        allow_create: std::env::var("CHRONOBALLOT_NO_CREATE").is_err(),
        allow_post: std::env::var("CHRONOBALLOT_NO_POST").is_err(),
    };

    rocket::build().manage(config).mount(
        "/",
        routes![
            get_params,
            get_messages,
            post_message,
            create,
            setup_info,
            election_status
        ],
    )
}
