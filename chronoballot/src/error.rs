use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    // Codec errors
    #[error("chronoballot: short buffer")]
    ShortBuffer,

    #[error("chronoballot: unknown version")]
    UnknownVersion,

    #[error("chronoballot: unknown magic")]
    UnknownMagic,

    #[error("chronoballot: duplicate key in eligibility list")]
    DuplicateKey,

    #[error("chronoballot: invalid base32 character {0:?}")]
    InvalidCharacter(char),

    #[error("chronoballot: invalid check encoding")]
    InvalidChecksum,

    // Key errors
    #[error("chronoballot: invalid key length")]
    InvalidKeyLength,

    #[error("chronoballot: unknown key type")]
    UnknownKeyType,

    #[error("chronoballot: invalid signature")]
    InvalidSignature,

    #[error("chronoballot: base58 error: {0}")]
    Base58(#[from] bs58::decode::Error),

    // Protocol errors
    #[error("chronoballot: wrong election phase")]
    WrongPhase,

    #[error("chronoballot: ballot decryption not found")]
    DecryptionNotFound,

    #[error("chronoballot: invalid message type")]
    InvalidMessageType,

    #[error("chronoballot: invalid message size")]
    InvalidMessageSize,

    #[error("chronoballot: invalid election parameters: {0}")]
    InvalidParams(&'static str),

    #[error("chronoballot: unknown voting method {0:?}")]
    UnknownMethod(String),

    #[error("chronoballot: invalid choice index {0}")]
    InvalidChoice(usize),

    #[error("chronoballot: credential is not a member of the credential set")]
    CredentialNotInSet,

    #[error("chronoballot: failed to decrypt ballot")]
    BallotDecryption,

    #[error("chronoballot: VDF proof failed to verify")]
    InvalidVdfProof,

    #[error("chronoballot: VDF difficulty exceeds election bound")]
    VdfDifficultyExceeded,

    // Invitation errors
    #[error("chronoballot: unknown network")]
    UnknownNetwork,

    #[error("chronoballot: no servers in invitation")]
    NoServers,

    #[error("chronoballot: invalid address")]
    InvalidAddress,

    // Secrets manager
    #[error("chronoballot: missing {0} in secrets manager")]
    MissingSecret(&'static str),

    // Cancellation
    #[error("chronoballot: operation cancelled")]
    Cancelled,

    #[error("chronoballot: deadline exceeded")]
    DeadlineExceeded,

    // Transport errors bubble unmodified
    #[error("chronoballot: transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("chronoballot: server error {status}: {body}")]
    Server { status: u16, body: String },

    #[error("chronoballot: io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chronoballot: json error: {0}")]
    Json(#[from] serde_json::Error),
}
