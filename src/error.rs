//! Error types for the oral messages simulation.

use thiserror::Error;

use crate::consensus::{GeneralId, Role};

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while running a simulation.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration was rejected before any round executed.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A participant refused a protocol step.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// A lieutenant task panicked or was cancelled.
    #[error("general task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The inbox of a general was dropped before the run finished.
    #[error("channel to general {0} closed")]
    ChannelClosed(GeneralId),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no commander: at least one general is required")]
    NoCommander,

    #[error("{0} generals exceed the identifier space")]
    TooManyGenerals(usize),

    /// The relay tree grows exponentially with the recursion bound.
    #[error(
        "relay tree for {lieutenants} lieutenants over {recursion} rounds needs about {estimated} nodes per general, limit is {limit}"
    )]
    TreeTooLarge {
        lieutenants: usize,
        recursion: u32,
        estimated: u64,
        limit: u64,
    },

    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Protocol errors. A run driven by this crate never produces one; they guard
/// the participant API against out-of-order or forged input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("general {id} ({role:?}) cannot broadcast in round {round}")]
    OutOfTurn { id: GeneralId, role: Role, round: u32 },

    #[error("general {0} does not accept relayed messages")]
    UnexpectedRecipient(GeneralId),

    #[error("no general {0} to deliver to")]
    UnknownRecipient(GeneralId),

    #[error("message relayed by unknown general {0}")]
    UnknownSender(GeneralId),

    #[error("message relayed by general {0} was signed by another key")]
    SenderMismatch(GeneralId),

    #[error("bad signature on message relayed by general {0}")]
    BadSignature(GeneralId),

    #[error("relayed message carries an empty path")]
    EmptyPath,

    #[error("path {0:?} is already in the tree")]
    DuplicatePath(Vec<GeneralId>),

    #[error("path {0:?} relays through the same general twice")]
    CyclicPath(Vec<GeneralId>),

    #[error("general {0} has not received the commander's order")]
    Unrooted(GeneralId),

    #[error("general {0} cannot resolve before the last round is complete")]
    NotComplete(GeneralId),

    #[error("general {0} has already decided")]
    AlreadyDecided(GeneralId),

    #[error("general {id} received a round {got} message while in round {current}")]
    StaleRound { id: GeneralId, got: u32, current: u32 },
}

/// Returned when text is neither `attack` nor `retreat`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order `{0}`, expected `attack` or `retreat`")]
pub struct ParseOrderError(pub String);
