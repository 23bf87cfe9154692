use sealed_engine::{Error, Party, PhaseError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error(transparent)]
    Engine(#[from] Error),

    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error("the contract no longer accepts inputs")]
    Closed,

    #[error("only {expected} may do this")]
    NotAllowed { expected: Party },

    #[error("{0} already voted")]
    AlreadyVoted(Party),

    #[error("{0} already joined")]
    AlreadyJoined(Party),

    #[error("{0} already submitted")]
    AlreadySubmitted(Party),

    #[error("a draw needs at least one player")]
    NotEnoughPlayers,

    #[error("the escrow is not funded")]
    NotFunded,

    #[error("the escrow is already funded")]
    AlreadyFunded,

    #[error("no reveal is pending")]
    NotAwaitingReveal,

    #[error("the revealed values do not fit the contract")]
    MalformedReveal,
}

impl ContractError {
    /// The engine error behind this one, if any.
    pub fn engine(&self) -> Option<&Error> {
        match self {
            ContractError::Engine(e) => Some(e),
            _ => None,
        }
    }
}
