//! Errors of the engine.
use crate::{
    acl::Unauthorized,
    backend::BackendError,
    handle::HandleId,
    operation::Operation,
    registry::RevealError,
    value::ValueType,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The host or the caller holds no grant on a handle it tried to use.
    #[error(transparent)]
    Unauthorized(#[from] Unauthorized),

    /// The handle was never created by this engine, or has been collected.
    #[error("unknown handle {0}")]
    UnknownHandle(HandleId),

    /// Operand types are not accepted by the operation. `op` is `None` for
    /// primitives that are not an `Operation` (random generation).
    #[error("operand types {operands:?} are not accepted by {op:?}")]
    TypeMismatch {
        op: Option<Operation>,
        operands: Vec<ValueType>,
    },

    #[error("a plaintext seed of type {actual} cannot create a handle of type {declared}")]
    SeedTypeMismatch {
        declared: ValueType,
        actual: ValueType,
    },

    /// The backend answered with a handle that is already in use.
    #[error("the backend minted handle {0} twice")]
    BackendAliasedHandle(HandleId),

    #[error("cannot fold an empty list of values")]
    EmptyFold,

    #[error("cannot fold {0} values, the index would not fit an euint32")]
    FoldTooWide(usize),

    #[error("public operand {value} does not fit in {ty}")]
    ScalarOutOfRange { ty: ValueType, value: u128 },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Reveal(#[from] RevealError),
}

impl Error {
    /// `true` for failures that may succeed when retried with other inputs
    /// (a corrected proof) without any change to the engine state.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Reveal(RevealError::ProofVerificationFailed { .. })
        )
    }
}
