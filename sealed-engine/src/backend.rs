//! The encrypted arithmetic engine the façade delegates to.
//!
//! The engine never computes on ciphertexts itself: a backend mints a fresh
//! handle for every result and keeps whatever it needs to later let a
//! decryption service recover the value.

use crate::{
    handle::{Handle, HandleId},
    operation::Operation,
    value::{Plaintext, ValueType},
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("the backend has no ciphertext for handle {0}")]
    UnknownCiphertext(HandleId),

    #[error("malformed external ciphertext for {ty}: {reason}")]
    MalformedCiphertext { ty: ValueType, reason: String },

    #[error("{op} is not supported on {ty}")]
    Unsupported { op: Operation, ty: ValueType },
}

pub trait ArithmeticBackend {
    /// Trivially encrypt a public constant into a fresh handle.
    fn encrypt(&mut self, value: &Plaintext) -> Result<Handle, BackendError>;

    /// Take ownership of a ciphertext produced outside of the engine.
    fn import(&mut self, ty: ValueType, ciphertext: &[u8]) -> Result<Handle, BackendError>;

    /// Fresh handle to an encrypted uniformly random value.
    fn random(&mut self, ty: ValueType) -> Result<Handle, BackendError>;

    /// Apply `op` to `inputs`. The engine has already checked that the
    /// operands type-check to `result`.
    fn apply(
        &mut self,
        op: Operation,
        inputs: &[Handle],
        result: ValueType,
    ) -> Result<Handle, BackendError>;
}
