//! Access control and two-phase reveal for programs computing over
//! encrypted values.
//!
//! Values are only ever manipulated through [`Handle`]s. The [`Engine`]
//! tracks which handles exist, who may use them, and which of them have
//! been submitted for decryption; an external decryption service answers
//! with plaintexts and a proof that the engine checks before handing the
//! plaintexts to the use case, exactly once.

pub mod acl;
pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
mod facade;
pub mod handle;
pub mod operation;
pub mod phase;
pub mod proof;
pub mod registry;
pub mod store;
pub mod value;
pub mod verifier;

#[cfg(any(test, feature = "property-test-api"))]
pub mod testing;

pub use crate::{
    acl::{Scope, Unauthorized},
    backend::{ArithmeticBackend, BackendError},
    config::{ConfigError, EngineConfig},
    engine::{Engine, Execution, ExecutionId},
    error::Error,
    handle::{Handle, HandleId, HandleSource},
    operation::Operation,
    phase::{Phase, PhaseError},
    proof::{CommitteeVerifier, DecryptionProof, DecryptionVerifier},
    registry::{
        PendingReveal, RevealContext, RevealError, RevealKey, RevealStatus, VerificationFailure,
    },
    value::{Party, Plaintext, ValueType},
    verifier::FinalizedReveal,
};
