//! Finalization of pending reveals.
//!
//! Every check happens before the registry is touched: a failed
//! finalization leaves the record `Pending` and can be retried with a
//! corrected proof.

use crate::{
    backend::ArithmeticBackend,
    engine::Execution,
    error::Error,
    proof::DecryptionVerifier,
    registry::{RevealContext, RevealError, RevealKey, RevealStatus, VerificationFailure},
    value::{Party, Plaintext},
};
use tracing::{info, warn};

/// What a successful finalization hands back to the use case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedReveal {
    key: RevealKey,
    receiver: Party,
    context: RevealContext,
    plaintexts: Vec<Plaintext>,
}

impl FinalizedReveal {
    pub fn key(&self) -> &RevealKey {
        &self.key
    }

    pub fn receiver(&self) -> &Party {
        &self.receiver
    }

    pub fn context(&self) -> &RevealContext {
        &self.context
    }

    /// the plaintexts, in the order of the key's handles
    pub fn plaintexts(&self) -> &[Plaintext] {
        &self.plaintexts
    }

    pub fn into_plaintexts(self) -> Vec<Plaintext> {
        self.plaintexts
    }
}

impl<'a, B: ArithmeticBackend, V: DecryptionVerifier> Execution<'a, B, V> {
    /// Consume a decryption: check that `proof` attests the handles of `key`
    /// decrypt to `plaintexts` and mark the reveal finalized. Succeeds at
    /// most once per key.
    pub fn finalize(
        &mut self,
        key: &RevealKey,
        plaintexts: &[Plaintext],
        proof: &[u8],
    ) -> Result<FinalizedReveal, Error> {
        let record = match self.state.registry.lookup(key) {
            Some(record) => record,
            None if self.state.registry.is_reordering_of_pending(key) => {
                return Err(verification_failed(key, VerificationFailure::OrderMismatch));
            }
            None => return Err(RevealError::InvalidOrExpired(key.clone()).into()),
        };
        match record.status() {
            RevealStatus::Pending => {}
            RevealStatus::Finalized => return Err(RevealError::AlreadyFinalized(key.clone()).into()),
            RevealStatus::Invalid => return Err(RevealError::InvalidOrExpired(key.clone()).into()),
        }
        if record.is_expired(self.now()) {
            return Err(RevealError::InvalidOrExpired(key.clone()).into());
        }

        let handles = key.handles();
        if plaintexts.len() != handles.len() {
            return Err(verification_failed(key, VerificationFailure::LengthMismatch));
        }
        if handles
            .iter()
            .zip(plaintexts)
            .any(|(handle, plaintext)| handle.value_type() != plaintext.value_type())
        {
            return Err(verification_failed(key, VerificationFailure::TypeMismatch));
        }
        if !self.verifier.verify(handles, plaintexts, proof) {
            warn!(%key, "decryption proof rejected");
            return Err(verification_failed(key, VerificationFailure::BadProof));
        }

        let finalized = FinalizedReveal {
            key: key.clone(),
            receiver: *record.receiver(),
            context: record.context().clone(),
            plaintexts: plaintexts.to_vec(),
        };
        self.state
            .registry
            .set_status(key, RevealStatus::Finalized);
        info!(%key, receiver = %finalized.receiver, "reveal finalized");
        Ok(finalized)
    }
}

fn verification_failed(key: &RevealKey, reason: VerificationFailure) -> Error {
    RevealError::ProofVerificationFailed {
        key: key.clone(),
        reason,
    }
    .into()
}
