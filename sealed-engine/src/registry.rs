//! Pending-reveal registry.
//!
//! A reveal request is keyed by the *ordered* list of handles whose
//! plaintexts are asked for together. The order is part of the key: the
//! proof supplied at finalization time attests to one specific ordering and
//! any other ordering is a different statement.

use crate::{
    handle::{Handle, HandleId},
    value::Party,
};
use cryptoxide::{blake2b::Blake2b, digest::Digest};
use im::HashMap;
use std::fmt;
use thiserror::Error;

pub const REVEAL_KEY_DIGEST_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationFailure {
    /// number of plaintexts differs from the number of handles
    LengthMismatch,
    /// a plaintext does not carry the type of its handle
    TypeMismatch,
    /// the key is a reordering of a pending request
    OrderMismatch,
    /// the proof does not attest the statement
    BadProof,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerificationFailure::LengthMismatch => "plaintext count does not match the key",
            VerificationFailure::TypeMismatch => "plaintext types do not match the key",
            VerificationFailure::OrderMismatch => "handles are not in the requested order",
            VerificationFailure::BadProof => "proof does not attest the decryption",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RevealError {
    #[error("a reveal request needs at least one handle")]
    EmptyRequest,

    #[error("a reveal request carries at most {max} handles; got {got}")]
    TooManyHandles { max: usize, got: usize },

    #[error("handle {0} appears twice in the reveal request")]
    DuplicateHandle(HandleId),

    #[error("a reveal of {0} is already registered")]
    DuplicateRequest(RevealKey),

    #[error("no pending reveal for {0}")]
    InvalidOrExpired(RevealKey),

    #[error("reveal {0} was already finalized")]
    AlreadyFinalized(RevealKey),

    #[error("proof verification failed for {key}: {reason}")]
    ProofVerificationFailed {
        key: RevealKey,
        reason: VerificationFailure,
    },

    #[error("only the receiver {receiver} may cancel reveal {key}")]
    NotReceiver { key: RevealKey, receiver: Party },
}

/// Ordered list of handles revealed together.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RevealKey(Vec<Handle>);

impl RevealKey {
    pub fn new(handles: Vec<Handle>) -> Self {
        RevealKey(handles)
    }

    pub fn handles(&self) -> &[Handle] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// blake2b-256 of the ordered handle identifiers; the request identifier
    /// relayers see.
    pub fn digest(&self) -> [u8; REVEAL_KEY_DIGEST_SIZE] {
        let mut out = [0u8; REVEAL_KEY_DIGEST_SIZE];
        let mut hasher = Blake2b::new(REVEAL_KEY_DIGEST_SIZE);
        for handle in &self.0 {
            hasher.input(handle.id().as_ref());
            hasher.input(&[handle.value_type().tag()]);
        }
        hasher.result(&mut out);
        out
    }

    /// the handles, order forgotten
    fn members(&self) -> Vec<HandleId> {
        let mut ids: Vec<HandleId> = self.0.iter().map(|h| *h.id()).collect();
        ids.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
        ids
    }
}

impl From<Vec<Handle>> for RevealKey {
    fn from(handles: Vec<Handle>) -> Self {
        RevealKey(handles)
    }
}

impl fmt::Display for RevealKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reveal:{}", hex::encode(&self.digest()[..8]))
    }
}

impl fmt::Debug for RevealKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RevealKey").field(&self.0).finish()
    }
}

/// Opaque bytes handed back to the receiver when the reveal is finalized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RevealContext(Vec<u8>);

impl RevealContext {
    pub fn new(bytes: Vec<u8>) -> Self {
        RevealContext(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for RevealContext {
    fn from(bytes: &[u8]) -> Self {
        RevealContext(bytes.to_vec())
    }
}

impl From<Vec<u8>> for RevealContext {
    fn from(bytes: Vec<u8>) -> Self {
        RevealContext(bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevealStatus {
    Pending,
    Finalized,
    /// cancelled or expired; never finalizable again
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReveal {
    key: RevealKey,
    receiver: Party,
    context: RevealContext,
    status: RevealStatus,
    requested_at: u64,
    deadline: Option<u64>,
}

impl PendingReveal {
    pub fn key(&self) -> &RevealKey {
        &self.key
    }

    pub fn receiver(&self) -> &Party {
        &self.receiver
    }

    pub fn context(&self) -> &RevealContext {
        &self.context
    }

    pub fn status(&self) -> RevealStatus {
        self.status
    }

    pub fn requested_at(&self) -> u64 {
        self.requested_at
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.deadline.map_or(false, |deadline| deadline < now)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    records: HashMap<RevealKey, PendingReveal>,
    by_members: HashMap<Vec<HandleId>, Vec<RevealKey>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: &RevealKey) -> Option<&PendingReveal> {
        self.records.get(key)
    }

    /// Every record still waiting for a decryption.
    pub fn pending(&self) -> impl Iterator<Item = &PendingReveal> {
        self.records
            .values()
            .filter(|record| record.status == RevealStatus::Pending)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn register(
        &mut self,
        key: RevealKey,
        receiver: Party,
        context: RevealContext,
        requested_at: u64,
        deadline: Option<u64>,
    ) -> Result<(), RevealError> {
        if self.records.contains_key(&key) {
            return Err(RevealError::DuplicateRequest(key));
        }
        self.by_members
            .entry(key.members())
            .or_insert_with(Vec::new)
            .push(key.clone());
        self.records.insert(
            key.clone(),
            PendingReveal {
                key,
                receiver,
                context,
                status: RevealStatus::Pending,
                requested_at,
                deadline,
            },
        );
        Ok(())
    }

    /// `true` if `key` is not registered but one of its reorderings is, and
    /// is still pending.
    pub(crate) fn is_reordering_of_pending(&self, key: &RevealKey) -> bool {
        if self.records.contains_key(key) {
            return false;
        }
        self.by_members
            .get(&key.members())
            .into_iter()
            .flatten()
            .filter_map(|other| self.records.get(other))
            .any(|record| record.status == RevealStatus::Pending)
    }

    pub(crate) fn set_status(&mut self, key: &RevealKey, status: RevealStatus) -> bool {
        match self.records.get_mut(key) {
            Some(record) => {
                record.status = status;
                true
            }
            None => false,
        }
    }

    pub(crate) fn cancel(&mut self, key: &RevealKey, by: &Party) -> Result<(), RevealError> {
        let record = self
            .records
            .get_mut(key)
            .ok_or_else(|| RevealError::InvalidOrExpired(key.clone()))?;
        match record.status {
            RevealStatus::Pending => {}
            RevealStatus::Finalized => return Err(RevealError::AlreadyFinalized(key.clone())),
            RevealStatus::Invalid => return Err(RevealError::InvalidOrExpired(key.clone())),
        }
        if &record.receiver != by {
            return Err(RevealError::NotReceiver {
                key: key.clone(),
                receiver: record.receiver,
            });
        }
        record.status = RevealStatus::Invalid;
        Ok(())
    }

    /// Invalidate every pending record past its deadline.
    pub(crate) fn expire(&mut self, now: u64) -> Vec<RevealKey> {
        let mut expired = Vec::new();
        for (_, record) in self.records.iter_mut() {
            if record.status == RevealStatus::Pending && record.is_expired(now) {
                record.status = RevealStatus::Invalid;
                expired.push(record.key.clone());
            }
        }
        expired
    }

    /// Invalidate every pending record that needs `handle`.
    pub(crate) fn invalidate_touching(&mut self, handle: &HandleId) -> Vec<RevealKey> {
        let mut touched = Vec::new();
        for (_, record) in self.records.iter_mut() {
            if record.status == RevealStatus::Pending
                && record.key.handles().iter().any(|h| h.id() == handle)
            {
                record.status = RevealStatus::Invalid;
                touched.push(record.key.clone());
            }
        }
        touched
    }
}
