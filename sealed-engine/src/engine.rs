//! The engine and its executions.
//!
//! Every mutation happens inside an [`Execution`], opened with
//! [`Engine::execute`]. An execution works on a private copy of the
//! committed state (persistent maps, so the copy shares its structure with
//! the original): if the closure returns `Ok` the copy, minus its
//! transient grants, becomes the committed state; if it returns `Err` the
//! copy is dropped and nothing the closure did is visible afterwards.

use crate::{
    acl::{Acl, Scope, Unauthorized},
    backend::ArithmeticBackend,
    config::{ConfigError, EngineConfig},
    error::Error,
    handle::{Handle, HandleId, HandleSource},
    operation::Operation,
    proof::DecryptionVerifier,
    registry::{PendingReveal, RevealContext, RevealError, RevealKey, Registry},
    store::{HandleRecord, HandleStore},
    value::{Party, ValueType},
};
use std::{collections::HashSet, fmt};
use tracing::{debug, info, info_span, warn};

/// Sequence number of an execution; strictly increasing over the life of an
/// engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExecutionId(u64);

impl ExecutionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct State {
    pub(crate) store: HandleStore,
    pub(crate) acl: Acl,
    pub(crate) registry: Registry,
}

pub struct Engine<B, V> {
    config: EngineConfig,
    backend: B,
    verifier: V,
    state: State,
    /// handles minted by committed executions, not yet swept
    minted: Vec<Handle>,
    next_execution: u64,
    now: u64,
}

impl<B: ArithmeticBackend, V: DecryptionVerifier> Engine<B, V> {
    pub fn new(config: EngineConfig, backend: B, verifier: V) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Engine {
            config,
            backend,
            verifier,
            state: State::default(),
            minted: Vec::new(),
            next_execution: 0,
            now: 0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn host(&self) -> Party {
        self.config.host
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    /// Host supplied logical time (e.g. a block height).
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Advance the logical time. Time never goes backward: an older `now`
    /// is ignored.
    pub fn set_time(&mut self, now: u64) {
        self.now = self.now.max(now);
    }

    /// Run `f` as one all-or-nothing execution on behalf of `caller`.
    pub fn execute<T, E, F>(&mut self, caller: Party, f: F) -> Result<T, E>
    where
        E: fmt::Display,
        F: FnOnce(&mut Execution<'_, B, V>) -> Result<T, E>,
    {
        let id = ExecutionId(self.next_execution);
        self.next_execution += 1;

        let span = info_span!("execution", id = id.0, %caller);
        let _enter = span.enter();

        let mut execution = Execution {
            id,
            caller,
            now: self.now,
            config: &self.config,
            backend: &mut self.backend,
            verifier: &self.verifier,
            state: self.state.clone(),
            minted: Vec::new(),
        };
        match f(&mut execution) {
            Ok(value) => {
                let mut state = execution.state;
                let dropped = state.acl.clear_transient();
                debug!(
                    transient_grants = dropped,
                    minted = execution.minted.len(),
                    "execution committed"
                );
                self.state = state;
                self.minted.extend(execution.minted);
                Ok(value)
            }
            Err(error) => {
                warn!(%error, "execution aborted");
                Err(error)
            }
        }
    }

    pub fn exists(&self, handle: &Handle) -> bool {
        self.state.store.exists(handle)
    }

    pub fn handle_record(&self, handle: &Handle) -> Option<&HandleRecord> {
        self.state.store.get(handle)
    }

    pub fn is_authorized(&self, handle: &Handle, party: &Party) -> bool {
        self.state.store.exists(handle) && self.state.acl.is_authorized(handle.id(), party)
    }

    pub fn is_reveal_eligible(&self, handle: &Handle) -> bool {
        self.state.store.exists(handle) && self.state.acl.is_reveal_eligible(handle.id())
    }

    pub fn lookup(&self, key: &RevealKey) -> Option<&PendingReveal> {
        self.state.registry.lookup(key)
    }

    /// Reveals waiting for a decryption, for relayers to pick up.
    pub fn pending(&self) -> impl Iterator<Item = &PendingReveal> {
        self.state.registry.pending()
    }

    pub fn store(&self) -> &HandleStore {
        &self.state.store
    }

    pub fn acl(&self) -> &Acl {
        &self.state.acl
    }

    pub fn registry(&self) -> &Registry {
        &self.state.registry
    }

    /// Invalidate every pending reveal whose deadline is before `now`.
    pub fn expire_reveals(&mut self, now: u64) -> Vec<RevealKey> {
        self.set_time(now);
        let expired = self.state.registry.expire(self.now);
        for key in &expired {
            info!(%key, now = self.now, "reveal expired");
        }
        expired
    }

    /// Forget handles the host has no more use for. Their grants and
    /// reveal-eligibility go with them and any pending reveal that needs one
    /// of them is invalidated. Returns the number of handles collected.
    pub fn collect_garbage(&mut self, handles: &[Handle]) -> usize {
        let mut collected = 0;
        for handle in handles {
            if self.state.store.remove(handle).is_none() {
                continue;
            }
            self.state.acl.forget(handle.id());
            for key in self.state.registry.invalidate_touching(handle.id()) {
                info!(%key, handle = ?handle.id(), "reveal invalidated by collection");
            }
            collected += 1;
        }
        debug!(collected, "garbage collected");
        collected
    }

    /// Collect every handle minted since the last sweep that nobody holds a
    /// permanent grant on and that no pending reveal needs. Such a handle
    /// can never be used again: its transient grants are gone and it is no
    /// longer fresh, so nobody can be granted access to it.
    ///
    /// Handles pinned by a pending reveal are looked at again by the next
    /// sweep. Handles holding a grant are not; superseded ones go through
    /// [`collect_garbage`](Self::collect_garbage).
    pub fn collect_unreachable(&mut self) -> usize {
        let minted = std::mem::take(&mut self.minted);
        let pinned: HashSet<HandleId> = self
            .state
            .registry
            .pending()
            .flat_map(|record| record.key().handles().iter().map(|h| *h.id()))
            .collect();
        let (held, unreachable): (Vec<Handle>, Vec<Handle>) = minted
            .into_iter()
            .filter(|handle| {
                self.state.store.exists(handle)
                    && self.state.acl.grantees(handle.id()).next().is_none()
            })
            .partition(|handle| pinned.contains(handle.id()));
        self.minted = held;
        self.collect_garbage(&unreachable)
    }
}

/// One logical operation in progress.
pub struct Execution<'a, B, V> {
    id: ExecutionId,
    caller: Party,
    now: u64,
    config: &'a EngineConfig,
    pub(crate) backend: &'a mut B,
    pub(crate) verifier: &'a V,
    pub(crate) state: State,
    minted: Vec<Handle>,
}

impl<'a, B: ArithmeticBackend, V: DecryptionVerifier> Execution<'a, B, V> {
    pub fn id(&self) -> ExecutionId {
        self.id
    }

    /// party on whose behalf the execution runs
    pub fn caller(&self) -> Party {
        self.caller
    }

    pub fn host(&self) -> Party {
        self.config.host
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn exists(&self, handle: &Handle) -> bool {
        self.state.store.exists(handle)
    }

    pub fn is_authorized(&self, handle: &Handle, party: &Party) -> bool {
        self.state.store.exists(handle) && self.state.acl.is_authorized(handle.id(), party)
    }

    pub fn lookup(&self, key: &RevealKey) -> Option<&PendingReveal> {
        self.state.registry.lookup(key)
    }

    /// Create a handle from a public seed or from a ciphertext supplied by
    /// the caller. An imported ciphertext is usable by the caller and the
    /// host for this execution only; the host keeps it with
    /// [`grant_self`](Self::grant_self).
    pub fn create(&mut self, ty: ValueType, source: HandleSource) -> Result<Handle, Error> {
        let handle = self
            .state
            .store
            .create(self.backend, ty, &source, self.id)?;
        self.minted.push(handle);
        if let HandleSource::External(_) = source {
            self.state
                .acl
                .grant(handle.id(), self.caller, Scope::Transient);
            self.state
                .acl
                .grant(handle.id(), self.config.host, Scope::Transient);
        }
        Ok(handle)
    }

    /// fresh handle to an encrypted uniformly random value
    pub fn create_random(&mut self, ty: ValueType) -> Result<Handle, Error> {
        let handle = self.state.store.create_random(self.backend, ty, self.id)?;
        self.minted.push(handle);
        Ok(handle)
    }

    /// Apply `op` to `inputs`. The host must be authorized on every input.
    pub fn derive(&mut self, op: Operation, inputs: &[Handle]) -> Result<Handle, Error> {
        for input in inputs {
            self.require_host(input)?;
        }
        let handle = self.state.store.derive(self.backend, op, inputs, self.id)?;
        self.minted.push(handle);
        Ok(handle)
    }

    pub fn require_host(&self, handle: &Handle) -> Result<(), Error> {
        self.state.store.require(handle)?;
        if self.state.acl.is_authorized(handle.id(), &self.config.host) {
            Ok(())
        } else {
            Err(Unauthorized::HostSelfGrantMissing {
                host: self.config.host,
                handle: *handle.id(),
            }
            .into())
        }
    }

    /// Fail unless the caller holds a grant on `handle`.
    pub fn require_caller(&self, handle: &Handle) -> Result<(), Error> {
        self.require_party(handle, self.caller)
    }

    pub fn require_party(&self, handle: &Handle, party: Party) -> Result<(), Error> {
        self.state.store.require(handle)?;
        if self.state.acl.is_authorized(handle.id(), &party) {
            Ok(())
        } else {
            Err(Unauthorized::Requester {
                party,
                handle: *handle.id(),
            }
            .into())
        }
    }

    pub fn grant_permanent(&mut self, handle: &Handle, grantee: Party) -> Result<(), Error> {
        self.grant(handle, grantee, Scope::Permanent)
    }

    pub fn grant_transient(&mut self, handle: &Handle, grantee: Party) -> Result<(), Error> {
        self.grant(handle, grantee, Scope::Transient)
    }

    /// Permanent grant to the host itself.
    pub fn grant_self(&mut self, handle: &Handle) -> Result<(), Error> {
        self.grant(handle, self.config.host, Scope::Permanent)
    }

    /// Only handles the host may use, or that were minted by this very
    /// execution, can be shared.
    fn grant(&mut self, handle: &Handle, grantee: Party, scope: Scope) -> Result<(), Error> {
        let record = self.state.store.require(handle)?;
        let fresh = record.created_in() == self.id;
        if !fresh && !self.state.acl.is_authorized(handle.id(), &self.config.host) {
            return Err(Unauthorized::HostSelfGrantMissing {
                host: self.config.host,
                handle: *handle.id(),
            }
            .into());
        }
        self.state.acl.grant(handle.id(), grantee, scope);
        Ok(())
    }

    /// Remove a permanent grant; `false` if there was none.
    pub fn revoke(&mut self, handle: &Handle, grantee: &Party) -> Result<bool, Error> {
        self.state.store.require(handle)?;
        Ok(self.state.acl.revoke(handle.id(), grantee))
    }

    /// Ask for the plaintexts of `handles`, in this order, to be delivered to
    /// `receiver`. Returns the key under which the request is registered.
    pub fn request_reveal(
        &mut self,
        handles: &[Handle],
        receiver: Party,
        context: impl Into<RevealContext>,
    ) -> Result<RevealKey, Error> {
        if handles.is_empty() {
            return Err(RevealError::EmptyRequest.into());
        }
        if handles.len() > self.config.max_reveal_handles {
            return Err(RevealError::TooManyHandles {
                max: self.config.max_reveal_handles,
                got: handles.len(),
            }
            .into());
        }
        let mut seen = HashSet::with_capacity(handles.len());
        for handle in handles {
            if !seen.insert(handle.id()) {
                return Err(RevealError::DuplicateHandle(*handle.id()).into());
            }
        }
        for handle in handles {
            self.require_host(handle)?;
            if receiver != self.config.host {
                self.require_party(handle, receiver)?;
            }
        }

        let key = RevealKey::new(handles.to_vec());
        let deadline = self.config.deadline(self.now);
        self.state
            .registry
            .register(key.clone(), receiver, context.into(), self.now, deadline)?;
        for handle in handles {
            self.state.acl.mark_reveal_eligible(handle.id());
        }
        info!(%key, %receiver, handles = handles.len(), ?deadline, "reveal requested");
        Ok(key)
    }

    /// Withdraw a pending reveal. A reveal addressed to the host may be
    /// withdrawn by host code whoever the caller is; any other reveal only by
    /// its receiver.
    pub fn cancel_reveal(&mut self, key: &RevealKey) -> Result<(), Error> {
        let by = match self.state.registry.lookup(key) {
            Some(record) if *record.receiver() == self.config.host => self.config.host,
            _ => self.caller,
        };
        self.state.registry.cancel(key, &by)?;
        info!(%key, "reveal cancelled");
        Ok(())
    }
}
