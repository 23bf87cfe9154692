//! Access control list: who may use, or eventually learn, the value behind a
//! handle.
//!
//! Grants come in two scopes. A permanent grant survives until explicitly
//! revoked or until its handle is garbage collected. A transient grant lives
//! for the execution that created it and is dropped when that execution
//! ends, whatever its outcome.
//!
//! The host is a grantee like any other: it needs a grant of its own on a
//! handle before it can compute on it or expose it for decryption, and
//! holding that grant tells nothing about anybody else's.

use crate::{handle::HandleId, value::Party};
use im::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Permanent,
    Transient,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Unauthorized {
    #[error("host {host} holds no grant on handle {handle}; it must grant itself access first")]
    HostSelfGrantMissing { host: Party, handle: HandleId },

    #[error("{party} holds no grant on handle {handle}")]
    Requester { party: Party, handle: HandleId },
}

impl Unauthorized {
    pub fn handle(&self) -> &HandleId {
        match self {
            Unauthorized::HostSelfGrantMissing { handle, .. } => handle,
            Unauthorized::Requester { handle, .. } => handle,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Acl {
    permanent: HashMap<HandleId, HashSet<Party>>,
    transient: HashMap<HandleId, HashSet<Party>>,
    reveal_eligible: HashSet<HandleId>,
}

impl Acl {
    pub fn new() -> Self {
        Self::default()
    }

    /// record a grant, return `true` if it was not already there
    pub(crate) fn grant(&mut self, handle: &HandleId, grantee: Party, scope: Scope) -> bool {
        let table = match scope {
            Scope::Permanent => &mut self.permanent,
            Scope::Transient => &mut self.transient,
        };
        let added = table
            .entry(*handle)
            .or_insert_with(HashSet::new)
            .insert(grantee)
            .is_none();
        if added {
            debug!(handle = ?handle, %grantee, ?scope, "access granted");
        }
        added
    }

    /// Remove a permanent grant. Returns `false` if there was none.
    pub(crate) fn revoke(&mut self, handle: &HandleId, grantee: &Party) -> bool {
        let removed = match self.permanent.get_mut(handle) {
            Some(grantees) => grantees.remove(grantee).is_some(),
            None => false,
        };
        if self
            .permanent
            .get(handle)
            .map_or(false, |grantees| grantees.is_empty())
        {
            self.permanent.remove(handle);
        }
        if removed {
            debug!(handle = ?handle, %grantee, "access revoked");
        }
        removed
    }

    pub fn is_authorized(&self, handle: &HandleId, party: &Party) -> bool {
        self.scope_of(handle, party).is_some()
    }

    /// The widest scope under which `party` may use `handle`.
    pub fn scope_of(&self, handle: &HandleId, party: &Party) -> Option<Scope> {
        let holds = |table: &HashMap<HandleId, HashSet<Party>>| {
            table
                .get(handle)
                .map_or(false, |grantees| grantees.contains(party))
        };
        if holds(&self.permanent) {
            Some(Scope::Permanent)
        } else if holds(&self.transient) {
            Some(Scope::Transient)
        } else {
            None
        }
    }

    /// Parties holding a permanent grant on `handle`.
    pub fn grantees<'a>(&'a self, handle: &HandleId) -> impl Iterator<Item = &'a Party> + 'a {
        self.permanent
            .get(handle)
            .into_iter()
            .flat_map(|grantees| grantees.iter())
    }

    pub(crate) fn clear_transient(&mut self) -> usize {
        let dropped = self.transient.values().map(|grantees| grantees.len()).sum();
        self.transient = HashMap::new();
        dropped
    }

    pub(crate) fn mark_reveal_eligible(&mut self, handle: &HandleId) {
        self.reveal_eligible.insert(*handle);
    }

    /// `true` once the host has asked for the handle to be decrypted. A
    /// decryption service refuses any other handle.
    pub fn is_reveal_eligible(&self, handle: &HandleId) -> bool {
        self.reveal_eligible.contains(handle)
    }

    /// drop everything attached to a collected handle
    pub(crate) fn forget(&mut self, handle: &HandleId) {
        self.permanent.remove(handle);
        self.transient.remove(handle);
        self.reveal_eligible.remove(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(b: u8) -> HandleId {
        HandleId::from_bytes([b; 32])
    }

    fn party(b: u8) -> Party {
        Party::new([b; 20])
    }

    #[test]
    fn permanent_grant_is_idempotent() {
        let mut acl = Acl::new();
        assert!(acl.grant(&id(1), party(1), Scope::Permanent));
        assert!(!acl.grant(&id(1), party(1), Scope::Permanent));
        assert_eq!(acl.grantees(&id(1)).count(), 1);
        assert_eq!(acl.scope_of(&id(1), &party(1)), Some(Scope::Permanent));
    }

    #[test]
    fn transient_grants_are_cleared_wholesale() {
        let mut acl = Acl::new();
        acl.grant(&id(1), party(1), Scope::Transient);
        acl.grant(&id(2), party(1), Scope::Transient);
        acl.grant(&id(2), party(2), Scope::Permanent);

        assert_eq!(acl.clear_transient(), 2);
        assert!(!acl.is_authorized(&id(1), &party(1)));
        assert!(!acl.is_authorized(&id(2), &party(1)));
        assert!(acl.is_authorized(&id(2), &party(2)));
    }

    #[test]
    fn grants_are_per_party() {
        let mut acl = Acl::new();
        acl.grant(&id(1), party(1), Scope::Permanent);
        assert!(!acl.is_authorized(&id(1), &party(2)));
        assert!(!acl.is_authorized(&id(2), &party(1)));
    }

    #[test]
    fn revoke_only_touches_permanent_grants() {
        let mut acl = Acl::new();
        acl.grant(&id(1), party(1), Scope::Transient);
        assert!(!acl.revoke(&id(1), &party(1)));
        assert!(acl.is_authorized(&id(1), &party(1)));

        acl.grant(&id(1), party(2), Scope::Permanent);
        assert!(acl.revoke(&id(1), &party(2)));
        assert!(!acl.is_authorized(&id(1), &party(2)));
        assert_eq!(acl.grantees(&id(1)).count(), 0);
    }

    #[test]
    fn forget_drops_every_trace_of_a_handle() {
        let mut acl = Acl::new();
        acl.grant(&id(1), party(1), Scope::Permanent);
        acl.grant(&id(1), party(2), Scope::Transient);
        acl.mark_reveal_eligible(&id(1));

        acl.forget(&id(1));
        assert!(!acl.is_authorized(&id(1), &party(1)));
        assert!(!acl.is_authorized(&id(1), &party(2)));
        assert!(!acl.is_reveal_eligible(&id(1)));
    }
}
