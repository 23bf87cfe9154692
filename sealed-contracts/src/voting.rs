//! Yes/no vote with encrypted ballots.
//!
//! Each ballot is an encrypted boolean. Both tallies are updated on every
//! ballot, one of them by zero, so the tally handles say nothing about how
//! anybody voted. Only the final counts are revealed.

use crate::error::ContractError;
use sealed_engine::{
    ArithmeticBackend, DecryptionVerifier, Engine, Handle, HandleSource, Party, Phase, Plaintext,
    RevealContext, RevealKey, ValueType,
};
use std::collections::HashSet;
use tracing::info;

pub const CONTEXT: &[u8] = b"confidential-vote/close";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub yes: u64,
    pub no: u64,
}

impl Tally {
    /// A tie rejects the proposal.
    pub fn accepted(&self) -> bool {
        self.yes > self.no
    }
}

#[derive(Debug, Clone)]
pub struct ConfidentialVote {
    organizer: Party,
    phase: Phase,
    voters: HashSet<Party>,
    tallies: Option<(Handle, Handle)>,
    pending: Option<RevealKey>,
    result: Option<Tally>,
}

impl ConfidentialVote {
    pub fn new(organizer: Party) -> Self {
        ConfidentialVote {
            organizer,
            phase: Phase::Open,
            voters: HashSet::new(),
            tallies: None,
            pending: None,
            result: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn has_voted(&self, voter: &Party) -> bool {
        self.voters.contains(voter)
    }

    pub fn result(&self) -> Option<Tally> {
        self.result
    }

    pub fn cast<B, V>(
        &mut self,
        engine: &mut Engine<B, V>,
        voter: Party,
        ballot: HandleSource,
    ) -> Result<(), ContractError>
    where
        B: ArithmeticBackend,
        V: DecryptionVerifier,
    {
        if self.phase != Phase::Open {
            return Err(ContractError::Closed);
        }
        if self.voters.contains(&voter) {
            return Err(ContractError::AlreadyVoted(voter));
        }
        let previous = self.tallies;

        let tallies = engine.execute(voter, |exec| {
            let ballot = exec.create(ValueType::Bool, ballot)?;
            exec.require_caller(&ballot)?;
            let (yes, no) = match previous {
                Some(tallies) => tallies,
                None => (
                    exec.constant(ValueType::U64, 0)?,
                    exec.constant(ValueType::U64, 0)?,
                ),
            };
            let yes_plus_one = exec.add_scalar(yes, 1)?;
            let yes_plus_one = exec.scratch(yes_plus_one)?;
            let no_plus_one = exec.add_scalar(no, 1)?;
            let no_plus_one = exec.scratch(no_plus_one)?;
            let yes = exec.select(ballot, yes_plus_one, yes)?;
            let no = exec.select(ballot, no, no_plus_one)?;
            Ok::<_, ContractError>((exec.keep(yes)?, exec.keep(no)?))
        })?;

        self.voters.insert(voter);
        self.tallies = Some(tallies);
        if let Some((yes, no)) = previous {
            engine.collect_garbage(&[yes, no]);
        }
        engine.collect_unreachable();
        Ok(())
    }

    /// End the vote and request the reveal of both tallies. A vote nobody
    /// took part in is rejected on the spot.
    pub fn close<B, V>(
        &mut self,
        engine: &mut Engine<B, V>,
        caller: Party,
    ) -> Result<Option<RevealKey>, ContractError>
    where
        B: ArithmeticBackend,
        V: DecryptionVerifier,
    {
        if caller != self.organizer {
            return Err(ContractError::NotAllowed {
                expected: self.organizer,
            });
        }
        let mut phase = self.phase;
        phase.advance(Phase::Computing)?;
        let (yes, no) = match self.tallies {
            Some(tallies) => tallies,
            None => {
                phase.advance(Phase::Rejected)?;
                self.phase = phase;
                return Ok(None);
            }
        };
        phase.advance(Phase::AwaitingReveal)?;

        let key = engine.execute(caller, |exec| {
            let host = exec.host();
            exec.request_reveal(&[yes, no], host, RevealContext::from(CONTEXT))
        })?;
        self.phase = phase;
        self.pending = Some(key.clone());
        Ok(Some(key))
    }

    pub fn settle<B, V>(
        &mut self,
        engine: &mut Engine<B, V>,
        caller: Party,
        plaintexts: &[Plaintext],
        proof: &[u8],
    ) -> Result<Tally, ContractError>
    where
        B: ArithmeticBackend,
        V: DecryptionVerifier,
    {
        let key = self.pending.clone().ok_or(ContractError::NotAwaitingReveal)?;
        let tally = engine.execute(caller, |exec| {
            let revealed = exec.finalize(&key, plaintexts, proof)?;
            match revealed.plaintexts() {
                [Plaintext::U64(yes), Plaintext::U64(no)] => Ok(Tally { yes: *yes, no: *no }),
                _ => Err(ContractError::MalformedReveal),
            }
        })?;

        let next = if tally.accepted() {
            Phase::Finalized
        } else {
            Phase::Rejected
        };
        self.phase.advance(next)?;
        self.result = Some(tally);
        info!(yes = tally.yes, no = tally.no, accepted = tally.accepted(), "vote settled");
        Ok(tally)
    }
}
