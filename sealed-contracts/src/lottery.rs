//! Lottery drawn from encrypted randomness.
//!
//! The winning position is an encrypted random `euint32` reduced modulo the
//! public number of players. Nobody, the organizer included, can know or
//! steer it before the reveal.

use crate::{error::ContractError, payout::Payouts};
use sealed_engine::{
    ArithmeticBackend, DecryptionVerifier, Engine, Party, Phase, Plaintext, RevealContext,
    RevealKey, ValueType,
};
use tracing::info;

pub const CONTEXT: &[u8] = b"lottery/draw";

#[derive(Debug, Clone)]
pub struct Lottery {
    organizer: Party,
    prize: u128,
    phase: Phase,
    players: Vec<Party>,
    pending: Option<RevealKey>,
    winner: Option<Party>,
    payouts: Payouts,
}

impl Lottery {
    pub fn new(organizer: Party, prize: u128) -> Self {
        Lottery {
            organizer,
            prize,
            phase: Phase::Open,
            players: Vec::new(),
            pending: None,
            winner: None,
            payouts: Payouts::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn players(&self) -> &[Party] {
        &self.players
    }

    pub fn winner(&self) -> Option<Party> {
        self.winner
    }

    pub fn payouts(&self) -> &Payouts {
        &self.payouts
    }

    pub fn join(&mut self, player: Party) -> Result<(), ContractError> {
        if self.phase != Phase::Open {
            return Err(ContractError::Closed);
        }
        if self.players.contains(&player) {
            return Err(ContractError::AlreadyJoined(player));
        }
        self.players.push(player);
        Ok(())
    }

    pub fn draw<B, V>(
        &mut self,
        engine: &mut Engine<B, V>,
        caller: Party,
    ) -> Result<RevealKey, ContractError>
    where
        B: ArithmeticBackend,
        V: DecryptionVerifier,
    {
        if caller != self.organizer {
            return Err(ContractError::NotAllowed {
                expected: self.organizer,
            });
        }
        if self.players.is_empty() {
            return Err(ContractError::NotEnoughPlayers);
        }
        let mut phase = self.phase;
        phase.advance(Phase::Computing)?;
        phase.advance(Phase::AwaitingReveal)?;

        let count = self.players.len() as u128;
        let key = engine.execute(caller, |exec| {
            let random = exec.create_random(ValueType::U32)?;
            let random = exec.scratch(random)?;
            let position = exec.rem_scalar(random, count)?;
            let position = exec.keep(position)?;
            let host = exec.host();
            exec.request_reveal(&[position], host, RevealContext::from(CONTEXT))
        })?;
        self.phase = phase;
        self.pending = Some(key.clone());
        engine.collect_unreachable();
        info!(players = self.players.len(), "lottery drawn");
        Ok(key)
    }

    pub fn settle<B, V>(
        &mut self,
        engine: &mut Engine<B, V>,
        caller: Party,
        plaintexts: &[Plaintext],
        proof: &[u8],
    ) -> Result<Party, ContractError>
    where
        B: ArithmeticBackend,
        V: DecryptionVerifier,
    {
        let key = self.pending.clone().ok_or(ContractError::NotAwaitingReveal)?;
        let players = &self.players;
        let winner = engine.execute(caller, |exec| {
            let revealed = exec.finalize(&key, plaintexts, proof)?;
            match revealed.plaintexts() {
                [Plaintext::U32(position)] => players
                    .get(*position as usize)
                    .copied()
                    .ok_or(ContractError::MalformedReveal),
                _ => Err(ContractError::MalformedReveal),
            }
        })?;

        self.phase.advance(Phase::Finalized)?;
        self.winner = Some(winner);
        self.payouts.pay(winner, self.prize);
        info!(%winner, "lottery settled");
        Ok(winner)
    }
}
