//! Sealed-bid auction.
//!
//! Bids are encrypted `euint64`s. Nobody, the contract included, learns a
//! bid until bidding is closed, and then only the highest one and the
//! position of its bidder are revealed.

use crate::{error::ContractError, payout::Payouts};
use sealed_engine::{
    ArithmeticBackend, DecryptionVerifier, Engine, Handle, HandleSource, Party, Phase, Plaintext,
    RevealContext, RevealKey, ValueType,
};
use tracing::info;

pub const CONTEXT: &[u8] = b"blind-auction/close";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Winner {
    pub bidder: Party,
    pub amount: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuctionOutcome {
    Won(Winner),
    /// the highest bid did not reach the minimum
    NoWinner { highest: u64 },
}

#[derive(Debug, Clone)]
pub struct BlindAuction {
    beneficiary: Party,
    minimum_bid: u64,
    phase: Phase,
    bidders: Vec<Party>,
    bids: Vec<Handle>,
    pending: Option<RevealKey>,
    winner: Option<Winner>,
    payouts: Payouts,
}

impl BlindAuction {
    pub fn new(beneficiary: Party, minimum_bid: u64) -> Self {
        BlindAuction {
            beneficiary,
            minimum_bid,
            phase: Phase::Open,
            bidders: Vec::new(),
            bids: Vec::new(),
            pending: None,
            winner: None,
            payouts: Payouts::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn bidders(&self) -> &[Party] {
        &self.bidders
    }

    /// the encrypted bid of `bidder`, readable by the bidder
    pub fn bid_of(&self, bidder: &Party) -> Option<Handle> {
        self.position(bidder).map(|i| self.bids[i])
    }

    pub fn pending(&self) -> Option<&RevealKey> {
        self.pending.as_ref()
    }

    pub fn winner(&self) -> Option<Winner> {
        self.winner
    }

    pub fn payouts(&self) -> &Payouts {
        &self.payouts
    }

    fn position(&self, bidder: &Party) -> Option<usize> {
        self.bidders.iter().position(|b| b == bidder)
    }

    /// Place, or raise, an encrypted bid. Bidding again keeps the larger of
    /// the two bids without revealing which one it is; the bid it replaces
    /// is collected.
    pub fn bid<B, V>(
        &mut self,
        engine: &mut Engine<B, V>,
        bidder: Party,
        ciphertext: HandleSource,
    ) -> Result<Handle, ContractError>
    where
        B: ArithmeticBackend,
        V: DecryptionVerifier,
    {
        if self.phase != Phase::Open {
            return Err(ContractError::Closed);
        }
        let position = self.position(&bidder);
        let previous = position.map(|i| self.bids[i]);

        let bid = engine.execute(bidder, |exec| {
            let bid = exec.create(ValueType::U64, ciphertext)?;
            exec.require_caller(&bid)?;
            let bid = match previous {
                None => bid,
                Some(previous) => {
                    let higher = exec.gt(bid, previous)?;
                    let higher = exec.scratch(higher)?;
                    exec.select(higher, bid, previous)?
                }
            };
            exec.keep(bid)?;
            exec.grant_permanent(&bid, bidder)?;
            Ok::<_, ContractError>(bid)
        })?;

        match position {
            Some(i) => self.bids[i] = bid,
            None => {
                self.bidders.push(bidder);
                self.bids.push(bid);
            }
        }
        if let Some(previous) = previous {
            engine.collect_garbage(&[previous]);
        }
        engine.collect_unreachable();
        Ok(bid)
    }

    /// Stop bidding and request the reveal of the highest bid and of its
    /// position. Without any bid the auction is rejected straight away and
    /// `None` is returned.
    pub fn close<B, V>(
        &mut self,
        engine: &mut Engine<B, V>,
        caller: Party,
    ) -> Result<Option<RevealKey>, ContractError>
    where
        B: ArithmeticBackend,
        V: DecryptionVerifier,
    {
        if caller != self.beneficiary {
            return Err(ContractError::NotAllowed {
                expected: self.beneficiary,
            });
        }
        let mut phase = self.phase;
        phase.advance(Phase::Computing)?;
        if self.bids.is_empty() {
            phase.advance(Phase::Rejected)?;
            self.phase = phase;
            info!("auction closed without bids");
            return Ok(None);
        }
        phase.advance(Phase::AwaitingReveal)?;

        let bids = &self.bids;
        let key = engine.execute(caller, |exec| {
            let (highest, index) = exec.max_with_index(bids)?;
            exec.keep(highest)?;
            exec.keep(index)?;
            let host = exec.host();
            exec.request_reveal(&[highest, index], host, RevealContext::from(CONTEXT))
        })?;

        self.phase = phase;
        self.pending = Some(key.clone());
        engine.collect_unreachable();
        Ok(Some(key))
    }

    /// Consume the decryption of the closing reveal. Anybody may relay it;
    /// it takes effect once.
    pub fn settle<B, V>(
        &mut self,
        engine: &mut Engine<B, V>,
        caller: Party,
        plaintexts: &[Plaintext],
        proof: &[u8],
    ) -> Result<AuctionOutcome, ContractError>
    where
        B: ArithmeticBackend,
        V: DecryptionVerifier,
    {
        let key = self.pending.clone().ok_or(ContractError::NotAwaitingReveal)?;
        let bidders = &self.bidders;
        let (amount, bidder) = engine.execute(caller, |exec| {
            let revealed = exec.finalize(&key, plaintexts, proof)?;
            match revealed.plaintexts() {
                [Plaintext::U64(amount), Plaintext::U32(index)] => bidders
                    .get(*index as usize)
                    .map(|bidder| (*amount, *bidder))
                    .ok_or(ContractError::MalformedReveal),
                _ => Err(ContractError::MalformedReveal),
            }
        })?;

        if amount < self.minimum_bid {
            self.phase.advance(Phase::Rejected)?;
            info!(highest = amount, minimum = self.minimum_bid, "auction without winner");
            return Ok(AuctionOutcome::NoWinner { highest: amount });
        }
        self.phase.advance(Phase::Finalized)?;
        let winner = Winner { bidder, amount };
        self.winner = Some(winner);
        self.payouts.pay(self.beneficiary, amount as u128);
        info!(%bidder, amount, "auction won");
        Ok(AuctionOutcome::Won(winner))
    }
}
