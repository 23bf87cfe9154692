//! Escrow with a confidential penalty.
//!
//! The depositor funds an encrypted amount, the arbiter assesses an
//! encrypted penalty, and the beneficiary can read, then release, what is
//! left: `amount - penalty`, or zero when the penalty exceeds the amount.
//! Neither the amount nor the penalty is ever revealed.

use crate::{error::ContractError, payout::Payouts};
use sealed_engine::{
    ArithmeticBackend, DecryptionVerifier, Engine, Handle, HandleSource, Party, Phase, Plaintext,
    RevealContext, RevealKey, ValueType,
};
use tracing::info;

pub const CONTEXT: &[u8] = b"escrow/release";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parties {
    pub depositor: Party,
    pub beneficiary: Party,
    pub arbiter: Party,
}

#[derive(Debug, Clone)]
pub struct Escrow {
    parties: Parties,
    phase: Phase,
    amount: Option<Handle>,
    releasable: Option<Handle>,
    pending: Option<RevealKey>,
    released: Option<u64>,
    payouts: Payouts,
}

impl Escrow {
    pub fn new(parties: Parties) -> Self {
        Escrow {
            parties,
            phase: Phase::Open,
            amount: None,
            releasable: None,
            pending: None,
            released: None,
            payouts: Payouts::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// encrypted amount the beneficiary may read once assessed
    pub fn releasable(&self) -> Option<Handle> {
        self.releasable
    }

    pub fn released(&self) -> Option<u64> {
        self.released
    }

    pub fn payouts(&self) -> &Payouts {
        &self.payouts
    }

    fn only(&self, caller: Party, expected: Party) -> Result<(), ContractError> {
        if caller == expected {
            Ok(())
        } else {
            Err(ContractError::NotAllowed { expected })
        }
    }

    pub fn fund<B, V>(
        &mut self,
        engine: &mut Engine<B, V>,
        caller: Party,
        amount: HandleSource,
    ) -> Result<(), ContractError>
    where
        B: ArithmeticBackend,
        V: DecryptionVerifier,
    {
        self.only(caller, self.parties.depositor)?;
        if self.phase != Phase::Open {
            return Err(ContractError::Closed);
        }
        if self.amount.is_some() {
            return Err(ContractError::AlreadyFunded);
        }
        let depositor = self.parties.depositor;
        let amount = engine.execute(caller, |exec| {
            let amount = exec.create(ValueType::U64, amount)?;
            exec.require_caller(&amount)?;
            exec.keep(amount)?;
            exec.grant_permanent(&amount, depositor)?;
            Ok::<_, ContractError>(amount)
        })?;
        self.amount = Some(amount);
        engine.collect_unreachable();
        Ok(())
    }

    /// The arbiter's encrypted penalty. Computes, without branching, what
    /// the beneficiary will be able to release and lets the beneficiary
    /// read it.
    pub fn assess<B, V>(
        &mut self,
        engine: &mut Engine<B, V>,
        caller: Party,
        penalty: HandleSource,
    ) -> Result<Handle, ContractError>
    where
        B: ArithmeticBackend,
        V: DecryptionVerifier,
    {
        self.only(caller, self.parties.arbiter)?;
        let amount = self.amount.ok_or(ContractError::NotFunded)?;
        let mut phase = self.phase;
        phase.advance(Phase::Computing)?;

        let beneficiary = self.parties.beneficiary;
        let releasable = engine.execute(caller, |exec| {
            let penalty = exec.create(ValueType::U64, penalty)?;
            exec.require_caller(&penalty)?;
            let exceeds = exec.gt(penalty, amount)?;
            let exceeds = exec.scratch(exceeds)?;
            let rest = exec.sub(amount, penalty)?;
            let rest = exec.scratch(rest)?;
            let zero = exec.constant(ValueType::U64, 0)?;
            let releasable = exec.select(exceeds, zero, rest)?;
            exec.keep(releasable)?;
            exec.grant_permanent(&releasable, beneficiary)?;
            Ok::<_, ContractError>(releasable)
        })?;
        self.phase = phase;
        self.releasable = Some(releasable);
        engine.collect_unreachable();
        Ok(releasable)
    }

    /// The beneficiary asks for the releasable amount to be revealed.
    pub fn release<B, V>(
        &mut self,
        engine: &mut Engine<B, V>,
        caller: Party,
    ) -> Result<RevealKey, ContractError>
    where
        B: ArithmeticBackend,
        V: DecryptionVerifier,
    {
        self.only(caller, self.parties.beneficiary)?;
        let releasable = self.releasable.ok_or(ContractError::NotFunded)?;
        let mut phase = self.phase;
        phase.advance(Phase::AwaitingReveal)?;

        let key = engine.execute(caller, |exec| {
            let host = exec.host();
            exec.request_reveal(&[releasable], host, RevealContext::from(CONTEXT))
        })?;
        self.phase = phase;
        self.pending = Some(key.clone());
        Ok(key)
    }

    /// Pays the beneficiary the revealed amount, once. Nothing left to
    /// release rejects the escrow.
    pub fn settle<B, V>(
        &mut self,
        engine: &mut Engine<B, V>,
        caller: Party,
        plaintexts: &[Plaintext],
        proof: &[u8],
    ) -> Result<u64, ContractError>
    where
        B: ArithmeticBackend,
        V: DecryptionVerifier,
    {
        let key = self.pending.clone().ok_or(ContractError::NotAwaitingReveal)?;
        let released = engine.execute(caller, |exec| {
            let revealed = exec.finalize(&key, plaintexts, proof)?;
            match revealed.plaintexts() {
                [Plaintext::U64(released)] => Ok(*released),
                _ => Err(ContractError::MalformedReveal),
            }
        })?;

        self.released = Some(released);
        if released == 0 {
            self.phase.advance(Phase::Rejected)?;
            info!("escrow released nothing");
            return Ok(0);
        }
        self.phase.advance(Phase::Finalized)?;
        self.payouts.pay(self.parties.beneficiary, released as u128);
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealed_engine::testing::{encrypt_input, party, test_engine, Committee, TestEngine};

    fn parties() -> Parties {
        Parties {
            depositor: party("depositor"),
            beneficiary: party("beneficiary"),
            arbiter: party("arbiter"),
        }
    }

    fn run(amount: u64, penalty: u64) -> (TestEngine, Escrow, Committee) {
        let committee = Committee::new(b"escrow", 2, 1).expect("valid committee");
        let mut engine = test_engine(party("host"), &committee);
        let mut escrow = Escrow::new(parties());
        escrow
            .fund(&mut engine, party("depositor"), encrypt_input(amount))
            .expect("funded");
        escrow
            .assess(&mut engine, party("arbiter"), encrypt_input(penalty))
            .expect("assessed");
        (engine, escrow, committee)
    }

    fn release_and_settle(
        engine: &mut TestEngine,
        escrow: &mut Escrow,
        committee: &Committee,
    ) -> Result<u64, ContractError> {
        let key = escrow.release(engine, party("beneficiary"))?;
        let (plaintexts, proof) = committee.decrypt(engine, &key).expect("eligible");
        escrow.settle(engine, party("relayer"), &plaintexts, &proof)
    }

    #[test]
    fn penalty_is_deducted() {
        let (mut engine, mut escrow, committee) = run(100, 30);
        let releasable = escrow.releasable().expect("assessed");
        assert!(engine.is_authorized(&releasable, &party("beneficiary")));
        assert!(!engine.is_authorized(&releasable, &party("depositor")));

        assert_eq!(
            release_and_settle(&mut engine, &mut escrow, &committee),
            Ok(70)
        );
        assert_eq!(escrow.phase(), Phase::Finalized);
        assert_eq!(escrow.payouts().total_to(&party("beneficiary")), 70);
    }

    #[test]
    fn penalty_above_amount_releases_nothing() {
        let (mut engine, mut escrow, committee) = run(30, 100);
        assert_eq!(
            release_and_settle(&mut engine, &mut escrow, &committee),
            Ok(0)
        );
        assert_eq!(escrow.phase(), Phase::Rejected);
        assert_eq!(escrow.payouts().count(), 0);
    }

    #[test]
    fn settles_once() {
        let (mut engine, mut escrow, committee) = run(10, 1);
        let key = escrow
            .release(&mut engine, party("beneficiary"))
            .expect("release");
        let (plaintexts, proof) = committee.decrypt(&engine, &key).expect("eligible");
        escrow
            .settle(&mut engine, party("relayer"), &plaintexts, &proof)
            .expect("first settlement");
        assert!(escrow
            .settle(&mut engine, party("relayer"), &plaintexts, &proof)
            .is_err());
        assert_eq!(escrow.payouts().count(), 1);
    }

    #[test]
    fn roles_are_enforced() {
        let committee = Committee::new(b"escrow", 1, 1).expect("valid committee");
        let mut engine = test_engine(party("host"), &committee);
        let mut escrow = Escrow::new(parties());
        assert_eq!(
            escrow.assess(&mut engine, party("arbiter"), encrypt_input(1u64)),
            Err(ContractError::NotFunded)
        );
        assert_eq!(
            escrow.fund(&mut engine, party("arbiter"), encrypt_input(1u64)),
            Err(ContractError::NotAllowed {
                expected: party("depositor")
            })
        );
        escrow
            .fund(&mut engine, party("depositor"), encrypt_input(5u64))
            .expect("funded");
        assert_eq!(
            escrow.fund(&mut engine, party("depositor"), encrypt_input(5u64)),
            Err(ContractError::AlreadyFunded)
        );
        assert_eq!(
            escrow.release(&mut engine, party("beneficiary")),
            Err(ContractError::NotFunded)
        );
    }
}
