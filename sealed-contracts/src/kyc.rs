//! Age gate.
//!
//! A user proves to a relying party that they were born in or before a
//! cutoff year without disclosing the year itself: only the encrypted
//! verdict `birth_year <= cutoff` is revealed, and only to the relying
//! party.

use crate::error::ContractError;
use sealed_engine::{
    ArithmeticBackend, DecryptionVerifier, Engine, Handle, HandleSource, Party, Phase, Plaintext,
    RevealContext, RevealKey, ValueType,
};
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Check {
    verdict: Handle,
    key: RevealKey,
    phase: Phase,
}

#[derive(Debug, Clone)]
pub struct AgeGate {
    relying_party: Party,
    cutoff_year: u16,
    checks: HashMap<Party, Check>,
}

impl AgeGate {
    pub fn new(relying_party: Party, cutoff_year: u16) -> Self {
        AgeGate {
            relying_party,
            cutoff_year,
            checks: HashMap::new(),
        }
    }

    pub fn relying_party(&self) -> Party {
        self.relying_party
    }

    /// `Some(true)` once `user` is verified, `Some(false)` once refused.
    pub fn verdict(&self, user: &Party) -> Option<bool> {
        self.checks.get(user).and_then(|check| match check.phase {
            Phase::Finalized => Some(true),
            Phase::Rejected => Some(false),
            _ => None,
        })
    }

    /// encrypted verdict of `user`, readable by the user and the relying party
    pub fn encrypted_verdict(&self, user: &Party) -> Option<Handle> {
        self.checks.get(user).map(|check| check.verdict)
    }

    /// Submit an encrypted `euint16` birth year. The reveal of the verdict
    /// is addressed to the relying party.
    pub fn submit<B, V>(
        &mut self,
        engine: &mut Engine<B, V>,
        user: Party,
        birth_year: HandleSource,
    ) -> Result<RevealKey, ContractError>
    where
        B: ArithmeticBackend,
        V: DecryptionVerifier,
    {
        if self.checks.contains_key(&user) {
            return Err(ContractError::AlreadySubmitted(user));
        }
        let mut phase = Phase::Open;
        phase.advance(Phase::Computing)?;
        phase.advance(Phase::AwaitingReveal)?;

        let cutoff = self.cutoff_year as u128;
        let relying_party = self.relying_party;
        let (verdict, key) = engine.execute(user, |exec| {
            let year = exec.create(ValueType::U16, birth_year)?;
            exec.require_caller(&year)?;
            let verdict = exec.le_scalar(year, cutoff)?;
            exec.keep(verdict)?;
            exec.grant_permanent(&verdict, user)?;
            exec.grant_permanent(&verdict, relying_party)?;
            let key = exec.request_reveal(
                &[verdict],
                relying_party,
                RevealContext::new(user.as_bytes().to_vec()),
            )?;
            Ok::<_, ContractError>((verdict, key))
        })?;

        self.checks.insert(
            user,
            Check {
                verdict,
                key: key.clone(),
                phase,
            },
        );
        engine.collect_unreachable();
        Ok(key)
    }

    /// Record the revealed verdict of `user`.
    pub fn settle<B, V>(
        &mut self,
        engine: &mut Engine<B, V>,
        caller: Party,
        user: &Party,
        plaintexts: &[Plaintext],
        proof: &[u8],
    ) -> Result<bool, ContractError>
    where
        B: ArithmeticBackend,
        V: DecryptionVerifier,
    {
        let check = self
            .checks
            .get_mut(user)
            .ok_or(ContractError::NotAwaitingReveal)?;
        let key = check.key.clone();
        let verified = engine.execute(caller, |exec| {
            let revealed = exec.finalize(&key, plaintexts, proof)?;
            match revealed.plaintexts() {
                [Plaintext::Bool(verified)] => Ok(*verified),
                _ => Err(ContractError::MalformedReveal),
            }
        })?;

        check.phase.advance(if verified {
            Phase::Finalized
        } else {
            Phase::Rejected
        })?;
        info!(%user, verified, "age check settled");
        Ok(verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealed_engine::{
        testing::{encrypt_input, party, test_engine, Committee, TestEngine},
        Error, RevealError,
    };

    fn setup() -> (TestEngine, Committee, AgeGate) {
        let committee = Committee::new(b"kyc", 3, 2).expect("valid committee");
        let engine = test_engine(party("host"), &committee);
        (engine, committee, AgeGate::new(party("bank"), 2006))
    }

    fn check(year: u16) -> (TestEngine, AgeGate, Result<bool, ContractError>) {
        let (mut engine, committee, mut gate) = setup();
        let key = gate
            .submit(&mut engine, party("alice"), encrypt_input(year))
            .expect("submitted");
        let (plaintexts, proof) = committee.decrypt(&engine, &key).expect("eligible");
        let verdict = gate.settle(
            &mut engine,
            party("relayer"),
            &party("alice"),
            &plaintexts,
            &proof,
        );
        (engine, gate, verdict)
    }

    #[test]
    fn old_enough() {
        let (_, gate, verdict) = check(1990);
        assert_eq!(verdict, Ok(true));
        assert_eq!(gate.verdict(&party("alice")), Some(true));
        let (_, _, verdict) = check(2006);
        assert_eq!(verdict, Ok(true));
    }

    #[test]
    fn too_young() {
        let (_, gate, verdict) = check(2010);
        assert_eq!(verdict, Ok(false));
        assert_eq!(gate.verdict(&party("alice")), Some(false));
    }

    #[test]
    fn the_verdict_goes_to_the_relying_party_only() {
        let (mut engine, _, mut gate) = setup();
        let key = gate
            .submit(&mut engine, party("alice"), encrypt_input(1980u16))
            .expect("submitted");
        let record = engine.lookup(&key).expect("registered");
        assert_eq!(record.receiver(), &party("bank"));
        assert_eq!(record.context().as_bytes(), party("alice").as_bytes());

        let verdict = gate.encrypted_verdict(&party("alice")).expect("verdict");
        assert!(engine.is_authorized(&verdict, &party("alice")));
        assert!(engine.is_authorized(&verdict, &party("bank")));
        assert!(!engine.is_authorized(&verdict, &party("mallory")));
        assert_eq!(gate.verdict(&party("alice")), None);
    }

    #[test]
    fn one_check_per_user_and_one_settlement_per_check() {
        let (mut engine, committee, mut gate) = setup();
        let key = gate
            .submit(&mut engine, party("alice"), encrypt_input(1980u16))
            .expect("submitted");
        assert_eq!(
            gate.submit(&mut engine, party("alice"), encrypt_input(1981u16))
                .map(|_| ()),
            Err(ContractError::AlreadySubmitted(party("alice")))
        );
        let (plaintexts, proof) = committee.decrypt(&engine, &key).expect("eligible");
        gate.settle(&mut engine, party("bank"), &party("alice"), &plaintexts, &proof)
            .expect("settled");
        assert_eq!(
            gate.settle(&mut engine, party("bank"), &party("alice"), &plaintexts, &proof),
            Err(ContractError::Engine(Error::Reveal(
                RevealError::AlreadyFinalized(key)
            )))
        );
        assert_eq!(
            gate.settle(&mut engine, party("bank"), &party("bob"), &plaintexts, &proof),
            Err(ContractError::NotAwaitingReveal)
        );
    }
}
