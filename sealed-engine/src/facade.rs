//! Computation façade.
//!
//! Typed wrappers over [`Execution::derive`]: every call checks that the
//! host may use its inputs and returns a freshly minted handle. Nothing in
//! here branches on an encrypted value; a confidential condition only ever
//! flows into [`select`](Execution::select).
//!
//! Results carry no grant. A caller that wants to feed a result into
//! another operation, or to keep it past the current execution, grants the
//! host access with [`keep`](Execution::keep) (permanent) or
//! [`scratch`](Execution::scratch) (this execution only).

use crate::{
    backend::ArithmeticBackend,
    engine::Execution,
    error::Error,
    handle::{Handle, HandleSource},
    operation::Operation,
    proof::DecryptionVerifier,
    value::{Plaintext, ValueType},
};

macro_rules! binary_operations {
    ($($name:ident => $op:ident,)*) => {
        $(
            pub fn $name(&mut self, lhs: Handle, rhs: Handle) -> Result<Handle, Error> {
                self.derive(Operation::$op, &[lhs, rhs])
            }
        )*
    };
}

macro_rules! scalar_operations {
    ($($name:ident => $op:ident,)*) => {
        $(
            /// `rhs` is a public operand of the type of `lhs`.
            pub fn $name(&mut self, lhs: Handle, rhs: u128) -> Result<Handle, Error> {
                self.require_host(&lhs)?;
                let rhs = self.constant(lhs.value_type(), rhs)?;
                self.derive(Operation::$op, &[lhs, rhs])
            }
        )*
    };
}

impl<'a, B: ArithmeticBackend, V: DecryptionVerifier> Execution<'a, B, V> {
    binary_operations! {
        add => Add,
        sub => Sub,
        mul => Mul,
        div => Div,
        rem => Rem,
        min => Min,
        max => Max,
        eq => Eq,
        ne => Ne,
        gt => Gt,
        ge => Ge,
        lt => Lt,
        le => Le,
        and => And,
        or => Or,
        xor => Xor,
        shl => Shl,
        shr => Shr,
        rotl => Rotl,
        rotr => Rotr,
    }

    scalar_operations! {
        add_scalar => Add,
        sub_scalar => Sub,
        mul_scalar => Mul,
        div_scalar => Div,
        rem_scalar => Rem,
        min_scalar => Min,
        max_scalar => Max,
        eq_scalar => Eq,
        gt_scalar => Gt,
        ge_scalar => Ge,
        lt_scalar => Lt,
        le_scalar => Le,
    }

    pub fn neg(&mut self, value: Handle) -> Result<Handle, Error> {
        self.derive(Operation::Neg, &[value])
    }

    pub fn not(&mut self, value: Handle) -> Result<Handle, Error> {
        self.derive(Operation::Not, &[value])
    }

    /// Branchless ternary: `if_true` where `condition` holds, `if_false`
    /// elsewhere.
    pub fn select(
        &mut self,
        condition: Handle,
        if_true: Handle,
        if_false: Handle,
    ) -> Result<Handle, Error> {
        self.derive(Operation::Select, &[condition, if_true, if_false])
    }

    /// Widen or truncate to `to`.
    pub fn cast(&mut self, value: Handle, to: ValueType) -> Result<Handle, Error> {
        self.derive(Operation::Cast(to), &[value])
    }

    /// Trivially encrypted public constant, usable for this execution only.
    pub fn constant(&mut self, ty: ValueType, value: u128) -> Result<Handle, Error> {
        let plaintext =
            Plaintext::from_u128(ty, value).ok_or(Error::ScalarOutOfRange { ty, value })?;
        self.encrypt(plaintext)
    }

    /// Same as [`constant`](Self::constant), for any plaintext.
    pub fn encrypt(&mut self, value: impl Into<Plaintext>) -> Result<Handle, Error> {
        let value = value.into();
        let handle = self.create(value.value_type(), HandleSource::Plaintext(value))?;
        self.scratch(handle)
    }

    /// Grant the host a permanent right on `handle` and hand it back.
    pub fn keep(&mut self, handle: Handle) -> Result<Handle, Error> {
        self.grant_self(&handle)?;
        Ok(handle)
    }

    /// Grant the host a right on `handle` for this execution only.
    pub fn scratch(&mut self, handle: Handle) -> Result<Handle, Error> {
        self.grant_transient(&handle, self.host())?;
        Ok(handle)
    }

    /// Largest of `values` and its position. On ties the earliest element
    /// wins.
    pub fn max_with_index(&mut self, values: &[Handle]) -> Result<(Handle, Handle), Error> {
        self.fold_with_index(values, Operation::Gt)
    }

    /// Smallest of `values` and its position. On ties the earliest element
    /// wins.
    pub fn min_with_index(&mut self, values: &[Handle]) -> Result<(Handle, Handle), Error> {
        self.fold_with_index(values, Operation::Lt)
    }

    /// `better` is a strict comparison so a later element only replaces the
    /// current best when it strictly beats it. The loop runs `values.len()`
    /// times whatever the values are.
    fn fold_with_index(
        &mut self,
        values: &[Handle],
        better: Operation,
    ) -> Result<(Handle, Handle), Error> {
        let (first, rest) = values.split_first().ok_or(Error::EmptyFold)?;
        u32::try_from(rest.len()).map_err(|_| Error::FoldTooWide(values.len()))?;
        for value in values {
            self.require_host(value)?;
        }

        let mut best = *first;
        let mut best_index = self.constant(ValueType::U32, 0)?;
        for (position, candidate) in rest.iter().enumerate() {
            let index = self.constant(ValueType::U32, position as u128 + 1)?;
            let wins = self.derive(better, &[*candidate, best])?;
            let wins = self.scratch(wins)?;
            let next = self.select(wins, *candidate, best)?;
            best = self.scratch(next)?;
            let next_index = self.select(wins, index, best_index)?;
            best_index = self.scratch(next_index)?;
        }
        if rest.is_empty() {
            // never hand an input back as a result
            let copy = self.cast(best, best.value_type())?;
            best = self.scratch(copy)?;
        }
        Ok((best, best_index))
    }

    /// Sum of `values`, wrapping.
    pub fn sum(&mut self, values: &[Handle]) -> Result<Handle, Error> {
        let (first, rest) = values.split_first().ok_or(Error::EmptyFold)?;
        for value in values {
            self.require_host(value)?;
        }
        let mut total = *first;
        for value in rest {
            let next = self.add(total, *value)?;
            total = self.scratch(next)?;
        }
        if rest.is_empty() {
            let copy = self.cast(total, total.value_type())?;
            total = self.scratch(copy)?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        acl::Unauthorized,
        proof::CommitteeVerifier,
        registry::RevealContext,
        testing::{
            encrypt_input, evaluate, party, test_engine, ClearBackend, Committee, TestEngine,
        },
    };
    use proptest::prelude::*;

    fn engine() -> (TestEngine, Committee) {
        let committee = Committee::new(b"facade tests", 1, 1).expect("valid committee");
        (test_engine(party("host"), &committee), committee)
    }

    /// Store `values` as kept handles, run `f` on them, then reveal and
    /// decrypt whatever it returns.
    fn run<F>(ty: ValueType, values: &[u128], f: F) -> Result<Vec<Plaintext>, Error>
    where
        F: FnOnce(
            &mut Execution<'_, ClearBackend, CommitteeVerifier>,
            &[Handle],
        ) -> Result<Vec<Handle>, Error>,
    {
        let (mut engine, committee) = engine();
        let host = engine.host();
        let key = engine.execute(host, |exec| {
            let mut inputs = Vec::with_capacity(values.len());
            for value in values {
                let h = exec.constant(ty, *value)?;
                inputs.push(exec.keep(h)?);
            }
            let outputs = f(exec, &inputs)?;
            for output in &outputs {
                exec.keep(*output)?;
                assert!(!inputs.contains(output), "result aliases an input");
            }
            exec.request_reveal(&outputs, host, RevealContext::default())
        })?;
        let (plaintexts, _) = committee
            .decrypt(&engine, &key)
            .expect("reveal-eligible handles");
        Ok(plaintexts)
    }

    #[test]
    fn max_with_index_keeps_the_first_maximum() {
        let revealed = run(ValueType::U64, &[5, 9, 3, 9], |exec, inputs| {
            let (value, index) = exec.max_with_index(inputs)?;
            Ok(vec![value, index])
        })
        .expect("fold");
        assert_eq!(revealed, vec![Plaintext::U64(9), Plaintext::U32(1)]);
    }

    #[test]
    fn min_with_index_keeps_the_first_minimum() {
        let revealed = run(ValueType::U16, &[7, 2, 8, 2], |exec, inputs| {
            let (value, index) = exec.min_with_index(inputs)?;
            Ok(vec![value, index])
        })
        .expect("fold");
        assert_eq!(revealed, vec![Plaintext::U16(2), Plaintext::U32(1)]);
    }

    #[test]
    fn single_element_fold_returns_a_fresh_handle() {
        let revealed = run(ValueType::U8, &[42], |exec, inputs| {
            let (value, index) = exec.max_with_index(inputs)?;
            let total = exec.sum(inputs)?;
            Ok(vec![value, index, total])
        })
        .expect("fold");
        assert_eq!(
            revealed,
            vec![Plaintext::U8(42), Plaintext::U32(0), Plaintext::U8(42)]
        );
    }

    #[test]
    fn empty_fold_is_a_public_error() {
        let err = run(ValueType::U8, &[], |exec, inputs| {
            exec.max_with_index(inputs).map(|(v, i)| vec![v, i])
        })
        .expect_err("empty");
        assert_eq!(err, Error::EmptyFold);
        let err = run(ValueType::U8, &[], |exec, inputs| exec.sum(inputs).map(|s| vec![s]))
            .expect_err("empty");
        assert_eq!(err, Error::EmptyFold);
    }

    #[test]
    fn capped_subtraction_is_branchless() {
        // select(penalty > amount, 0, amount - penalty)
        let capped = |amount: u128, penalty: u128| {
            run(ValueType::U64, &[amount, penalty], |exec, inputs| {
                let over = exec.gt(inputs[1], inputs[0])?;
                let over = exec.scratch(over)?;
                let zero = exec.constant(ValueType::U64, 0)?;
                let rest = exec.sub(inputs[0], inputs[1])?;
                let rest = exec.scratch(rest)?;
                Ok(vec![exec.select(over, zero, rest)?])
            })
            .expect("computation")
        };
        assert_eq!(capped(100, 30), vec![Plaintext::U64(70)]);
        assert_eq!(capped(30, 100), vec![Plaintext::U64(0)]);
    }

    #[test]
    fn scalars_must_fit_the_operand_type() {
        let err = run(ValueType::U8, &[1], |exec, inputs| {
            exec.add_scalar(inputs[0], 256).map(|h| vec![h])
        })
        .expect_err("256 is no u8");
        assert_eq!(
            err,
            Error::ScalarOutOfRange {
                ty: ValueType::U8,
                value: 256
            }
        );
        let revealed = run(ValueType::U8, &[250], |exec, inputs| {
            Ok(vec![
                exec.add_scalar(inputs[0], 10)?,
                exec.le_scalar(inputs[0], 250)?,
                exec.rem_scalar(inputs[0], 7)?,
            ])
        })
        .expect("scalars");
        assert_eq!(
            revealed,
            vec![Plaintext::U8(4), Plaintext::Bool(true), Plaintext::U8(5)]
        );
    }

    #[test]
    fn type_errors_come_before_any_handle() {
        let (mut engine, _) = engine();
        let host = engine.host();
        engine
            .execute(host, |exec| {
                let a = exec.constant(ValueType::U8, 1)?;
                let b = exec.constant(ValueType::U16, 1)?;
                let before = exec.state.store.len();
                let err = exec.add(a, b).expect_err("mixed widths");
                assert!(matches!(err, Error::TypeMismatch { .. }));
                let err = exec.select(a, a, a).expect_err("condition is not a boolean");
                assert!(matches!(err, Error::TypeMismatch { .. }));
                assert_eq!(exec.state.store.len(), before);
                Ok::<_, Error>(())
            })
            .expect("execution");
    }

    #[test]
    fn results_carry_no_grant() {
        let (mut engine, _) = engine();
        let host = engine.host();
        engine
            .execute(host, |exec| {
                let a = exec.constant(ValueType::U32, 4)?;
                let doubled = exec.add(a, a)?;
                assert!(!exec.is_authorized(&doubled, &host));
                let err = exec.add(doubled, a).expect_err("no grant on the result");
                assert!(matches!(err, Error::Unauthorized(_)));
                let doubled = exec.scratch(doubled)?;
                exec.add(doubled, a)?;
                Ok::<_, Error>(())
            })
            .expect("execution");
    }

    #[test]
    fn scalar_operand_is_not_minted_for_an_unusable_handle() {
        let (mut engine, _) = engine();
        let host = engine.host();
        let stale = engine
            .execute(host, |exec| exec.constant(ValueType::U32, 4))
            .expect("constant");
        let before = engine.store().len();
        engine
            .execute(host, |exec| {
                let err = exec.add_scalar(stale, 5).expect_err("host grant has expired");
                assert!(matches!(
                    err,
                    Error::Unauthorized(Unauthorized::HostSelfGrantMissing { .. })
                ));
                let err = exec.le_scalar(stale, 5).expect_err("host grant has expired");
                assert!(matches!(err, Error::Unauthorized(_)));
                Ok::<_, Error>(())
            })
            .expect("the caller handles the errors");
        assert_eq!(engine.store().len(), before);
    }

    fn reference_fold(values: &[u64], strictly_better: fn(u64, u64) -> bool) -> (u64, u32) {
        let mut best = values[0];
        let mut index = 0;
        for (i, v) in values.iter().enumerate().skip(1) {
            if strictly_better(*v, best) {
                best = *v;
                index = i as u32;
            }
        }
        (best, index)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn max_fold_matches_reference(values in proptest::collection::vec(0u64..16, 1..8)) {
            let inputs: Vec<u128> = values.iter().map(|v| *v as u128).collect();
            let revealed = run(ValueType::U64, &inputs, |exec, inputs| {
                let (value, index) = exec.max_with_index(inputs)?;
                Ok(vec![value, index])
            }).expect("fold");
            let (best, index) = reference_fold(&values, |a, b| a > b);
            prop_assert_eq!(revealed, vec![Plaintext::U64(best), Plaintext::U32(index)]);
        }

        #[test]
        fn min_fold_matches_reference(values in proptest::collection::vec(0u64..16, 1..8)) {
            let inputs: Vec<u128> = values.iter().map(|v| *v as u128).collect();
            let revealed = run(ValueType::U64, &inputs, |exec, inputs| {
                let (value, index) = exec.min_with_index(inputs)?;
                Ok(vec![value, index])
            }).expect("fold");
            let (best, index) = reference_fold(&values, |a, b| a < b);
            prop_assert_eq!(revealed, vec![Plaintext::U64(best), Plaintext::U32(index)]);
        }

        #[test]
        fn u8_arithmetic_wraps(a: u8, b: u8) {
            let revealed = run(ValueType::U8, &[a as u128, b as u128], |exec, inputs| {
                Ok(vec![
                    exec.add(inputs[0], inputs[1])?,
                    exec.sub(inputs[0], inputs[1])?,
                    exec.mul(inputs[0], inputs[1])?,
                ])
            }).expect("arithmetic");
            prop_assert_eq!(
                revealed,
                vec![
                    Plaintext::U8(a.wrapping_add(b)),
                    Plaintext::U8(a.wrapping_sub(b)),
                    Plaintext::U8(a.wrapping_mul(b)),
                ]
            );
        }

        #[test]
        fn sum_matches_wrapping_sum(values in proptest::collection::vec(any::<u32>(), 1..6)) {
            let inputs: Vec<u128> = values.iter().map(|v| *v as u128).collect();
            let revealed = run(ValueType::U32, &inputs, |exec, inputs| {
                Ok(vec![exec.sum(inputs)?])
            }).expect("sum");
            let expected = values.iter().fold(0u32, |acc, v| acc.wrapping_add(*v));
            prop_assert_eq!(revealed, vec![Plaintext::U32(expected)]);
        }

        #[test]
        fn backend_agrees_with_reference_evaluation(a: u16, b: u16) {
            let revealed = run(ValueType::U16, &[a as u128, b as u128], |exec, inputs| {
                Ok(vec![
                    exec.div(inputs[0], inputs[1])?,
                    exec.rem(inputs[0], inputs[1])?,
                    exec.rotl(inputs[0], inputs[1])?,
                ])
            }).expect("arithmetic");
            let (pa, pb) = (Plaintext::U16(a), Plaintext::U16(b));
            prop_assert_eq!(revealed, vec![
                evaluate(Operation::Div, &[pa, pb]).expect("u16 div"),
                evaluate(Operation::Rem, &[pa, pb]).expect("u16 rem"),
                Plaintext::U16(a.rotate_left(b as u32 % 16)),
            ]);
        }
    }

    #[test]
    fn division_by_zero_follows_backend_semantics() {
        let revealed = run(ValueType::U32, &[17, 0], |exec, inputs| {
            Ok(vec![
                exec.div(inputs[0], inputs[1])?,
                exec.rem(inputs[0], inputs[1])?,
            ])
        })
        .expect("division");
        assert_eq!(revealed, vec![Plaintext::U32(u32::MAX), Plaintext::U32(17)]);
    }

    #[test]
    fn encrypted_inputs_are_accepted_through_create() {
        let (mut engine, _) = engine();
        let result = engine.execute(party("alice"), |exec| {
            let h = exec.create(ValueType::U8, encrypt_input(3u8))?;
            exec.add(h, h)
        });
        assert!(result.is_ok());
    }
}
