use crate::{
    backend::{ArithmeticBackend, BackendError},
    handle::{Handle, HandleId, HandleSource},
    operation::Operation,
    value::{Party, Plaintext, ValueType},
};
use cryptoxide::{blake2b::Blake2b, digest::Digest};
use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};
use std::collections::HashMap;

const ENCRYPT_CODE: u8 = 0xf0;
const IMPORT_CODE: u8 = 0xf1;
const RANDOM_CODE: u8 = 0xf2;

/// Arithmetic backend computing in the clear.
///
/// Values live in an arena keyed by handle id; the engine never sees them.
/// Only a [`Committee`](super::Committee) reads them back, and only for
/// handles the engine made reveal-eligible.
#[derive(Clone)]
pub struct ClearBackend {
    values: HashMap<HandleId, Plaintext>,
    nonce: u64,
    rng: ChaCha20Rng,
}

impl ClearBackend {
    pub fn new(seed: [u8; 32]) -> Self {
        ClearBackend {
            values: HashMap::new(),
            nonce: 0,
            rng: ChaCha20Rng::from_seed(seed),
        }
    }

    pub(crate) fn plaintext(&self, handle: &Handle) -> Option<Plaintext> {
        self.values
            .get(handle.id())
            .copied()
            .filter(|value| value.value_type() == handle.value_type())
    }

    /// number of ciphertexts ever minted, including those of aborted
    /// executions
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn mint(&mut self, code: u8, inputs: &[Handle], value: Plaintext) -> Handle {
        let mut hasher = Blake2b::new(HandleId::BYTES_LEN);
        hasher.input(&[code]);
        for input in inputs {
            hasher.input(input.id().as_ref());
        }
        hasher.input(&self.nonce.to_be_bytes());
        self.nonce += 1;

        let mut id = [0u8; HandleId::BYTES_LEN];
        hasher.result(&mut id);
        let id = HandleId::from_bytes(id);
        self.values.insert(id, value);
        Handle::new(id, value.value_type())
    }

    fn random_plaintext(&mut self, ty: ValueType) -> Plaintext {
        match ty.mask() {
            Some(mask) => {
                let high = self.rng.next_u64() as u128;
                let low = self.rng.next_u64() as u128;
                let value = ((high << 64) | low) & mask;
                Plaintext::wrapping(ty, value).unwrap_or(Plaintext::Bool(false))
            }
            None => {
                let mut bytes = [0u8; Party::BYTES_LEN];
                self.rng.fill_bytes(&mut bytes);
                Plaintext::Address(Party::new(bytes))
            }
        }
    }
}

impl Default for ClearBackend {
    fn default() -> Self {
        Self::new([0; 32])
    }
}

impl std::fmt::Debug for ClearBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClearBackend")
            .field("ciphertexts", &self.values.len())
            .field("nonce", &self.nonce)
            .finish()
    }
}

impl ArithmeticBackend for ClearBackend {
    fn encrypt(&mut self, value: &Plaintext) -> Result<Handle, BackendError> {
        Ok(self.mint(ENCRYPT_CODE, &[], *value))
    }

    fn import(&mut self, ty: ValueType, ciphertext: &[u8]) -> Result<Handle, BackendError> {
        let value =
            Plaintext::from_bytes(ciphertext).ok_or_else(|| BackendError::MalformedCiphertext {
                ty,
                reason: "not a canonical plaintext encoding".to_owned(),
            })?;
        if value.value_type() != ty {
            return Err(BackendError::MalformedCiphertext {
                ty,
                reason: format!("ciphertext encrypts an {}", value.value_type()),
            });
        }
        Ok(self.mint(IMPORT_CODE, &[], value))
    }

    fn random(&mut self, ty: ValueType) -> Result<Handle, BackendError> {
        let value = self.random_plaintext(ty);
        Ok(self.mint(RANDOM_CODE, &[], value))
    }

    fn apply(
        &mut self,
        op: Operation,
        inputs: &[Handle],
        result: ValueType,
    ) -> Result<Handle, BackendError> {
        let mut args = Vec::with_capacity(inputs.len());
        for input in inputs {
            let value = self
                .plaintext(input)
                .ok_or(BackendError::UnknownCiphertext(*input.id()))?;
            args.push(value);
        }
        let ty = args.first().map_or(result, Plaintext::value_type);
        let value = evaluate(op, &args)
            .filter(|value| value.value_type() == result)
            .ok_or(BackendError::Unsupported { op, ty })?;
        Ok(self.mint(op.code(), inputs, value))
    }
}

/// Caller side "encryption" of an input for a [`ClearBackend`].
pub fn encrypt_input(value: impl Into<Plaintext>) -> HandleSource {
    HandleSource::External(value.into().to_bytes())
}

/// Reference semantics of every operation: wrapping arithmetic, division by
/// zero gives the type's maximum, remainder by zero gives the dividend,
/// shift amounts are taken modulo the bit width.
pub fn evaluate(op: Operation, args: &[Plaintext]) -> Option<Plaintext> {
    match (op, args) {
        (Operation::Select, [condition, if_true, if_false]) => {
            if if_true.value_type() != if_false.value_type() {
                return None;
            }
            Some(if condition.as_bool()? { *if_true } else { *if_false })
        }
        (Operation::Eq, [a, b]) if a.value_type() == b.value_type() => {
            Some(Plaintext::Bool(a == b))
        }
        (Operation::Ne, [a, b]) if a.value_type() == b.value_type() => {
            Some(Plaintext::Bool(a != b))
        }
        (Operation::Cast(ValueType::Bool), [a]) => Some(Plaintext::Bool(a.to_u128()? != 0)),
        (Operation::Cast(to), [a]) => Plaintext::wrapping(to, a.to_u128()?),
        (Operation::Neg, [a]) => Plaintext::wrapping(a.value_type(), a.to_u128()?.wrapping_neg()),
        (Operation::Not, [a]) => Plaintext::wrapping(a.value_type(), !a.to_u128()?),
        (op, [a, b]) if a.value_type() == b.value_type() => {
            let ty = a.value_type();
            let mask = ty.mask()?;
            let bits = ty.bits();
            let (x, y) = (a.to_u128()?, b.to_u128()?);
            let shift = (y % bits as u128) as u32;
            let value = match op {
                Operation::Add => x.wrapping_add(y),
                Operation::Sub => x.wrapping_sub(y),
                Operation::Mul => x.wrapping_mul(y),
                Operation::Div if y == 0 => mask,
                Operation::Div => x / y,
                Operation::Rem if y == 0 => x,
                Operation::Rem => x % y,
                Operation::Min => x.min(y),
                Operation::Max => x.max(y),
                Operation::And => x & y,
                Operation::Or => x | y,
                Operation::Xor => x ^ y,
                Operation::Shl => x << shift,
                Operation::Shr => x >> shift,
                Operation::Rotl if shift == 0 => x,
                Operation::Rotl => (x << shift) | (x >> (bits - shift)),
                Operation::Rotr if shift == 0 => x,
                Operation::Rotr => (x >> shift) | (x << (bits - shift)),
                Operation::Gt => return Some(Plaintext::Bool(x > y)),
                Operation::Ge => return Some(Plaintext::Bool(x >= y)),
                Operation::Lt => return Some(Plaintext::Bool(x < y)),
                Operation::Le => return Some(Plaintext::Bool(x <= y)),
                _ => return None,
            };
            Plaintext::wrapping(ty, value)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use quickcheck_macros::quickcheck;

    fn eval2(op: Operation, a: impl Into<Plaintext>, b: impl Into<Plaintext>) -> Plaintext {
        evaluate(op, &[a.into(), b.into()]).expect("supported operation")
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(eval2(Operation::Div, 7u8, 0u8), Plaintext::U8(u8::MAX));
        assert_eq!(eval2(Operation::Rem, 7u8, 0u8), Plaintext::U8(7));
        assert_eq!(eval2(Operation::Div, 7u128, 0u128), Plaintext::U128(u128::MAX));
    }

    #[test]
    fn shifts_wrap_their_amount() {
        assert_eq!(eval2(Operation::Shl, 1u8, 9u8), Plaintext::U8(2));
        assert_eq!(eval2(Operation::Shr, 0x80u8, 15u8), Plaintext::U8(1));
        assert_eq!(eval2(Operation::Rotr, 1u8, 1u8), Plaintext::U8(0x80));
        assert_eq!(eval2(Operation::Rotl, 1u128 << 127, 1u128), Plaintext::U128(1));
    }

    #[test]
    fn casts() {
        let cast = |to, a: Plaintext| evaluate(Operation::Cast(to), &[a]).expect("cast");
        assert_eq!(cast(ValueType::U8, Plaintext::U16(0x1234)), Plaintext::U8(0x34));
        assert_eq!(cast(ValueType::Bool, Plaintext::U16(0x100)), Plaintext::Bool(true));
        assert_eq!(cast(ValueType::U64, Plaintext::Bool(true)), Plaintext::U64(1));
    }

    #[test]
    fn mixed_types_are_not_evaluated() {
        assert_eq!(
            evaluate(Operation::Add, &[Plaintext::U8(1), Plaintext::U16(1)]),
            None
        );
        assert_eq!(
            evaluate(
                Operation::Select,
                &[Plaintext::U8(1), Plaintext::U8(1), Plaintext::U8(2)]
            ),
            None
        );
    }

    #[test]
    fn imports_check_the_declared_type() {
        let mut backend = ClearBackend::default();
        assert!(backend
            .import(ValueType::U64, &Plaintext::U64(3).to_bytes())
            .is_ok());
        assert!(matches!(
            backend.import(ValueType::U32, &Plaintext::U64(3).to_bytes()),
            Err(BackendError::MalformedCiphertext { .. })
        ));
        assert!(matches!(
            backend.import(ValueType::U32, b"\x04\x00"),
            Err(BackendError::MalformedCiphertext { .. })
        ));
    }

    #[test]
    fn every_result_is_a_new_handle() {
        let mut backend = ClearBackend::default();
        let a = backend.encrypt(&Plaintext::U8(1)).expect("encrypt");
        let b = backend.encrypt(&Plaintext::U8(1)).expect("encrypt");
        assert_ne!(a, b);
        let c = backend
            .apply(Operation::Add, &[a, b], ValueType::U8)
            .expect("add");
        let d = backend
            .apply(Operation::Add, &[a, b], ValueType::U8)
            .expect("add");
        assert_ne!(c, d);
        assert_eq!(backend.plaintext(&c), Some(Plaintext::U8(2)));
    }

    #[test]
    fn randomness_is_seeded() {
        let mut first = ClearBackend::new([3; 32]);
        let mut second = ClearBackend::new([3; 32]);
        let a = first.random(ValueType::U32).expect("random");
        let b = second.random(ValueType::U32).expect("random");
        assert_eq!(first.plaintext(&a), second.plaintext(&b));
        let address = first.random(ValueType::Address).expect("random address");
        assert_eq!(address.value_type(), ValueType::Address);
    }

    #[quickcheck]
    fn u64_arithmetic_wraps(a: u64, b: u64) -> bool {
        eval2(Operation::Add, a, b) == Plaintext::U64(a.wrapping_add(b))
            && eval2(Operation::Sub, a, b) == Plaintext::U64(a.wrapping_sub(b))
            && eval2(Operation::Mul, a, b) == Plaintext::U64(a.wrapping_mul(b))
    }

    proptest! {
        #[test]
        fn u32_rotations_match_std(a: u32, b: u32) {
            prop_assert_eq!(eval2(Operation::Rotl, a, b), Plaintext::U32(a.rotate_left(b % 32)));
            prop_assert_eq!(eval2(Operation::Rotr, a, b), Plaintext::U32(a.rotate_right(b % 32)));
            prop_assert_eq!(eval2(Operation::Shl, a, b), Plaintext::U32(a.wrapping_shl(b)));
            prop_assert_eq!(eval2(Operation::Shr, a, b), Plaintext::U32(a.wrapping_shr(b)));
        }

        #[test]
        fn comparisons_match_std(a: u16, b: u16) {
            prop_assert_eq!(eval2(Operation::Gt, a, b), Plaintext::Bool(a > b));
            prop_assert_eq!(eval2(Operation::Le, a, b), Plaintext::Bool(a <= b));
            prop_assert_eq!(eval2(Operation::Min, a, b), Plaintext::U16(a.min(b)));
        }
    }
}
