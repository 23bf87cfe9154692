//! Opaque references to encrypted values.
//!
//! A `Handle` says nothing about the value it denotes. Two handles compare
//! equal only when they are the *same* handle (same derivation); whether the
//! values behind them are equal can only be asked through the computation
//! façade (`Execution::eq`) or learned after a reveal. For the same reason
//! handles are not ordered.

use crate::value::{Plaintext, ValueType};
use std::fmt;

/// Identifier of a ciphertext, as minted by the arithmetic backend.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId([u8; HandleId::BYTES_LEN]);

impl HandleId {
    pub const BYTES_LEN: usize = 32;

    pub const fn from_bytes(bytes: [u8; Self::BYTES_LEN]) -> Self {
        HandleId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; Self::BYTES_LEN] {
        &self.0
    }
}

impl AsRef<[u8]> for HandleId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the first 8 bytes are plenty to tell handles apart in logs
        write!(f, "{}..", hex::encode(&self.0[..8]))
    }
}

/// Typed reference to one immutable encrypted value.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    id: HandleId,
    ty: ValueType,
}

impl Handle {
    /// Only arithmetic backends mint handles; everybody else receives them
    /// from the engine.
    pub fn new(id: HandleId, ty: ValueType) -> Self {
        Handle { id, ty }
    }

    pub fn id(&self) -> &HandleId {
        &self.id
    }

    pub fn value_type(&self) -> ValueType {
        self.ty
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}, {:?})", self.ty, self.id)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ty, self.id)
    }
}

/// Where the value of a newly created handle comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleSource {
    /// a public constant, trivially encrypted by the backend
    Plaintext(Plaintext),
    /// a ciphertext produced outside of the engine (typically by the caller)
    External(Vec<u8>),
}

impl From<Plaintext> for HandleSource {
    fn from(p: Plaintext) -> Self {
        HandleSource::Plaintext(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn handles_compare_by_identity() {
        let a = Handle::new(HandleId::from_bytes([1; 32]), ValueType::U64);
        let b = Handle::new(HandleId::from_bytes([2; 32]), ValueType::U64);
        let a_again = Handle::new(HandleId::from_bytes([1; 32]), ValueType::U64);

        assert_eq!(a, a_again);
        assert_ne!(a, b);

        let set: HashSet<Handle> = [a, b, a_again].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn debug_output_is_short() {
        let a = Handle::new(HandleId::from_bytes([0xff; 32]), ValueType::Bool);
        assert_eq!(format!("{:?}", a), "Handle(ebool, ffffffffffffffff..)");
    }
}
