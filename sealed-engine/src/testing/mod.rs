//! Reference collaborators and helpers for tests: an arithmetic backend that
//! computes in the clear, a decryption committee that signs what it
//! decrypts, and proptest strategies.

mod arbitrary;
mod backend;
mod committee;

pub use self::backend::{encrypt_input, evaluate, ClearBackend};
pub use self::committee::{Committee, DecryptError};

use crate::{config::EngineConfig, engine::Engine, proof::CommitteeVerifier, value::Party};
use cryptoxide::{blake2b::Blake2b, digest::Digest};

pub type TestEngine = Engine<ClearBackend, CommitteeVerifier>;

pub fn test_engine(host: Party, committee: &Committee) -> TestEngine {
    test_engine_with(EngineConfig::new(host), committee)
}

pub fn test_engine_with(config: EngineConfig, committee: &Committee) -> TestEngine {
    Engine::new(config, ClearBackend::default(), committee.verifier())
        .expect("test engine configuration")
}

/// A party named after `label`, the same one every time.
pub fn party(label: &str) -> Party {
    let mut digest = [0u8; 32];
    let mut hasher = Blake2b::new(32);
    hasher.input(label.as_bytes());
    hasher.result(&mut digest);
    let mut bytes = [0u8; Party::BYTES_LEN];
    bytes.copy_from_slice(&digest[..Party::BYTES_LEN]);
    Party::new(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parties_are_stable_and_distinct() {
        assert_eq!(party("alice"), party("alice"));
        assert_ne!(party("alice"), party("bob"));
        assert!(!party("host").is_zero());
    }
}
