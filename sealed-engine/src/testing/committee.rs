use super::ClearBackend;
use crate::{
    config::ConfigError,
    engine::Engine,
    handle::Handle,
    proof::{statement_digest, CommitteeVerifier, DecryptionProof, DecryptionVerifier},
    registry::RevealKey,
    value::Plaintext,
};
use cryptoxide::{blake2b::Blake2b, digest::Digest};
use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecryptError {
    #[error("handle {0} was never made reveal-eligible")]
    NotRevealEligible(Handle),
    #[error("no ciphertext for handle {0}")]
    UnknownCiphertext(Handle),
}

/// Threshold decryption service over a [`ClearBackend`].
///
/// Member keys are derived from a seed so that two committees built from the
/// same seed are interchangeable.
pub struct Committee {
    members: Vec<Keypair>,
    verifier: CommitteeVerifier,
}

impl Committee {
    pub fn new(seed: &[u8], size: usize, threshold: usize) -> Result<Self, ConfigError> {
        let members: Vec<Keypair> = (0..size).map(|index| member_key(seed, index)).collect();
        let verifier =
            CommitteeVerifier::new(members.iter().map(|k| k.public).collect(), threshold)?;
        Ok(Committee { members, verifier })
    }

    pub fn verifier(&self) -> CommitteeVerifier {
        self.verifier.clone()
    }

    pub fn public_keys(&self) -> Vec<PublicKey> {
        self.members.iter().map(|k| k.public).collect()
    }

    pub fn threshold(&self) -> usize {
        self.verifier.threshold()
    }

    /// Decrypt the handles of `key` and attest it with `threshold` members.
    /// Refuses any handle the engine has not made reveal-eligible.
    pub fn decrypt<V: DecryptionVerifier>(
        &self,
        engine: &Engine<ClearBackend, V>,
        key: &RevealKey,
    ) -> Result<(Vec<Plaintext>, Vec<u8>), DecryptError> {
        let mut plaintexts = Vec::with_capacity(key.len());
        for handle in key.handles() {
            if !engine.is_reveal_eligible(handle) {
                return Err(DecryptError::NotRevealEligible(*handle));
            }
            let plaintext = engine
                .backend()
                .plaintext(handle)
                .ok_or(DecryptError::UnknownCiphertext(*handle))?;
            plaintexts.push(plaintext);
        }
        let proof = self.sign(key.handles(), &plaintexts);
        Ok((plaintexts, proof))
    }

    /// Proof signed by the first `threshold` members, whatever the
    /// statement.
    pub fn sign(&self, handles: &[Handle], plaintexts: &[Plaintext]) -> Vec<u8> {
        let signers: Vec<usize> = (0..self.threshold()).collect();
        self.sign_with(&signers, handles, plaintexts)
    }

    /// Proof signed by the given members only. Indices past the committee
    /// are ignored.
    pub fn sign_with(
        &self,
        signers: &[usize],
        handles: &[Handle],
        plaintexts: &[Plaintext],
    ) -> Vec<u8> {
        let digest = statement_digest(handles, plaintexts);
        let mut proof = DecryptionProof::new();
        for index in signers {
            if let Some(key) = self.members.get(*index) {
                proof.push(*index as u8, &key.sign(&digest));
            }
        }
        proof.to_bytes()
    }
}

impl fmt::Debug for Committee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Committee")
            .field("members", &self.members.len())
            .field("threshold", &self.threshold())
            .finish()
    }
}

fn member_key(seed: &[u8], index: usize) -> Keypair {
    let mut bytes = [0u8; 32];
    let mut hasher = Blake2b::new(32);
    hasher.input(b"sealed/committee");
    hasher.input(seed);
    hasher.input(&(index as u64).to_be_bytes());
    hasher.result(&mut bytes);
    let secret = SecretKey::from_bytes(&bytes).expect("32 bytes secret key");
    let public = PublicKey::from(&secret);
    Keypair { secret, public }
}
