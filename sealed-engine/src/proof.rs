//! Proofs of decryption.
//!
//! The statement a decryption service attests to is "the handles `h_1..h_n`,
//! in this order, decrypt to `p_1..p_n`". It is hashed into a 32 bytes
//! digest:
//!
//! ```text
//! blake2b-256( "sealed/decryption/v1"
//!            | n (u32 big endian)
//!            | (handle id | type tag) * n
//!            | canonical plaintext * n )
//! ```
//!
//! A committee of decryption parties signs the digest with Ed25519; a proof
//! is the list of `(member index, signature)` pairs:
//!
//! ```text
//! count (u8) | (member (u8) | signature (64 bytes)) * count
//! ```

use crate::{
    config::ConfigError,
    handle::Handle,
    value::Plaintext,
};
use cryptoxide::{blake2b::Blake2b, digest::Digest};
use ed25519_dalek::{PublicKey, Signature, Verifier};
use std::collections::HashSet;

pub const STATEMENT_DOMAIN: &[u8] = b"sealed/decryption/v1";
pub const STATEMENT_DIGEST_SIZE: usize = 32;
pub const SIGNATURE_SIZE: usize = 64;

/// Checks an externally supplied decryption proof.
pub trait DecryptionVerifier {
    /// `true` only if `proof` attests that `handles`, in this order, decrypt
    /// to `plaintexts`.
    fn verify(&self, handles: &[Handle], plaintexts: &[Plaintext], proof: &[u8]) -> bool;
}

pub fn statement_digest(
    handles: &[Handle],
    plaintexts: &[Plaintext],
) -> [u8; STATEMENT_DIGEST_SIZE] {
    let mut hasher = Blake2b::new(STATEMENT_DIGEST_SIZE);
    hasher.input(STATEMENT_DOMAIN);
    hasher.input(&(handles.len() as u32).to_be_bytes());
    for handle in handles {
        hasher.input(handle.id().as_ref());
        hasher.input(&[handle.value_type().tag()]);
    }
    for plaintext in plaintexts {
        hasher.input(&plaintext.to_bytes());
    }
    let mut out = [0u8; STATEMENT_DIGEST_SIZE];
    hasher.result(&mut out);
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionProof {
    shares: Vec<(u8, [u8; SIGNATURE_SIZE])>,
}

impl DecryptionProof {
    pub const MAX_SHARES: usize = u8::MAX as usize;

    pub fn new() -> Self {
        DecryptionProof { shares: Vec::new() }
    }

    /// Add the signature of committee member `member`. Shares past
    /// `MAX_SHARES` are dropped.
    pub fn push(&mut self, member: u8, signature: &Signature) {
        if self.shares.len() < Self::MAX_SHARES {
            self.shares.push((member, signature.to_bytes()));
        }
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    pub fn shares(&self) -> impl Iterator<Item = (u8, &[u8; SIGNATURE_SIZE])> {
        self.shares.iter().map(|(member, sig)| (*member, sig))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.shares.len() * (1 + SIGNATURE_SIZE));
        out.push(self.shares.len() as u8);
        for (member, sig) in &self.shares {
            out.push(*member);
            out.extend_from_slice(sig);
        }
        out
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let (count, mut rest) = slice.split_first()?;
        let count = *count as usize;
        if rest.len() != count * (1 + SIGNATURE_SIZE) {
            return None;
        }
        let mut shares = Vec::with_capacity(count);
        for _ in 0..count {
            let (member, tail) = rest.split_first()?;
            let (sig, tail) = tail.split_at(SIGNATURE_SIZE);
            let mut bytes = [0u8; SIGNATURE_SIZE];
            bytes.copy_from_slice(sig);
            shares.push((*member, bytes));
            rest = tail;
        }
        Some(DecryptionProof { shares })
    }
}

impl Default for DecryptionProof {
    fn default() -> Self {
        Self::new()
    }
}

/// Accepts a proof carrying valid signatures from at least `threshold`
/// distinct committee members.
#[derive(Debug, Clone)]
pub struct CommitteeVerifier {
    members: Vec<PublicKey>,
    threshold: usize,
}

impl CommitteeVerifier {
    pub fn new(members: Vec<PublicKey>, threshold: usize) -> Result<Self, ConfigError> {
        if members.is_empty() {
            return Err(ConfigError::NoMembers);
        }
        if threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        if threshold > members.len() || members.len() > DecryptionProof::MAX_SHARES {
            return Err(ConfigError::ThresholdAboveMembers {
                threshold,
                members: members.len(),
            });
        }
        Ok(CommitteeVerifier { members, threshold })
    }

    pub fn members(&self) -> &[PublicKey] {
        &self.members
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// number of distinct members with a valid signature on `digest`
    fn valid_shares(&self, digest: &[u8], proof: &DecryptionProof) -> usize {
        let mut signers = HashSet::new();
        for (member, sig) in proof.shares() {
            let key = match self.members.get(member as usize) {
                Some(key) => key,
                None => continue,
            };
            if signers.contains(&member) {
                continue;
            }
            let signature = match Signature::try_from(&sig[..]) {
                Ok(signature) => signature,
                Err(_) => continue,
            };
            if key.verify(digest, &signature).is_ok() {
                signers.insert(member);
            }
        }
        signers.len()
    }
}

impl DecryptionVerifier for CommitteeVerifier {
    fn verify(&self, handles: &[Handle], plaintexts: &[Plaintext], proof: &[u8]) -> bool {
        let proof = match DecryptionProof::from_slice(proof) {
            Some(proof) => proof,
            None => return false,
        };
        let digest = statement_digest(handles, plaintexts);
        self.valid_shares(&digest, &proof) >= self.threshold
    }
}
