//! # Seal Engines
//!
//! A seal proves a header was validly produced. [`HashSeal`] is a
//! Keccak proof-of-work; [`FakeSeal`] covers tests (accept all, fail at one
//! height, or accept after a delay).

use std::time::Duration;

use lantern_types::{keccak256, Header, U256};

use crate::domain::ConsensusError;

/// Seal verification.
pub trait SealEngine: Send + Sync {
    /// Check the seal on `header`.
    fn verify_seal(&self, header: &Header) -> Result<(), ConsensusError>;
}

fn pow_digest(header: &Header) -> [u8; 32] {
    let mut buf = [0u8; 40];
    buf[..32].copy_from_slice(&header.seal_hash());
    buf[32..].copy_from_slice(&header.nonce.to_be_bytes());
    keccak256(buf)
}

/// Keccak proof-of-work: `keccak(seal_hash || nonce)` must equal the mix
/// digest and, read as a big-endian integer, be at most `2^256 / difficulty`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashSeal;

impl HashSeal {
    /// Search nonces until the header carries a valid seal.
    pub fn seal(&self, mut header: Header) -> Header {
        loop {
            header.mix_digest = pow_digest(&header);
            if self.verify_seal(&header).is_ok() {
                return header;
            }
            header.nonce = header.nonce.wrapping_add(1);
        }
    }
}

impl SealEngine for HashSeal {
    fn verify_seal(&self, header: &Header) -> Result<(), ConsensusError> {
        let invalid = |reason: &str| ConsensusError::SealInvalid {
            number: header.number,
            reason: reason.to_string(),
        };
        if header.difficulty.is_zero() {
            return Err(invalid("zero difficulty"));
        }
        let digest = pow_digest(header);
        if digest != header.mix_digest {
            return Err(invalid("mix digest mismatch"));
        }
        let target = U256::MAX / header.difficulty;
        if U256::from_big_endian(&digest) > target {
            return Err(invalid("proof-of-work above target"));
        }
        Ok(())
    }
}

/// Test seal engine.
#[derive(Debug, Clone, Default)]
pub struct FakeSeal {
    fail_at: Option<u64>,
    delay: Duration,
}

impl FakeSeal {
    /// Accept every seal.
    pub fn accept_all() -> Self {
        Self::default()
    }

    /// Accept every seal except the one at `number`.
    pub fn fail_at(number: u64) -> Self {
        Self {
            fail_at: Some(number),
            delay: Duration::ZERO,
        }
    }

    /// Accept every seal after sleeping for `delay`.
    pub fn delayed(delay: Duration) -> Self {
        Self {
            fail_at: None,
            delay,
        }
    }
}

impl SealEngine for FakeSeal {
    fn verify_seal(&self, header: &Header) -> Result<(), ConsensusError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail_at == Some(header.number) {
            return Err(ConsensusError::SealInvalid {
                number: header.number,
                reason: "invalid proof-of-work".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_types::test_utils::{child_of, genesis_header};

    #[test]
    fn test_hash_seal_round_trip() {
        let mut header = child_of(&genesis_header(), 1);
        header.difficulty = U256::from(16u64);
        let sealed = HashSeal.seal(header);
        assert!(HashSeal.verify_seal(&sealed).is_ok());

        let mut tampered = sealed.clone();
        tampered.gas_used += 1;
        assert!(matches!(
            HashSeal.verify_seal(&tampered),
            Err(ConsensusError::SealInvalid { .. })
        ));
    }

    #[test]
    fn test_zero_difficulty_rejected() {
        let mut header = child_of(&genesis_header(), 1);
        header.difficulty = U256::zero();
        assert!(HashSeal.verify_seal(&header).is_err());
    }

    #[test]
    fn test_fake_seal_modes() {
        let header = child_of(&genesis_header(), 1);
        assert!(FakeSeal::accept_all().verify_seal(&header).is_ok());
        assert!(FakeSeal::fail_at(1).verify_seal(&header).is_err());
        assert!(FakeSeal::fail_at(2).verify_seal(&header).is_ok());
        assert!(FakeSeal::delayed(Duration::from_millis(1))
            .verify_seal(&header)
            .is_ok());
    }
}
