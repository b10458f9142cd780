use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::errors::CtrCipherError;

pub const BLOCK_SIZE: usize = 16;

/// IV widths allowed by ISO/IEC 23001-7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum IvSize {
    Bytes8,
    Bytes16,
}

impl IvSize {
    pub const fn byte_len(self) -> usize {
        match self {
            IvSize::Bytes8 => 8,
            IvSize::Bytes16 => 16,
        }
    }
}

impl TryFrom<usize> for IvSize {
    type Error = CtrCipherError;

    fn try_from(size: usize) -> Result<Self, Self::Error> {
        match size {
            8 => Ok(IvSize::Bytes8),
            16 => Ok(IvSize::Bytes16),
            _ => Err(CtrCipherError::InvalidIvSize(size)),
        }
    }
}

impl From<IvSize> for usize {
    fn from(size: IvSize) -> Self {
        size.byte_len()
    }
}

/// Initialization vector for one sample.
///
/// The two widths differ in where the per-block counter lives:
/// - `Counter128`: the IV is the counter block itself. Block `n` of the sample is encrypted under
///   `IV + n (mod 2^128)`, so the next sample must start past every block this one used.
/// - `Nonce64`: the IV fills the high half of the counter block and the block index fills the low
///   half. The index restarts at zero for every sample, so the next sample's IV is `IV + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Iv {
    Counter128([u8; 16]),
    Nonce64([u8; 8]),
}

impl Iv {
    pub fn random<R: CryptoRng + ?Sized>(size: IvSize, rng: &mut R) -> Self {
        match size {
            IvSize::Bytes8 => {
                let mut iv = [0u8; 8];
                rng.fill_bytes(&mut iv);
                Iv::Nonce64(iv)
            }
            IvSize::Bytes16 => {
                let mut iv = [0u8; 16];
                rng.fill_bytes(&mut iv);
                Iv::Counter128(iv)
            }
        }
    }

    pub fn size(&self) -> IvSize {
        match self {
            Iv::Counter128(_) => IvSize::Bytes16,
            Iv::Nonce64(_) => IvSize::Bytes8,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Iv::Counter128(iv) => iv,
            Iv::Nonce64(iv) => iv,
        }
    }

    /// Returns the block cipher input for block `block_index` of the current sample.
    pub fn counter_block(&self, block_index: u64) -> [u8; BLOCK_SIZE] {
        match self {
            Iv::Counter128(iv) => u128::from_be_bytes(*iv)
                .wrapping_add(u128::from(block_index))
                .to_be_bytes(),
            Iv::Nonce64(iv) => {
                let mut block = [0u8; BLOCK_SIZE];
                block[..8].copy_from_slice(iv);
                block[8..].copy_from_slice(&block_index.to_be_bytes());
                block
            }
        }
    }

    /// Moves the IV to the value used by the next sample.
    pub fn advance(&mut self, blocks_consumed: u64) {
        match self {
            Iv::Counter128(iv) => {
                *iv = u128::from_be_bytes(*iv)
                    .wrapping_add(u128::from(blocks_consumed))
                    .to_be_bytes();
            }
            Iv::Nonce64(iv) => {
                *iv = u64::from_be_bytes(*iv).wrapping_add(1).to_be_bytes();
            }
        }
    }
}

impl TryFrom<&[u8]> for Iv {
    type Error = CtrCipherError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if let Ok(iv) = <[u8; 16]>::try_from(bytes) {
            return Ok(Iv::Counter128(iv));
        }
        if let Ok(iv) = <[u8; 8]>::try_from(bytes) {
            return Ok(Iv::Nonce64(iv));
        }
        Err(CtrCipherError::InvalidIvSize(bytes.len()))
    }
}
