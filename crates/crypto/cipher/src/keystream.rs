use std::fmt;

use aes::{
    Aes128,
    cipher::{BlockEncrypt, KeyInit, generic_array::GenericArray},
};
use zeroize::Zeroize;

use crate::{
    errors::CtrCipherError,
    iv::{BLOCK_SIZE, Iv},
};

pub const KEY_SIZE: usize = 16;

/// AES-128 keystream with a cursor that survives across calls.
///
/// `offset == BLOCK_SIZE` means the cached block is spent (or was never derived) and the next byte
/// needs a fresh block. `block_index` counts the blocks derived since the last
/// [`Keystream::reset`], a trailing partial block included.
pub struct Keystream {
    cipher: Aes128,
    block: [u8; BLOCK_SIZE],
    offset: usize,
    block_index: u64,
}

impl Keystream {
    pub fn new(key: &[u8]) -> Result<Self, CtrCipherError> {
        let cipher = Aes128::new_from_slice(key)
            .map_err(|_| CtrCipherError::InvalidKeySize(key.len()))?;

        Ok(Self {
            cipher,
            block: [0; BLOCK_SIZE],
            offset: BLOCK_SIZE,
            block_index: 0,
        })
    }

    pub fn reset(&mut self) {
        self.block.zeroize();
        self.offset = BLOCK_SIZE;
        self.block_index = 0;
    }

    /// Position inside the current block, `0..BLOCK_SIZE`.
    pub fn offset(&self) -> usize {
        self.offset % BLOCK_SIZE
    }

    pub fn blocks_consumed(&self) -> u64 {
        self.block_index
    }

    /// XORs `buf` with the keystream for `iv`, continuing from wherever the previous call stopped.
    pub fn apply(&mut self, iv: &Iv, buf: &mut [u8]) -> Result<(), CtrCipherError> {
        // Checked up front so an overflowing call leaves both `buf` and the cursor untouched.
        self.block_index
            .checked_add(self.blocks_needed(buf.len()))
            .ok_or(CtrCipherError::CounterOverflow)?;

        let mut position = 0;
        while position < buf.len() {
            if self.offset == BLOCK_SIZE {
                self.refill(iv);
            }

            let len = (buf.len() - position).min(BLOCK_SIZE - self.offset);
            for (byte, key) in buf[position..position + len]
                .iter_mut()
                .zip(&self.block[self.offset..self.offset + len])
            {
                *byte ^= key;
            }

            self.offset += len;
            position += len;
        }

        Ok(())
    }

    fn blocks_needed(&self, len: usize) -> u64 {
        let buffered = BLOCK_SIZE - self.offset;
        if len <= buffered {
            return 0;
        }
        (len - buffered).div_ceil(BLOCK_SIZE) as u64
    }

    fn refill(&mut self, iv: &Iv) {
        let mut block = GenericArray::from(iv.counter_block(self.block_index));
        self.cipher.encrypt_block(&mut block);
        self.block.copy_from_slice(&block);
        self.block_index += 1;
        self.offset = 0;
    }
}

impl Drop for Keystream {
    fn drop(&mut self) {
        self.block.zeroize();
    }
}

impl fmt::Debug for Keystream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keystream")
            .field("offset", &self.offset())
            .field("block_index", &self.block_index)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keystream() -> Keystream {
        Keystream::new(&[1u8; KEY_SIZE]).unwrap()
    }

    #[test]
    fn test_rejects_short_key() {
        assert_eq!(
            Keystream::new(&[0u8; 13]).unwrap_err(),
            CtrCipherError::InvalidKeySize(13)
        );
        assert_eq!(
            Keystream::new(&[0u8; 32]).unwrap_err(),
            CtrCipherError::InvalidKeySize(32)
        );
    }

    #[test]
    fn test_blocks_consumed_rounds_up_partial_block() {
        let iv = Iv::Nonce64([0; 8]);
        let mut keystream = keystream();

        keystream.apply(&iv, &mut []).unwrap();
        assert_eq!(keystream.blocks_consumed(), 0);
        assert_eq!(keystream.offset(), 0);

        keystream.apply(&iv, &mut [0u8; 1]).unwrap();
        assert_eq!(keystream.blocks_consumed(), 1);
        assert_eq!(keystream.offset(), 1);

        keystream.apply(&iv, &mut [0u8; 15]).unwrap();
        assert_eq!(keystream.blocks_consumed(), 1);
        assert_eq!(keystream.offset(), 0);

        keystream.apply(&iv, &mut [0u8; 44]).unwrap();
        assert_eq!(keystream.blocks_consumed(), 4);
        assert_eq!(keystream.offset(), 12);

        keystream.reset();
        assert_eq!(keystream.blocks_consumed(), 0);
        assert_eq!(keystream.offset(), 0);
    }

    #[test]
    fn test_split_calls_match_single_call() {
        let iv = Iv::Counter128([0x42; 16]);
        let data: Vec<u8> = (0..=99).collect();

        let mut whole = data.clone();
        keystream().apply(&iv, &mut whole).unwrap();

        let mut split = data.clone();
        let mut keystream = keystream();
        let (head, tail) = split.split_at_mut(21);
        keystream.apply(&iv, head).unwrap();
        keystream.apply(&iv, tail).unwrap();

        assert_eq!(whole, split);
        assert_ne!(whole, data);
    }

    #[test]
    fn test_counter_overflow_is_reported_before_mutation() {
        let iv = Iv::Nonce64([0xab; 8]);
        let mut keystream = keystream();
        keystream.block_index = u64::MAX - 1;

        keystream.apply(&iv, &mut [0u8; 16]).unwrap();
        assert_eq!(keystream.blocks_consumed(), u64::MAX);

        let mut buf = [7u8; 3];
        assert_eq!(
            keystream.apply(&iv, &mut buf),
            Err(CtrCipherError::CounterOverflow)
        );
        assert_eq!(buf, [7u8; 3]);
        assert_eq!(keystream.blocks_consumed(), u64::MAX);
        assert_eq!(keystream.offset(), 0);
    }
}
