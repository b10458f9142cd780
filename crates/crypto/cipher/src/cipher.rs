use std::fmt;

use rand::CryptoRng;
use tracing::{debug, trace, warn};

use crate::{
    errors::CtrCipherError,
    iv::{Iv, IvSize},
    keystream::Keystream,
};

/// AES-128 CTR cipher following the ISO/IEC 23001-7 (CENC) sample conventions.
///
/// One sample may be fed in any number of calls; the keystream picks up where the previous call
/// left off. Call [`CtrCipher::update_iv`] once the sample is complete to move on to the next one.
/// Encryption and decryption are the same transform.
#[derive(Default)]
pub struct CtrCipher {
    state: Option<CipherState>,
}

struct CipherState {
    keystream: Keystream,
    iv: Iv,
}

fn rejected(err: CtrCipherError) -> CtrCipherError {
    warn!("Rejected AES-CTR parameters: {err}");
    err
}

impl CtrCipher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_iv(key: &[u8], iv: &[u8]) -> Result<Self, CtrCipherError> {
        let mut cipher = Self::new();
        cipher.initialize_with_iv(key, iv)?;
        Ok(cipher)
    }

    pub fn with_random_iv(key: &[u8], iv_size: usize) -> Result<Self, CtrCipherError> {
        let mut cipher = Self::new();
        cipher.initialize_with_random_iv(key, iv_size)?;
        Ok(cipher)
    }

    /// Sets a new key and IV. On error the previous key and IV stay in place.
    pub fn initialize_with_iv(&mut self, key: &[u8], iv: &[u8]) -> Result<(), CtrCipherError> {
        let keystream = Keystream::new(key).map_err(rejected)?;
        let iv = Iv::try_from(iv).map_err(rejected)?;
        self.install(keystream, iv);
        Ok(())
    }

    pub fn initialize_with_random_iv(
        &mut self,
        key: &[u8],
        iv_size: usize,
    ) -> Result<(), CtrCipherError> {
        self.initialize_with_random_iv_from(key, iv_size, &mut rand::rng())
    }

    pub fn initialize_with_random_iv_from<R: CryptoRng + ?Sized>(
        &mut self,
        key: &[u8],
        iv_size: usize,
        rng: &mut R,
    ) -> Result<(), CtrCipherError> {
        let keystream = Keystream::new(key).map_err(rejected)?;
        let iv_size = IvSize::try_from(iv_size).map_err(rejected)?;
        self.install(keystream, Iv::random(iv_size, rng));
        Ok(())
    }

    fn install(&mut self, keystream: Keystream, iv: Iv) {
        debug!(iv_size = iv.size().byte_len(), "Initialized AES-CTR cipher");
        self.state = Some(CipherState { keystream, iv });
    }

    /// Replaces the IV and restarts the sample, keeping the key.
    pub fn set_iv(&mut self, iv: &[u8]) -> Result<(), CtrCipherError> {
        let state = self.state_mut()?;
        let iv = Iv::try_from(iv).map_err(rejected)?;

        debug!(iv_size = iv.size().byte_len(), "Reset AES-CTR IV");
        state.iv = iv;
        state.keystream.reset();
        Ok(())
    }

    /// Moves to the IV of the next sample.
    ///
    /// A 16-byte IV is advanced by the number of blocks the finished sample used, an 8-byte IV by
    /// exactly one.
    pub fn update_iv(&mut self) -> Result<(), CtrCipherError> {
        let state = self.state_mut()?;
        let blocks_consumed = state.keystream.blocks_consumed();

        state.iv.advance(blocks_consumed);
        state.keystream.reset();
        trace!(blocks_consumed, "Advanced AES-CTR IV to the next sample");
        Ok(())
    }

    /// XORs `buf` with the keystream in place.
    pub fn apply_keystream(&mut self, buf: &mut [u8]) -> Result<(), CtrCipherError> {
        let CipherState { keystream, iv } = self.state_mut()?;
        keystream.apply(iv, buf)
    }

    fn apply_keystream_to(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(), CtrCipherError> {
        self.state_mut()?;
        if input.len() != output.len() {
            return Err(CtrCipherError::OutputSizeMismatch {
                input: input.len(),
                output: output.len(),
            });
        }
        output.copy_from_slice(input);
        self.apply_keystream(output)
    }

    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CtrCipherError> {
        let mut ciphertext = plaintext.to_vec();
        self.apply_keystream(&mut ciphertext)?;
        Ok(ciphertext)
    }

    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CtrCipherError> {
        self.encrypt(ciphertext)
    }

    pub fn encrypt_to(&mut self, plaintext: &[u8], out: &mut [u8]) -> Result<(), CtrCipherError> {
        self.apply_keystream_to(plaintext, out)
    }

    pub fn decrypt_to(&mut self, ciphertext: &[u8], out: &mut [u8]) -> Result<(), CtrCipherError> {
        self.apply_keystream_to(ciphertext, out)
    }

    pub fn encrypt_in_place(&mut self, buf: &mut [u8]) -> Result<(), CtrCipherError> {
        self.apply_keystream(buf)
    }

    pub fn decrypt_in_place(&mut self, buf: &mut [u8]) -> Result<(), CtrCipherError> {
        self.apply_keystream(buf)
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    pub fn iv(&self) -> Option<&[u8]> {
        self.state.as_ref().map(|state| state.iv.as_bytes())
    }

    pub fn iv_size(&self) -> Option<IvSize> {
        self.state.as_ref().map(|state| state.iv.size())
    }

    /// Offset into the current keystream block, i.e. bytes processed in this sample modulo 16.
    pub fn block_offset(&self) -> usize {
        self.state
            .as_ref()
            .map_or(0, |state| state.keystream.offset())
    }

    fn state_mut(&mut self) -> Result<&mut CipherState, CtrCipherError> {
        self.state.as_mut().ok_or(CtrCipherError::NotInitialized)
    }
}

impl fmt::Debug for CtrCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CtrCipher")
            .field("iv_size", &self.iv_size())
            .field("block_offset", &self.block_offset())
            .finish_non_exhaustive()
    }
}
