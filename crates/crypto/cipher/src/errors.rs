use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CtrCipherError {
    #[error("Invalid key size: expected 16 bytes, got {0}")]
    InvalidKeySize(usize),

    #[error("Invalid IV size: expected 8 or 16 bytes, got {0}")]
    InvalidIvSize(usize),

    #[error("Cipher used before a key and IV were set")]
    NotInitialized,

    #[error("Output buffer size {output} does not match input size {input}")]
    OutputSizeMismatch { input: usize, output: usize },

    #[error("Block counter overflowed within a single sample")]
    CounterOverflow,
}
