pub mod cipher;
pub mod errors;
pub mod iv;
pub mod keystream;
