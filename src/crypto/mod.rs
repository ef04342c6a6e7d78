pub mod engine;
pub mod kdf;
pub mod nonce;

pub use engine::{AeadEngine, CipherEngine, EncryptInit};
pub use kdf::{SecretKey, derive_key};
pub use nonce::NonceSequence;
