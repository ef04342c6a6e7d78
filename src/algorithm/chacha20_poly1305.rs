//! allcrypt ChaCha20-Poly1305 分块加解密

use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit},
};

use crate::crypto::nonce::chunk_nonce;
use crate::error::{AllcryptError, Result};
use crate::format::header::BASE_NONCE_SIZE;

pub fn encrypt_chunk(
    key: &[u8; 32],
    base_nonce: &[u8; BASE_NONCE_SIZE],
    chunk_index: u32,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce_bytes = chunk_nonce(base_nonce, chunk_index);

    cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| AllcryptError::Engine(format!("AEAD encrypt failed at chunk {chunk_index}")))
}

pub fn decrypt_chunk(
    key: &[u8; 32],
    base_nonce: &[u8; BASE_NONCE_SIZE],
    chunk_index: u32,
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce_bytes = chunk_nonce(base_nonce, chunk_index);

    cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext)
        .map_err(|_| AllcryptError::Authentication { chunk_index })
}
