//! crates/pawforms_core/src/crypto.rs
//!
//! Client-side encryption utilities for pawforms.
//!
//! Two independent password-based primitives live here:
//!
//! * A reversible confidentiality transform: PBKDF2-HMAC-SHA256 key
//!   derivation over a random per-call salt, then ChaCha20-Poly1305 over the
//!   canonical JSON serialization of the value. The derived key never needs
//!   to leave the client.
//! * A one-way password gate hash for server-side verification: a plain
//!   SHA-256 hex digest. Deterministic and unsalted, so identical passwords
//!   produce identical digests across forms. Known weaker-than-ideal, kept
//!   for compatibility with stored hashes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Default PBKDF2 round count. Deliberately slow to resist brute force.
pub const KDF_ITERATIONS: u32 = 10_000;

/// Random salt length in bytes, hex-encoded on the wire (256 bits).
pub const SALT_LEN: usize = 32;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Ciphertext plus the salt needed to re-derive its key. The salt is not
/// secret and is stored alongside the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// base64( nonce || ChaCha20-Poly1305 ciphertext ).
    pub ciphertext: String,
    /// Hex-encoded random salt, fresh on every encryption.
    pub salt: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Password cannot be empty")]
    EmptyPassword,
    #[error("Failed to serialize form data")]
    Serialize,
    #[error("Encryption failed")]
    Encryption,
    /// Deliberately undifferentiated: a wrong password and corrupted
    /// ciphertext are indistinguishable to the caller.
    #[error("Failed to decrypt form data. Please check your password.")]
    Decryption,
}

fn derive_key(password: &str, salt: &str, iterations: u32) -> Key {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut key);
    key.into()
}

/// Encrypts a JSON-serializable value under a password.
///
/// Generates a fresh random salt per call, so encrypting the same value
/// twice yields different salts and different ciphertexts.
pub fn encrypt(value: &serde_json::Value, password: &str) -> Result<EncryptedPayload, CryptoError> {
    encrypt_with_iterations(value, password, KDF_ITERATIONS)
}

/// Like [`encrypt`], with an explicit PBKDF2 round count. Decryption must
/// use the same count.
pub fn encrypt_with_iterations(
    value: &serde_json::Value,
    password: &str,
    iterations: u32,
) -> Result<EncryptedPayload, CryptoError> {
    if password.is_empty() {
        return Err(CryptoError::EmptyPassword);
    }

    let mut salt_bytes = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt = hex::encode(salt_bytes);

    let key = derive_key(password, &salt, iterations);
    let cipher = ChaCha20Poly1305::new(&key);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from(nonce_bytes);

    let plaintext = serde_json::to_vec(value).map_err(|_| CryptoError::Serialize)?;
    let sealed = cipher
        .encrypt(&nonce, plaintext.as_slice())
        .map_err(|_| CryptoError::Encryption)?;

    let mut combined = Vec::with_capacity(NONCE_LEN + sealed.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&sealed);

    Ok(EncryptedPayload {
        ciphertext: BASE64.encode(combined),
        salt,
    })
}

/// Decrypts a payload produced by [`encrypt`].
///
/// Every failure mode (wrong password, truncated or tampered ciphertext,
/// non-JSON plaintext) collapses into [`CryptoError::Decryption`] so the
/// error is not usable as a password oracle.
pub fn decrypt(payload: &EncryptedPayload, password: &str) -> Result<serde_json::Value, CryptoError> {
    decrypt_with_iterations(payload, password, KDF_ITERATIONS)
}

/// Like [`decrypt`], with an explicit PBKDF2 round count.
pub fn decrypt_with_iterations(
    payload: &EncryptedPayload,
    password: &str,
    iterations: u32,
) -> Result<serde_json::Value, CryptoError> {
    let combined = BASE64
        .decode(&payload.ciphertext)
        .map_err(|_| CryptoError::Decryption)?;
    if combined.len() <= NONCE_LEN {
        return Err(CryptoError::Decryption);
    }
    let (nonce_bytes, sealed) = combined.split_at(NONCE_LEN);

    let key = derive_key(password, &payload.salt, iterations);
    let cipher = ChaCha20Poly1305::new(&key);

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), sealed)
        .map_err(|_| CryptoError::Decryption)?;

    serde_json::from_slice(&plaintext).map_err(|_| CryptoError::Decryption)
}

/// Hashes a password for server-side storage and verification.
///
/// Deterministic: the same password always produces the same digest.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Verifies a password against a stored digest. Never errors; any mismatch
/// is simply `false`.
pub fn verify_password(password: &str, digest: &str) -> bool {
    hash_password(password) == digest
}
