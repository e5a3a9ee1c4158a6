//! At-rest encryption for stored OAuth tokens
//!
//! Tokens are encrypted with AES-256-GCM under a key derived from the local
//! machine and OS user identity. There is no passphrase: the goal is to keep
//! tokens unreadable when the state file is copied off the machine (backups,
//! sync folders), not to defend against a local attacker with the same login.
//!
//! Serialized form is `hex(iv) + ":" + hex(ciphertext)` with a fresh random
//! 16-byte IV per call, so encrypting the same plaintext twice never yields
//! the same output.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Key, Nonce};
use rand::RngExt;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// AES-256-GCM with a 16-byte nonce, matching the serialized IV width.
type TokenCipher = AesGcm<Aes256, U16>;

const IV_LEN: usize = 16;

/// Derive the symmetric key from host identity and OS user name.
///
/// Deterministic for a given machine+user, different across machines and
/// users. A state file decrypts only where it was written.
pub fn derive_key() -> [u8; 32] {
    let hostname = whoami::fallible::hostname().unwrap_or_else(|_| String::from("localhost"));
    let fingerprint = format!("{}:{}", hostname, whoami::username());
    Sha256::digest(fingerprint.as_bytes()).into()
}

/// Encrypt a plaintext token into the `hex(iv):hex(ciphertext)` form.
///
/// A fresh random IV is generated per call.
pub fn encrypt(key: &[u8; 32], plaintext: &str) -> Result<String> {
    let cipher = TokenCipher::new(Key::<TokenCipher>::from_slice(key));
    let mut iv = [0u8; IV_LEN];
    rand::rng().fill(&mut iv);

    let ciphertext = cipher
        .encrypt(Nonce::<U16>::from_slice(&iv), plaintext.as_bytes())
        .map_err(|e| Error::Crypto(format!("AES-GCM encryption failed: {e}")))?;

    Ok(format!("{}:{}", hex::encode(iv), hex::encode(ciphertext)))
}

/// Decrypt a `hex(iv):hex(ciphertext)` token back to plaintext.
///
/// Fails with `CorruptCredential` when the format is not exactly two
/// colon-delimited segments with a 32-hex-character first segment, or when
/// the ciphertext does not authenticate under this machine's key.
pub fn decrypt(key: &[u8; 32], serialized: &str) -> Result<String> {
    let Some((iv_hex, ct_hex)) = serialized.split_once(':') else {
        return Err(Error::CorruptCredential(
            "expected 2 colon-delimited segments, got 1".into(),
        ));
    };
    if ct_hex.contains(':') {
        return Err(Error::CorruptCredential(
            "expected 2 colon-delimited segments, got more".into(),
        ));
    }
    if iv_hex.len() != IV_LEN * 2 {
        return Err(Error::CorruptCredential(format!(
            "IV segment must be {} hex chars, got {}",
            IV_LEN * 2,
            iv_hex.len()
        )));
    }

    let iv = hex::decode(iv_hex)
        .map_err(|e| Error::CorruptCredential(format!("invalid IV hex: {e}")))?;
    let ciphertext = hex::decode(ct_hex)
        .map_err(|e| Error::CorruptCredential(format!("invalid ciphertext hex: {e}")))?;

    let cipher = TokenCipher::new(Key::<TokenCipher>::from_slice(key));
    let plaintext = cipher
        .decrypt(Nonce::<U16>::from_slice(&iv), ciphertext.as_ref())
        .map_err(|_| Error::CorruptCredential("decryption failed (wrong machine or tampered data)".into()))?;

    String::from_utf8(plaintext)
        .map_err(|e| Error::CorruptCredential(format!("decrypted token is not UTF-8: {e}")))
}

/// Format heuristic distinguishing encrypted tokens from legacy plaintext.
///
/// True only for `<32 hex chars>:<hex>` strings. Plaintext tokens written by
/// earlier releases fail this check and are read back as-is.
pub fn is_encoded(text: &str) -> bool {
    let Some((iv_hex, ct_hex)) = text.split_once(':') else {
        return false;
    };
    iv_hex.len() == IV_LEN * 2
        && !ct_hex.is_empty()
        && iv_hex.chars().all(|c| c.is_ascii_hexdigit())
        && ct_hex.chars().all(|c| c.is_ascii_hexdigit())
}
