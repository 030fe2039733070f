use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use crypto_secretbox::{Nonce as BoxNonce, XSalsa20Poly1305};
use rand::RngCore;
use uuid::Uuid;

use crate::constants::{NONCE_SIZE, SYMMETRIC_KEY_SIZE, TOKEN_BYTES};
use crate::error::CryptoError;

pub type SymmetricKey = [u8; SYMMETRIC_KEY_SIZE];

/// Fresh per-order key from the OS CSPRNG. Never derived from a password.
pub fn generate_key() -> SymmetricKey {
    let mut key = [0u8; SYMMETRIC_KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

// ---------------------------------------------------------------------------
// Redeem code cipher (NaCl secretbox: XSalsa20-Poly1305)
// ---------------------------------------------------------------------------

/// Seal one redeem code.
///
/// Returns `base64(nonce[24] || tag || ciphertext)`, the same layout NaCl's
/// `secretbox` produces, so rows written by other secretbox implementations
/// stay readable.
pub fn encrypt_code(plaintext: &str, key: &SymmetricKey) -> Result<String, CryptoError> {
    let cipher = XSalsa20Poly1305::new(key.into());
    let nonce_bytes = generate_nonce();
    let nonce = BoxNonce::from_slice(&nonce_bytes);

    let sealed = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut output = Vec::with_capacity(NONCE_SIZE + sealed.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&sealed);
    Ok(BASE64.encode(output))
}

/// Open a blob produced by [`encrypt_code`].
///
/// Any malformed, truncated, tampered or wrong-key input yields
/// [`CryptoError::DecryptionFailed`]; no partial plaintext is returned.
pub fn decrypt_code(blob: &str, key: &SymmetricKey) -> Result<String, CryptoError> {
    let data = BASE64
        .decode(blob.trim())
        .map_err(|_| CryptoError::DecryptionFailed)?;
    if data.len() < NONCE_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }

    let (nonce_bytes, sealed) = data.split_at(NONCE_SIZE);
    let cipher = XSalsa20Poly1305::new(key.into());
    let nonce = BoxNonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, sealed)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
}

// ---------------------------------------------------------------------------
// Vault key encoding and wrapping
// ---------------------------------------------------------------------------

/// Plain at-rest encoding of a vault key: `base64(key)`.
pub fn encode_key(key: &SymmetricKey) -> String {
    BASE64.encode(key)
}

pub fn decode_key(encoded: &str) -> Result<SymmetricKey, CryptoError> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|_| CryptoError::InvalidKeyLength)?;
    bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKeyLength)
}

// Returns base64(nonce || XChaCha20-Poly1305(master, key)); the order id is
// bound as associated data so a wrapped key only opens on its own order.
pub fn wrap_key(
    master: &SymmetricKey,
    order_id: &Uuid,
    key: &SymmetricKey,
) -> Result<String, CryptoError> {
    let cipher = XChaCha20Poly1305::new(master.into());
    let nonce_bytes = generate_nonce();
    let nonce = XNonce::from_slice(&nonce_bytes);

    let wrapped = cipher
        .encrypt(
            nonce,
            Payload {
                msg: key.as_slice(),
                aad: order_id.as_bytes(),
            },
        )
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut output = Vec::with_capacity(NONCE_SIZE + wrapped.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&wrapped);
    Ok(BASE64.encode(output))
}

pub fn unwrap_key(
    master: &SymmetricKey,
    order_id: &Uuid,
    stored: &str,
) -> Result<SymmetricKey, CryptoError> {
    let data = BASE64
        .decode(stored.trim())
        .map_err(|_| CryptoError::KeyUnwrapFailed)?;
    if data.len() < NONCE_SIZE {
        return Err(CryptoError::KeyUnwrapFailed);
    }

    let (nonce_bytes, wrapped) = data.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(master.into());
    let nonce = XNonce::from_slice(nonce_bytes);

    let key = cipher
        .decrypt(
            nonce,
            Payload {
                msg: wrapped,
                aad: order_id.as_bytes(),
            },
        )
        .map_err(|_| CryptoError::KeyUnwrapFailed)?;
    key.try_into().map_err(|_| CryptoError::InvalidKeyLength)
}

// ---------------------------------------------------------------------------
// API tokens
// ---------------------------------------------------------------------------

/// New bearer token, hex-encoded. Only its hash is ever persisted.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    blake3::hash(token.as_bytes()).to_hex().to_string()
}
