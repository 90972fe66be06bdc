// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Passphrase-derived channel keys. This is a client-side helper: the
//! server never calls it and never sees the derived key or the
//! plaintext it protects. It lives in this crate so the one piece of
//! end-to-end encryption that is client-facing still has a tested
//! reference implementation.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use crate::errors::{AmityError, AmityResult};

/// Floor on PBKDF2 iterations: must be at least 600,000.
pub const MIN_ITERATIONS: u32 = 600_000;
pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

/// Derives a 256-bit AES-GCM key from `passphrase` and `salt`. The salt
/// is part of the backup blob, not transmitted per-message.
pub fn derive_key(passphrase: &str, salt: &[u8], iterations: u32) -> AmityResult<[u8; KEY_LEN]> {
    if iterations < MIN_ITERATIONS {
        return Err(AmityError::BadRequest {
            reason: format!("pbkdf2 iteration count must be >= {MIN_ITERATIONS}"),
        });
    }
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, iterations, &mut key);
    Ok(key)
}

/// Encrypts `plaintext` under the channel key, returning ciphertext with
/// the GCM tag appended. `aad` should be the channel id so ciphertext
/// can't be replayed into a different channel.
pub fn encrypt(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], plaintext: &[u8], aad: &[u8]) -> AmityResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| AmityError::Internal { reason: e.to_string() })?;
    cipher
        .encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
        .map_err(|_| AmityError::Internal { reason: "encryption failed".to_string() })
}

pub fn decrypt(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], ciphertext: &[u8], aad: &[u8]) -> AmityResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| AmityError::Internal { reason: e.to_string() })?;
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| AmityError::BadRequest { reason: "decryption failed: wrong key or tampered ciphertext".to_string() })
}

/// Appends `.enc` to an attachment's inner filename: attachments are
/// also encrypted client-side and stored with this suffix.
pub fn encrypted_attachment_filename(inner_name: &str) -> String {
    format!("{inner_name}.enc")
}
