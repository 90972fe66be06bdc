// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Encrypted key backup and recovery codes. The server stores the blob
//! and code digests only; it never sees plaintext keys.

use async_trait::async_trait;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::errors::{AmityError, AmityResult};
use crate::types::utils::Ulid;

const RECOVERY_CODE_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const RECOVERY_CODE_COUNT: usize = 8;

#[derive(Debug, Clone)]
pub struct KeyBackup {
    pub user_id: Ulid,
    pub encrypted_data: Vec<u8>,
    pub salt: Vec<u8>,
    pub nonce: Vec<u8>,
    pub key_count: u32,
    pub version: u32,
}

#[async_trait]
pub trait KeyBackupStore: Send + Sync {
    /// `ON CONFLICT user DO UPDATE version = old + 1`.
    async fn put(&self, user_id: Ulid, encrypted_data: Vec<u8>, salt: Vec<u8>, nonce: Vec<u8>, key_count: u32) -> AmityResult<u32>;
    async fn download(&self, user_id: Ulid) -> AmityResult<KeyBackup>;
    /// Wipes the backup and all associated recovery codes.
    async fn delete(&self, user_id: Ulid) -> AmityResult<()>;
}

/// Generates 8 codes of the form `XXXX-XXXX-XXXX-XXXX` over the
/// Crockford-like alphabet, and their SHA-256 digests for storage. The
/// server keeps only the digests.
pub fn generate_recovery_codes() -> Vec<(String, [u8; 32])> {
    (0..RECOVERY_CODE_COUNT)
        .map(|_| {
            let code = generate_one_code();
            let digest: [u8; 32] = Sha256::digest(code.as_bytes()).into();
            (code, digest)
        })
        .collect()
}

fn generate_one_code() -> String {
    let mut rng = rand::thread_rng();
    let groups: Vec<String> = (0..4)
        .map(|_| {
            (0..4)
                .map(|_| RECOVERY_CODE_ALPHABET[(rng.next_u32() % 32) as usize] as char)
                .collect::<String>()
        })
        .collect();
    groups.join("-")
}

pub fn digest_recovery_code(code: &str) -> [u8; 32] {
    Sha256::digest(code.trim().to_uppercase().as_bytes()).into()
}

const MIN_SALT_LEN: usize = 16;
const MIN_NONCE_LEN: usize = 12;

pub fn validate_backup_inputs(salt: &[u8], nonce: &[u8]) -> AmityResult<()> {
    if salt.len() < MIN_SALT_LEN {
        return Err(AmityError::BadRequest { reason: format!("salt must be >= {MIN_SALT_LEN} bytes") });
    }
    if nonce.len() < MIN_NONCE_LEN {
        return Err(AmityError::BadRequest { reason: format!("nonce must be >= {MIN_NONCE_LEN} bytes") });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_eight_codes_in_expected_format() {
        let codes = generate_recovery_codes();
        assert_eq!(codes.len(), RECOVERY_CODE_COUNT);
        for (code, _digest) in &codes {
            assert_eq!(code.len(), 19);
            assert_eq!(code.matches('-').count(), 3);
        }
    }

    #[test]
    fn digest_is_case_and_whitespace_insensitive() {
        let a = digest_recovery_code("abcd-efgh-jklm-nprq");
        let b = digest_recovery_code(" ABCD-EFGH-JKLM-NPRQ ");
        assert_eq!(a, b);
    }

    #[test]
    fn validate_rejects_short_salt_or_nonce() {
        assert!(validate_backup_inputs(b"short", &[0u8; 12]).is_err());
        assert!(validate_backup_inputs(&[0u8; 16], b"short").is_err());
        assert!(validate_backup_inputs(&[0u8; 16], &[0u8; 12]).is_ok());
    }
}
