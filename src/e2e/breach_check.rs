// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Password/passphrase breach checking via the HIBP k-anonymity API:
//! only the first 5 hex characters of the SHA-1 digest ever leave the
//! process, so the service never learns the full digest of a real
//! credential.

use sha1::{Digest, Sha1};

use crate::errors::AmityResult;
use crate::http_client::SsrfSafeClient;

const HIBP_RANGE_URL: &str = "https://api.pwnedpasswords.com/range/";

/// Splits a password's SHA-1 digest into the 5-char prefix sent to the
/// API and the remaining 35-char suffix matched against the response
/// locally.
pub fn digest_halves(password: &str) -> (String, String) {
    let digest = Sha1::digest(password.as_bytes());
    let hex = hex_upper(&digest);
    (hex[..5].to_string(), hex[5..].to_string())
}

fn hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

/// Parses a `prefix:count\r\n...`-formatted HIBP range response, looking
/// for `suffix`. Returns the breach count, or `0` if not present.
pub fn count_from_range_response(body: &str, suffix: &str) -> u64 {
    for line in body.lines() {
        if let Some((candidate_suffix, count)) = line.trim().split_once(':') {
            if candidate_suffix.eq_ignore_ascii_case(suffix) {
                return count.trim().parse().unwrap_or(0);
            }
        }
    }
    0
}

/// Queries the HIBP range endpoint for `password`'s prefix and returns
/// how many times the exact password has been seen in a breach corpus.
/// The client used here must be a plain outbound client, not the
/// SSRF-safe one built for user-supplied webhook URLs, since this
/// always dials a fixed, trusted host.
pub async fn check_breach_count(client: &SsrfSafeClient, password: &str) -> AmityResult<u64> {
    let (prefix, suffix) = digest_halves(password);
    let url = format!("{HIBP_RANGE_URL}{prefix}");
    let response = client.inner().get(&url).send().await.map_err(crate::errors::AmityError::from)?;
    let body = response.text().await.map_err(crate::errors::AmityError::from)?;
    Ok(count_from_range_response(&body, &suffix))
}
