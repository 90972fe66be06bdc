// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt::Display;
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use rand::RngCore;

/// Crockford base32 alphabet used by ULID: excludes I, L, O, U to avoid
/// visual confusion with 1/0/V.
const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// A 128-bit, 26-character, lexicographically-sortable identifier.
///
/// Every entity in the data model is keyed by one of these. Sort order is
/// time order: the first 48 bits are a millisecond timestamp, the remaining
/// 80 bits are randomness with a per-process monotonic counter folded into
/// the top 16 random bits so identifiers generated within the same
/// millisecond on the same process still sort correctly relative to each
/// other.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ulid(pub u128);

impl Ulid {
    pub fn generate() -> Self {
        static COUNTER: AtomicU16 = AtomicU16::new(0);

        let millis = Utc::now().timestamp_millis() as u64 & 0xFFFF_FFFF_FFFF;
        let counter = COUNTER.fetch_add(1, Ordering::Relaxed);

        let mut randomness = [0u8; 10];
        rand::thread_rng().fill_bytes(&mut randomness);
        randomness[0] = (counter >> 8) as u8;
        randomness[1] = counter as u8;

        let mut value: u128 = (millis as u128) << 80;
        for byte in randomness {
            value = (value << 8) | byte as u128;
        }
        Self(value)
    }

    pub fn timestamp(self) -> DateTime<Utc> {
        let millis = (self.0 >> 80) as i64;
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    /// Encodes to the 26-character uppercase Crockford base32 form.
    pub fn to_crockford(self) -> String {
        let mut out = [0u8; 26];
        let mut value = self.0;
        for slot in out.iter_mut().rev() {
            *slot = ALPHABET[(value & 0x1F) as usize];
            value >>= 5;
        }
        String::from_utf8(out.to_vec()).unwrap()
    }

    pub fn from_crockford(s: &str) -> Option<Self> {
        if s.len() != 26 {
            return None;
        }
        let mut value: u128 = 0;
        for c in s.bytes() {
            let digit = crockford_value(c)?;
            value = (value << 5) | digit as u128;
        }
        Some(Self(value))
    }
}

fn crockford_value(byte: u8) -> Option<u8> {
    let upper = byte.to_ascii_uppercase();
    ALPHABET.iter().position(|&b| b == upper).map(|p| p as u8)
}

impl Default for Ulid {
    fn default() -> Self {
        Self::generate()
    }
}

impl Display for Ulid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_crockford())
    }
}

impl serde::Serialize for Ulid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_crockford())
    }
}

impl<'de> serde::Deserialize<'de> for Ulid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct UlidVisitor;
        impl serde::de::Visitor<'_> for UlidVisitor {
            type Value = Ulid;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a 26-character crockford-base32 ulid string")
            }

            fn visit_str<E>(self, value: &str) -> Result<Ulid, E>
            where
                E: serde::de::Error,
            {
                Ulid::from_crockford(value)
                    .ok_or_else(|| serde::de::Error::custom("invalid ulid"))
            }
        }
        deserializer.deserialize_str(UlidVisitor)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Ulid {
    fn type_info() -> <sqlx::Postgres as sqlx::Database>::TypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

#[cfg(feature = "postgres")]
impl sqlx::postgres::PgHasArrayType for Ulid {
    fn array_type_info() -> sqlx::postgres::PgTypeInfo {
        <Vec<String> as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

#[cfg(feature = "postgres")]
impl<'q> sqlx::Encode<'q, sqlx::Postgres> for Ulid {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Postgres as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.to_crockford(), buf)
    }
}

#[cfg(feature = "postgres")]
impl<'d> sqlx::Decode<'d, sqlx::Postgres> for Ulid {
    fn decode(
        value: <sqlx::Postgres as sqlx::Database>::ValueRef<'d>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<'d, sqlx::Postgres>>::decode(value)?;
        Ulid::from_crockford(&s).ok_or_else(|| "invalid ulid in column".into())
    }
}
