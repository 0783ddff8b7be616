//! OTP generation, hashing and expiry checks
//!
//! Pure computation only; storing and counting attempts against records
//! is the caller's job.

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Uniform;
use rand::Rng;

/// Number of digits in a generated code
const OTP_LENGTH: usize = 6;

/// Code generation and verification with injected knobs.
#[derive(Clone, Debug)]
pub struct OtpEngine {
    /// Minutes a code stays valid after issue.
    pub ttl_minutes: i64,
    /// bcrypt cost factor for stored digests.
    pub hash_cost: u32,
    /// Failed submissions tolerated before the record is burned.
    pub max_attempts: i64,
}

impl OtpEngine {
    pub fn new(ttl_minutes: i64, hash_cost: u32, max_attempts: i64) -> Self {
        Self {
            ttl_minutes,
            hash_cost,
            max_attempts,
        }
    }

    /// Generate a 6-digit code. Each digit is sampled uniformly so
    /// leading zeros survive and the full 000000-999999 range is
    /// reachable.
    pub fn generate(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Uniform::new(0, 10))
            .take(OTP_LENGTH)
            .map(|d| d.to_string())
            .collect()
    }

    /// Hash a code for storage. The salt lives inside the digest.
    pub fn hash(&self, code: &str) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(code, self.hash_cost)
    }

    /// Check a submitted code against a stored digest. A digest that
    /// fails to decode counts as a mismatch, not an error.
    pub fn verify(&self, code: &str, digest: &str) -> bool {
        bcrypt::verify(code, digest).unwrap_or(false)
    }

    /// Expiry instant for a code issued at `now`.
    pub fn expiry_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::minutes(self.ttl_minutes)
    }

    /// Strictly past the recorded expiry counts as expired; the exact
    /// boundary instant is still acceptable.
    pub fn is_expired(&self, expires_at: DateTime<Utc>) -> bool {
        Utc::now() > expires_at
    }
}
