//! Salted password credentials (PBKDF2-HMAC-SHA256, 32-byte output).
//!
//! Stored form: `pbkdf2-sha256$<iterations>$<salt_hex>$<hash_hex>`.
//! Hashing is CPU-bound; async callers go through `spawn_blocking`.

use rand::RngCore;
use sha2::{Digest, Sha256};

const SCHEME: &str = "pbkdf2-sha256";
pub const DEFAULT_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;

pub fn hash_with_iterations(password: &str, iterations: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let derived = derive(password.as_bytes(), &salt, iterations);
    format!(
        "{SCHEME}${iterations}${}${}",
        hex::encode(salt),
        hex::encode(derived)
    )
}

/// Returns false for a wrong password and for any stored value it cannot parse.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut fields = stored.split('$');
    let (Some(SCHEME), Some(iterations), Some(salt), Some(expected), None) = (
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
    ) else {
        return false;
    };
    let (Ok(iterations), Ok(salt), Ok(expected)) = (
        iterations.parse::<u32>(),
        hex::decode(salt),
        hex::decode(expected),
    ) else {
        return false;
    };
    if iterations == 0 {
        return false;
    }

    let derived = derive(password.as_bytes(), &salt, iterations);
    constant_time_eq(&derived, &expected)
}

fn derive(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    out
}

/// Short digest of a stored credential. Changes whenever the password does,
/// so tokens that embed it die with the old password.
pub fn password_fingerprint(stored: &str) -> String {
    let digest = Sha256::digest(stored.as_bytes());
    hex::encode(&digest[..16])
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
