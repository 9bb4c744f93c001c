//! Initial password generation and `userPassword` hashing.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{distributions::Alphanumeric, Rng};
use sha1::{Digest, Sha1};

/// Length of generated initial passwords.
pub const INITIAL_PASSWORD_LENGTH: usize = 8;

/// Random alphanumeric password for a freshly created account.
#[must_use]
pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INITIAL_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// Hashes a password in the directory's `{SHA}` scheme: base64 of the SHA-1 digest.
#[must_use]
pub fn hash_password(password: &str) -> String {
    let digest = Sha1::digest(password.as_bytes());
    format!("{{SHA}}{}", STANDARD.encode(digest))
}
