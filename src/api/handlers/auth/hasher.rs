//! One-way hashing of the admin PIN.
//!
//! Argon2id with fixed parameters. Output is a PHC string, so the algorithm,
//! version and cost are embedded in every stored hash and older hashes keep
//! verifying after the cost is raised.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use tracing::error;

const MEMORY_COST_KIB: u32 = 19 * 1024;
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;

#[derive(Clone, Debug)]
pub struct CredentialHasher {
    params: Params,
}

impl CredentialHasher {
    /// # Errors
    /// Returns an error if the Argon2 parameters are rejected.
    pub fn new() -> Result<Self, argon2::Error> {
        let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a PIN with a fresh random salt.
    ///
    /// # Errors
    /// Returns an error only if the hashing primitive fails internally.
    pub fn hash(&self, pin: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(pin.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    }

    /// Check a PIN against a stored PHC hash.
    ///
    /// The comparison happens inside the Argon2 verifier. A stored hash that
    /// cannot be parsed never matches.
    #[must_use]
    pub fn verify(&self, pin: &str, hashed: &str) -> bool {
        let parsed = match PasswordHash::new(hashed) {
            Ok(parsed) => parsed,
            Err(err) => {
                error!("Stored credential hash is malformed: {err}");
                return false;
            }
        };

        // Parameters come from the PHC string, not from `self.params`.
        match Argon2::default().verify_password(pin.as_bytes(), &parsed) {
            Ok(()) => true,
            Err(argon2::password_hash::Error::Password) => false,
            Err(err) => {
                error!("Credential verification failed: {err}");
                false
            }
        }
    }
}
