use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Newtype for password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Credential Store capability: one-way hashing of user secrets.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &Password) -> Result<String, anyhow::Error>;

    /// `false` on mismatch; an unparseable hash is an error.
    fn verify(&self, password: &Password, hash: &str) -> Result<bool, anyhow::Error>;
}

/// Argon2id with default parameters and a random salt per hash.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &Password) -> Result<String, anyhow::Error> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = Argon2::default()
            .hash_password(password.as_str().as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();

        Ok(password_hash)
    }

    fn verify(&self, password: &Password, hash: &str) -> Result<bool, anyhow::Error> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

        match Argon2::default().verify_password(password.as_str().as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_argon2_and_salted() {
        let password = Password::new("mySecurePassword123");
        let hash1 = Argon2Hasher.hash(&password).expect("Failed to hash password");
        let hash2 = Argon2Hasher.hash(&password).expect("Failed to hash password");

        assert!(hash1.starts_with("$argon2"));
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify() {
        let password = Password::new("mySecurePassword123");
        let hash = Argon2Hasher.hash(&password).unwrap();

        assert!(Argon2Hasher.verify(&password, &hash).unwrap());
        assert!(!Argon2Hasher
            .verify(&Password::new("wrongPassword"), &hash)
            .unwrap());
    }

    #[test]
    fn test_malformed_hash_is_error() {
        let password = Password::new("mySecurePassword123");
        assert!(Argon2Hasher.verify(&password, "not-a-phc-string").is_err());
    }

    #[test]
    fn test_debug_redacts() {
        let password = Password::new("hunter22hunter22");
        assert_eq!(format!("{:?}", password), "Password(***)");
    }
}
