use argon2::{
    Argon2,
    password_hash::{
        self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);

    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Malformed stored hashes fail verification instead of panicking.
pub fn verify_password(password: &str, hashed: &str) -> Result<(), password_hash::Error> {
    let parsed = PasswordHash::new(hashed)?;
    Argon2::default().verify_password(password.as_bytes(), &parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("correct horse").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(verify_password("wrong horse", &hash).is_err());
    }

    #[test]
    fn same_password_gets_different_salts() {
        let a = hash_password("pw123456").unwrap();
        let b = hash_password("pw123456").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }
}
