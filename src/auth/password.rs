/// Password Hashing and Verification
///
/// bcrypt digests with a configured cost. Verification distinguishes a wrong
/// password (`Ok(false)`) from a digest that cannot be read (`CorruptDigest`).

use bcrypt::{hash, verify};

use crate::error::{AppError, AuthError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

/// Hash a password for storage
///
/// # Errors
/// Returns error if:
/// - Password fails strength validation
/// - Bcrypt hashing fails (invalid cost)
pub fn hash_password(password: &str, cost: u32) -> Result<Vec<u8>, AppError> {
    validate_password_strength(password)?;

    hash(password, cost)
        .map(String::into_bytes)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored digest
///
/// bcrypt always runs the full work factor and compares in constant time,
/// so the cost does not depend on where a mismatch occurs.
///
/// # Errors
/// `CorruptDigest` if `digest` is not a well-formed bcrypt digest.
pub fn verify_password(password: &str, digest: &[u8]) -> Result<bool, AuthError> {
    let digest = std::str::from_utf8(digest).map_err(|_| AuthError::CorruptDigest)?;

    verify(password, digest).map_err(|e| {
        tracing::error!(error = %e, "Stored password digest could not be read");
        AuthError::CorruptDigest
    })
}

/// Validate password strength requirements
///
/// Requirements:
/// - 8 to 128 characters
/// - At least one digit, one lowercase and one uppercase letter
fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort("password", MIN_PASSWORD_LENGTH));
    }

    // bcrypt only reads the first 72 bytes
    if length > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong("password", MAX_PASSWORD_LENGTH));
    }

    let has_digit = password.chars().any(|c| c.is_numeric());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());

    if !has_digit || !has_lowercase || !has_uppercase {
        return Err(ValidationError::WeakPassword);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Lowest cost bcrypt accepts; keeps the tests fast.
    const TEST_COST: u32 = 4;

    #[test]
    fn test_hash_password() {
        let password = "ValidPassword123";
        let digest = hash_password(password, TEST_COST).expect("Failed to hash password");

        assert_ne!(password.as_bytes(), digest.as_slice());
        assert!(digest.starts_with(b"$2"));
    }

    #[test]
    fn test_verify_password() {
        let digest = hash_password("ValidPassword123", TEST_COST).unwrap();

        let is_valid = verify_password("ValidPassword123", &digest).expect("Failed to verify password");
        assert!(is_valid);
    }

    #[test]
    fn test_verify_wrong_password_is_not_an_error() {
        let digest = hash_password("ValidPassword123", TEST_COST).unwrap();

        let long = "x".repeat(500);
        for attempt in ["WrongPassword123", "", "V", long.as_str()] {
            assert_eq!(verify_password(attempt, &digest), Ok(false));
        }
    }

    #[test]
    fn test_verify_empty_password_against_its_own_digest() {
        // strength rules only apply on registration, so hash directly
        let digest = bcrypt::hash("", TEST_COST).unwrap();
        assert_eq!(verify_password("", digest.as_bytes()), Ok(true));
    }

    #[test]
    fn test_corrupt_digest() {
        let corrupt: [&[u8]; 4] = [b"", b"not-a-digest", b"$2b$99$abc", &[0xff, 0xfe, 0x00]];
        for digest in corrupt {
            assert_eq!(
                verify_password("ValidPassword123", digest),
                Err(AuthError::CorruptDigest)
            );
        }
    }

    #[test]
    fn test_too_short_password() {
        assert!(hash_password("Short1", TEST_COST).is_err());
    }

    #[test]
    fn test_too_long_password() {
        let long_password = "a".repeat(MAX_PASSWORD_LENGTH + 1) + "A1";
        assert!(hash_password(&long_password, TEST_COST).is_err());
    }

    #[test]
    fn test_weak_passwords() {
        for password in ["NoDigitsPassword", "NOLOWERCASE1", "nouppercase1"] {
            assert!(matches!(
                hash_password(password, TEST_COST),
                Err(AppError::Validation(ValidationError::WeakPassword))
            ));
        }
    }
}
