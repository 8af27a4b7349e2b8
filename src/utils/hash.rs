use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use crate::error::AppError;

/// Argon2 hash of a user or exam password.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalServerError(e.to_string()))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Checks an exam password gate. Exams without a password always pass.
pub fn check_exam_password(
    password_hash: Option<&str>,
    supplied: Option<&str>,
) -> Result<(), AppError> {
    let Some(hash) = password_hash else {
        return Ok(());
    };
    let supplied =
        supplied.ok_or_else(|| AppError::AuthError("Exam password required".to_string()))?;

    if verify_password(supplied, hash)? {
        Ok(())
    } else {
        Err(AppError::AuthError("Incorrect exam password".to_string()))
    }
}
