use ecoride_core::repository::BookingRepository;
use ecoride_core::{CoreError, CoreResult};
use rand::Rng;

/// Unambiguous characters only (no 0/O, 1/I/L).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
pub const CODE_LENGTH: usize = 8;
const MAX_ATTEMPTS: usize = 5;

pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Normalizes user-typed codes before lookup.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Generates a code that no existing booking carries.
pub async fn issue_unique_code(bookings: &dyn BookingRepository) -> CoreResult<String> {
    for _ in 0..MAX_ATTEMPTS {
        let code = generate_code();
        if bookings.get_by_validation_code(&code).await?.is_none() {
            return Ok(code);
        }
        tracing::warn!("Validation code collision, retrying");
    }
    tracing::error!("No free validation code after {} attempts", MAX_ATTEMPTS);
    Err(CoreError::Storage("could not generate a unique validation code".into()))
}
