//! Pure input validation functions
//!
//! No state and no side effects; parse failures are reported as "invalid",
//! never propagated as errors.

use rust_decimal::Decimal;
use validator::ValidateEmail;

/// Validate an email address and return its normalized form.
///
/// Normalization trims surrounding whitespace and lowercases the domain
/// part; the local part is preserved as given. Returns `None` for anything
/// that fails syntax checking (missing `@`, empty string, bad domain).
pub fn validate_email(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    if !trimmed.validate_email() {
        return None;
    }
    // validate_email guarantees exactly the local@domain shape here
    let at = trimmed.rfind('@')?;
    let (local, domain) = trimmed.split_at(at);
    Some(format!("{local}{}", domain.to_lowercase()))
}

/// Whether `candidate` parses as a valid international (E.164) number.
///
/// Numbers must carry their country prefix (e.g. `+14155552671`); parse
/// errors count as invalid.
pub fn validate_phone(candidate: &str) -> bool {
    match phonenumber::parse(None, candidate) {
        Ok(number) => phonenumber::is_valid(&number),
        Err(_) => false,
    }
}

/// Whether `amount` is strictly greater than zero.
pub fn validate_amount(amount: Decimal) -> bool {
    amount > Decimal::ZERO
}
