//! Field validation for QSO form input.
//!
//! All checks are pure predicates: bad input yields `false`, never an error.
//!
//! # Callsign Grammar
//!
//! After trimming and upper-casing, a callsign must match:
//! ```text
//! [A-Z0-9]{1,3} [0-9] [A-Z0-9]{0,3} [A-Z]
//! ```
//! That is a one to three character prefix, a digit, up to three more
//! characters, and a trailing letter. Examples: `W1AW`, `2E0ABC`, `VK4KC`.

/// Lowest accepted frequency in MHz.
pub const MIN_FREQUENCY_MHZ: f64 = 0.1;

/// Highest accepted frequency in MHz.
pub const MAX_FREQUENCY_MHZ: f64 = 300_000.0;

/// Lowest accepted two-digit signal report.
pub const MIN_REPORT: u32 = 11;

/// Highest accepted two-digit signal report.
pub const MAX_REPORT: u32 = 59;

/// Check whether `text` is a well-formed amateur radio callsign.
///
/// # Example
///
/// ```
/// use qso_relay::validate::validate_callsign;
///
/// assert!(validate_callsign("W1AW"));
/// assert!(validate_callsign(" w1aw "));
/// assert!(!validate_callsign("HELLO"));
/// ```
pub fn validate_callsign(text: &str) -> bool {
    let call = text.trim().to_uppercase();
    let bytes = call.as_bytes();
    let len = bytes.len();

    // Shortest match is X9X, longest XXX9XXXX.
    if !(3..=8).contains(&len) {
        return false;
    }
    if !bytes
        .iter()
        .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    {
        return false;
    }
    if !bytes[len - 1].is_ascii_uppercase() {
        return false;
    }

    // The separating digit sits after 1-3 prefix chars and leaves 0-3 chars
    // before the trailing letter.
    let first = len.saturating_sub(5).max(1);
    let last = (len - 2).min(3);
    (first..=last).any(|i| bytes[i].is_ascii_digit())
}

/// Check whether `text` is a frequency in MHz within the amateur spectrum.
pub fn validate_frequency(text: &str) -> bool {
    match text.trim().parse::<f64>() {
        Ok(mhz) => (MIN_FREQUENCY_MHZ..=MAX_FREQUENCY_MHZ).contains(&mhz),
        Err(_) => false,
    }
}

/// Check whether `text` is a two-digit signal report between 11 and 59.
pub fn validate_report(text: &str) -> bool {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    text.parse::<u32>()
        .map(|value| (MIN_REPORT..=MAX_REPORT).contains(&value))
        .unwrap_or(false)
}
