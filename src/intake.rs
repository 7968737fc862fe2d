//! Pre-check-in intake: turns a single chat line such as `García 78421` into a
//! [`BookingDraft`].
//!
//! The accepted shape is `<name><whitespace><digits>`, anchored at both ends.
//! Parsing is done in two tokens so each boundary can be checked on its own:
//! the trailing digit run first, then the name that precedes it.

use crate::models::BookingDraft;

pub const MIN_BOOKING_DIGITS: usize = 4;

const ACCENTED_LETTERS: &str = "ÁÉÍÓÚÜÑáéíóúüñ";

/// Characters allowed in the name token. Letters outside ASCII and the
/// accented set above are rejected on purpose.
pub fn is_name_char(c: char) -> bool {
    c.is_ascii_alphabetic() || ACCENTED_LETTERS.contains(c) || matches!(c, '\'' | '-' | ' ')
}

/// Splits `text` into the part before its trailing ASCII digit run and the run
/// itself. Returns `None` when the run is shorter than [`MIN_BOOKING_DIGITS`].
pub fn split_booking_number(text: &str) -> Option<(&str, &str)> {
    let head = text.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = &text[head.len()..];
    if digits.len() < MIN_BOOKING_DIGITS {
        return None;
    }
    Some((head, digits))
}

/// Validates the token in front of the booking number. `head` still carries the
/// separator; at least one whitespace character must sit right before the digits.
pub fn extract_last_name(head: &str) -> Option<String> {
    let name = head.trim_end();
    if name.len() == head.len() {
        return None;
    }
    if name.is_empty() || !name.chars().all(is_name_char) {
        return None;
    }

    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

/// Returns `None` for anything that is not a pre-check-in line. Callers ignore
/// those messages instead of replying with an error.
pub fn parse(raw: &str) -> Option<BookingDraft> {
    let text = raw.trim();
    let (head, digits) = split_booking_number(text)?;
    let last_name = extract_last_name(head)?;

    Some(BookingDraft {
        last_name,
        booking_number: digits.to_string(),
    })
}
