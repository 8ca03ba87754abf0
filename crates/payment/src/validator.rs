//! Pure payment-request validation. No I/O.

use thiserror::Error;

/// Card fields supplied by the caller for a card payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardDetails {
    pub card_number: String,
    /// Expiry in `MM/YY` form.
    pub expiry: String,
    pub cvv: String,
}

impl CardDetails {
    /// Returns the card number with all whitespace stripped.
    pub fn normalized_number(&self) -> String {
        self.card_number
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect()
    }
}

/// A payment attempt as requested by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentRequest {
    /// Cash on delivery. Carries no details and always validates.
    Cash,
    /// Card charge with the details to validate and send to the gateway.
    Card(CardDetails),
}

/// The single user-facing validation failure category. Which field failed
/// is deliberately not leaked beyond logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid card details")]
pub struct InvalidCardDetails;

/// Validates a payment request.
///
/// Cash requests always pass. Card requests must carry:
/// - a card number that, after stripping whitespace, is 13 to 19 ASCII
///   digits starting with `4` (VISA) or `5` (Mastercard); a prefix check
///   only, no Luhn;
/// - an expiry matching `MM/YY` with a real month (expired dates are not
///   rejected);
/// - a three-digit CVV.
pub fn validate(request: &PaymentRequest) -> Result<(), InvalidCardDetails> {
    match request {
        PaymentRequest::Cash => Ok(()),
        PaymentRequest::Card(card) => validate_card(card),
    }
}

/// Validates card fields directly. Same rules as [`validate`].
pub fn validate_card(card: &CardDetails) -> Result<(), InvalidCardDetails> {
    let number = card.normalized_number();
    if !(13..=19).contains(&number.len()) || !number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InvalidCardDetails);
    }
    if !number.starts_with('4') && !number.starts_with('5') {
        return Err(InvalidCardDetails);
    }

    if !is_valid_expiry(&card.expiry) {
        return Err(InvalidCardDetails);
    }

    if card.cvv.len() != 3 || !card.cvv.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InvalidCardDetails);
    }

    Ok(())
}

/// `MM/YY`: month 01-12, two-digit year, nothing else.
fn is_valid_expiry(expiry: &str) -> bool {
    let bytes = expiry.as_bytes();
    if bytes.len() != 5 || bytes[2] != b'/' {
        return false;
    }
    if !bytes[0].is_ascii_digit()
        || !bytes[1].is_ascii_digit()
        || !bytes[3].is_ascii_digit()
        || !bytes[4].is_ascii_digit()
    {
        return false;
    }
    let month = (bytes[0] - b'0') * 10 + (bytes[1] - b'0');
    (1..=12).contains(&month)
}
