//! Human-facing document numbers such as `DEV20251234` or `FA202512345`.

use rand::Rng;

use crate::error::{AppError, Result};

/// Attempts made before giving up on finding a free number
const MAX_ATTEMPTS: usize = 100;

/// Kinds of numbered documents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberedDocument {
    QuoteRequest,
    Quote,
    Invoice,
    Deposit,
}

impl NumberedDocument {
    pub fn prefix(&self) -> &'static str {
        match self {
            NumberedDocument::QuoteRequest => "DEV",
            NumberedDocument::Quote => "OR",
            NumberedDocument::Invoice => "FA",
            NumberedDocument::Deposit => "AC",
        }
    }

    /// Width of the random suffix
    fn digits(&self) -> u32 {
        match self {
            NumberedDocument::QuoteRequest => 4,
            _ => 5,
        }
    }
}

/// Draw a candidate number: prefix, year, then a random suffix with no leading zero.
pub fn generate(kind: NumberedDocument, year: i32) -> String {
    let low = 10u32.pow(kind.digits() - 1);
    let high = 10u32.pow(kind.digits());
    let suffix = rand::thread_rng().gen_range(low..high);
    format!("{}{}{}", kind.prefix(), year, suffix)
}

/// Draw numbers until `exists` reports a free one.
///
/// # Errors
/// `Conflict` when every attempt collided.
pub fn generate_unique<F>(kind: NumberedDocument, year: i32, mut exists: F) -> Result<String>
where
    F: FnMut(&str) -> bool,
{
    for _ in 0..MAX_ATTEMPTS {
        let candidate = generate(kind, year);
        if !exists(&candidate) {
            return Ok(candidate);
        }
    }
    Err(AppError::Conflict(format!(
        "no free {} number for {} after {} attempts",
        kind.prefix(),
        year,
        MAX_ATTEMPTS
    )))
}
