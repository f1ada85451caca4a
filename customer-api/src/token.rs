use std::error::Error;
use std::fmt::Display;

/// Validate a caller-supplied API token against the configured one.

#[derive(Debug, PartialEq)]
pub enum InvalidTokenReason {
    IsEmpty,
    IsTooLong,
    IsNotAscii,
    /// Well-formed, but not the token this deployment was configured with.
    IsUnknown,
}

impl InvalidTokenReason {
    pub fn reason(&self) -> &str {
        match *self {
            Self::IsEmpty => "empty",
            Self::IsTooLong => "too_long",
            Self::IsNotAscii => "not_ascii",
            Self::IsUnknown => "unknown",
        }
    }
}

impl Display for InvalidTokenReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

impl Error for InvalidTokenReason {
    fn description(&self) -> &str {
        self.reason()
    }
}

/// Reject tokens that cannot possibly match before comparing, so obviously
/// malformed credentials get a distinct reason in the logs.
pub fn validate_token(token: &str, expected: &str) -> Result<(), InvalidTokenReason> {
    if token.is_empty() {
        return Err(InvalidTokenReason::IsEmpty);
    }

    if token.len() > 128 {
        return Err(InvalidTokenReason::IsTooLong);
    }

    if !token.is_ascii() {
        return Err(InvalidTokenReason::IsNotAscii);
    }

    if token != expected {
        return Err(InvalidTokenReason::IsUnknown);
    }

    Ok(())
}
