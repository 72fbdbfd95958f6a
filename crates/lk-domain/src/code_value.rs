//! Wire format of the strings printed inside student QR codes.
//!
//! | Format | Example |
//! |--------|---------|
//! | current | `LKSTUDENT_q8Jf0V1l2bYwz3aR7xKc9Q` |
//! | legacy | `STUDENT:<student uuid>:<student name>:<event uuid>` |
//!
//! Scanned payloads may also be a family portal URL (`…/f/<token>`) or a
//! bare token; [`CodeValue::from_scanned`] accepts all four.

use std::fmt;
use std::str::FromStr;

use crate::id::{EventId, StudentId};

/// Prefix of the current code-value format.
pub const STUDENT_PREFIX: &str = "LKSTUDENT_";

/// Prefix of the legacy format that embeds the student directly.
pub const LEGACY_PREFIX: &str = "STUDENT:";

/// Path segment that precedes the token in a portal URL.
pub const PORTAL_PATH: &str = "/f/";

/// Shortest accepted token (16 random bytes, base64url without padding).
pub const MIN_TOKEN_LEN: usize = 22;

/// Longest accepted token.
pub const MAX_TOKEN_LEN: usize = 128;

/// Errors produced when parsing a code value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeValueError {
    #[error("empty code value")]
    Empty,
    #[error("unrecognized code value format")]
    UnknownFormat,
    #[error("invalid token")]
    InvalidToken,
    #[error("malformed legacy code: {0}")]
    MalformedLegacy(&'static str),
}

/// A parsed code value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeValue {
    /// `LKSTUDENT_<token>`: resolved through the token store.
    Student { token: String },
    /// Legacy payload carrying the student identity in clear.
    Legacy {
        student_id: StudentId,
        student_name: String,
        event_id: EventId,
    },
}

impl CodeValue {
    /// Build the current-format code value for a token.
    pub fn student(token: impl Into<String>) -> Self {
        Self::Student {
            token: token.into(),
        }
    }

    /// Token carried by the code, if it is token-based.
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Student { token } => Some(token),
            Self::Legacy { .. } => None,
        }
    }

    /// `"student_identification"` for current codes, `"legacy_student"` otherwise.
    pub fn qr_type(&self) -> &'static str {
        match self {
            Self::Student { .. } => "student_identification",
            Self::Legacy { .. } => "legacy_student",
        }
    }

    /// Interpret any string read off a QR sticker.
    ///
    /// Tries, in order: the code-value formats, a portal URL, a bare token.
    pub fn from_scanned(raw: &str) -> Result<Self, CodeValueError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CodeValueError::Empty);
        }
        match raw.parse::<Self>() {
            Err(CodeValueError::UnknownFormat) => {}
            other => return other,
        }
        if let Some(token) = token_from_portal_url(raw) {
            return Ok(Self::student(token));
        }
        if is_token_shaped(raw) {
            return Ok(Self::student(raw));
        }
        Err(CodeValueError::UnknownFormat)
    }
}

impl fmt::Display for CodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Student { token } => write!(f, "{STUDENT_PREFIX}{token}"),
            Self::Legacy {
                student_id,
                student_name,
                event_id,
            } => write!(f, "{LEGACY_PREFIX}{student_id}:{student_name}:{event_id}"),
        }
    }
}

impl FromStr for CodeValue {
    type Err = CodeValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CodeValueError::Empty);
        }
        if let Some(token) = s.strip_prefix(STUDENT_PREFIX) {
            if !is_token_shaped(token) {
                return Err(CodeValueError::InvalidToken);
            }
            return Ok(Self::student(token));
        }
        if let Some(rest) = s.strip_prefix(LEGACY_PREFIX) {
            return parse_legacy(rest);
        }
        Err(CodeValueError::UnknownFormat)
    }
}

// Student names may themselves contain ':', so the id is taken from the
// front and the event id from the back.
fn parse_legacy(rest: &str) -> Result<CodeValue, CodeValueError> {
    let (id_part, tail) = rest
        .split_once(':')
        .ok_or(CodeValueError::MalformedLegacy("missing student name"))?;
    let (name_part, event_part) = tail
        .rsplit_once(':')
        .ok_or(CodeValueError::MalformedLegacy("missing event id"))?;

    let student_id = id_part
        .parse::<StudentId>()
        .map_err(|_| CodeValueError::MalformedLegacy("invalid student id"))?;
    let event_id = event_part
        .parse::<EventId>()
        .map_err(|_| CodeValueError::MalformedLegacy("invalid event id"))?;
    let student_name = name_part.trim();
    if student_name.is_empty() {
        return Err(CodeValueError::MalformedLegacy("empty student name"));
    }

    Ok(CodeValue::Legacy {
        student_id,
        student_name: student_name.to_owned(),
        event_id,
    })
}

/// `true` when `s` looks like an access token: base64url alphabet, bounded length.
pub fn is_token_shaped(s: &str) -> bool {
    (MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&s.len())
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Family portal URL for a token.
pub fn portal_url(base_url: &str, token: &str) -> String {
    format!("{}{PORTAL_PATH}{token}", base_url.trim_end_matches('/'))
}

/// Extract the token from a portal URL, ignoring any query string or fragment.
pub fn token_from_portal_url(url: &str) -> Option<&str> {
    let (_, after) = url.rsplit_once(PORTAL_PATH)?;
    let end = after.find(['/', '?', '#']).unwrap_or(after.len());
    let token = &after[..end];
    is_token_shaped(token).then_some(token)
}
