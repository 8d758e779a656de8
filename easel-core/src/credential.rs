//! Credentials and the round-robin credential pool.
//!
//! A credential is a `(uid, token)` pair. Tokens are 16 raw bytes written
//! as UUID-style hex. The pool hands credentials out in load order,
//! cycling through the first `active_count` entries only.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use uuid::Uuid;

use crate::error::PaintError;

/// Largest uid that fits in the 3-byte wire field.
pub const MAX_UID: u32 = (1 << 24) - 1;

// ── Token ────────────────────────────────────────────────────────

/// A 16-byte paint token.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token([u8; 16]);

impl Token {
    pub const LEN: usize = 16;

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl FromStr for Token {
    type Err = PaintError;

    /// Parse 32 hex digits; dashes anywhere are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.replace('-', "");
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(&digits, &mut bytes)
            .map_err(|e| PaintError::InvalidToken(format!("{s}: {e}")))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Token {
    /// Hyphenated 8-4-4-4-12 form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Uuid::from_bytes(self.0).hyphenated(), f)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({self})")
    }
}

// ── Credential ───────────────────────────────────────────────────

/// One subject's authorization to submit a paint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credential {
    pub uid: u32,
    pub token: Token,
}

impl Credential {
    pub fn new(uid: u32, token: Token) -> Result<Self, PaintError> {
        if uid > MAX_UID {
            return Err(PaintError::InvalidRecord(format!("uid {uid} exceeds 3 bytes")));
        }
        Ok(Self { uid, token })
    }

    /// Parse one `["<token>", uid]` record line.
    ///
    /// The uid may be a JSON number or a numeric string.
    pub fn parse_record(line: &str) -> Result<Self, PaintError> {
        let (token, uid): (String, serde_json::Value) = serde_json::from_str(line)
            .map_err(|e| PaintError::InvalidRecord(format!("{line}: {e}")))?;
        let uid = match &uid {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        }
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| PaintError::InvalidRecord(format!("bad uid in {line}")))?;
        Self::new(uid, token.parse()?)
    }

    /// Serialize as a record line (without the trailing newline).
    pub fn to_record(&self) -> String {
        serde_json::json!([self.token.to_string(), self.uid]).to_string()
    }
}

/// Operator-facing view of a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialInfo {
    pub uid: u32,
    pub token: String,
}

impl From<&Credential> for CredentialInfo {
    fn from(c: &Credential) -> Self {
        Self {
            uid: c.uid,
            token: c.token.to_string(),
        }
    }
}

/// Result of parsing a credentials file.
#[derive(Debug, Default)]
pub struct ParsedRecords {
    pub credentials: Vec<Credential>,
    /// Non-blank lines that could not be parsed.
    pub skipped: usize,
}

/// Parse newline-delimited credential records, skipping bad lines.
pub fn parse_records(text: &str) -> ParsedRecords {
    let mut parsed = ParsedRecords::default();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match Credential::parse_record(line) {
            Ok(c) => parsed.credentials.push(c),
            Err(_) => parsed.skipped += 1,
        }
    }
    parsed
}

// ── CredentialPool ───────────────────────────────────────────────

/// Ordered credentials with a round-robin cursor over an active window.
#[derive(Debug, Default)]
pub struct CredentialPool {
    entries: Vec<Credential>,
    /// Size of the window `next()` cycles through. `0` until loaded.
    active: usize,
    cursor: usize,
}

impl CredentialPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pool contents.
    ///
    /// An unset window (or one larger than the new pool) is widened to the
    /// full pool; a previously chosen smaller window is kept.
    pub fn load(&mut self, credentials: Vec<Credential>) {
        self.entries = credentials;
        if self.active == 0 || self.active > self.entries.len() {
            self.active = self.entries.len();
        }
        if self.cursor >= self.active {
            self.cursor = 0;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    /// Resize the active window. Must lie in `[1, len]`.
    pub fn set_active_count(&mut self, count: usize) -> Result<(), PaintError> {
        if count == 0 || count > self.entries.len() {
            return Err(PaintError::InvalidTunable {
                name: "active_count",
                value: format!("{count} (pool has {})", self.entries.len()),
            });
        }
        self.active = count;
        Ok(())
    }

    /// The next credential in the window, wrapping to the first.
    pub fn next(&mut self) -> Option<Credential> {
        if self.active == 0 {
            return None;
        }
        if self.cursor >= self.active {
            self.cursor = 0;
        }
        let credential = self.entries[self.cursor];
        self.cursor += 1;
        Some(credential)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.entries.iter()
    }
}
