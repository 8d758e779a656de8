//! Ack registry: correlates submission acks with the paints that caused them.
//!
//! Ids come from a cyclic counter over `[0, REQUEST_ID_SPACE)`. When the
//! counter wraps, a still-pending entry with the same id is silently
//! replaced; that stale paint simply never resolves.

use std::collections::HashMap;

use crate::codec::{ACK_INVALID_TOKEN, ACK_SUCCESS, REQUEST_ID_SPACE};
use crate::credential::Credential;

// ── RequestIds ───────────────────────────────────────────────────

/// Cyclic correlation id allocator.
#[derive(Debug, Default)]
pub struct RequestIds {
    next: u32,
}

impl RequestIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting at `first` (mod the id space).
    #[cfg(test)]
    pub(crate) fn starting_at(first: u32) -> Self {
        Self {
            next: first % REQUEST_ID_SPACE,
        }
    }

    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next = (self.next + 1) % REQUEST_ID_SPACE;
        id
    }
}

// ── AckOutcome ───────────────────────────────────────────────────

/// What resolving an ack means for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The pixel was colored.
    Colored,
    /// The server rejected the credential used for this request.
    InvalidCredential(Credential),
    /// Some other result code; nothing to do.
    Ignored(u8),
    /// No pending request has this id.
    Unknown,
}

// ── AckRegistry ──────────────────────────────────────────────────

/// In-flight paints keyed by correlation id.
#[derive(Debug, Default)]
pub struct AckRegistry {
    ids: RequestIds,
    pending: HashMap<u32, Credential>,
}

impl AckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id for a paint issued under `credential`.
    pub fn register(&mut self, credential: Credential) -> u32 {
        let id = self.ids.next_id();
        self.pending.insert(id, credential);
        id
    }

    /// Resolve the paint with id `request_id`. The entry is removed.
    pub fn resolve(&mut self, request_id: u32, code: u8) -> AckOutcome {
        let Some(credential) = self.pending.remove(&request_id) else {
            return AckOutcome::Unknown;
        };
        match code {
            ACK_SUCCESS => AckOutcome::Colored,
            ACK_INVALID_TOKEN => AckOutcome::InvalidCredential(credential),
            other => AckOutcome::Ignored(other),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, request_id: u32) -> bool {
        self.pending.contains_key(&request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::Token;

    fn cred(uid: u32) -> Credential {
        Credential::new(uid, Token::from_bytes([uid as u8; 16])).unwrap()
    }

    #[test]
    fn register_and_resolve_success() {
        let mut acks = AckRegistry::new();
        let id = acks.register(cred(1));
        assert!(acks.is_pending(id));

        assert_eq!(acks.resolve(id, ACK_SUCCESS), AckOutcome::Colored);
        assert!(!acks.is_pending(id));
        // Second ack for the same id is a no-op.
        assert_eq!(acks.resolve(id, ACK_SUCCESS), AckOutcome::Unknown);
    }

    #[test]
    fn unregistered_id_is_unknown() {
        let mut acks = AckRegistry::new();
        assert_eq!(acks.resolve(12345, ACK_SUCCESS), AckOutcome::Unknown);
        assert_eq!(acks.pending_count(), 0);
    }

    #[test]
    fn invalid_token_returns_credential() {
        let mut acks = AckRegistry::new();
        let id = acks.register(cred(9));
        assert_eq!(
            acks.resolve(id, ACK_INVALID_TOKEN),
            AckOutcome::InvalidCredential(cred(9))
        );
    }

    #[test]
    fn other_codes_are_ignored_but_removed() {
        let mut acks = AckRegistry::new();
        let id = acks.register(cred(1));
        assert_eq!(acks.resolve(id, 0xee), AckOutcome::Ignored(0xee));
        assert_eq!(acks.pending_count(), 0);
    }

    #[test]
    fn ids_wrap_around() {
        let mut ids = RequestIds::starting_at(REQUEST_ID_SPACE - 2);
        assert_eq!(ids.next_id(), REQUEST_ID_SPACE - 2);
        assert_eq!(ids.next_id(), REQUEST_ID_SPACE - 1);
        assert_eq!(ids.next_id(), 0);
    }

    #[test]
    fn wraparound_overwrites_stale_entry() {
        let mut acks = AckRegistry::new();
        let first = acks.register(cred(1));
        for _ in 1..REQUEST_ID_SPACE {
            let id = acks.register(cred(2));
            acks.resolve(id, ACK_SUCCESS);
        }
        let reused = acks.register(cred(3));
        assert_eq!(reused, first);
        assert_eq!(acks.pending_count(), 1);
        assert_eq!(
            acks.resolve(reused, ACK_INVALID_TOKEN),
            AckOutcome::InvalidCredential(cred(3))
        );
    }
}
