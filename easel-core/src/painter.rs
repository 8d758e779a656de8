//! The synchronous painting core owned by the agent actor.
//!
//! Every paint, whether it comes from a repair run or from the defense
//! path, goes through [`Painter::paint`]: draw a credential, allocate a
//! correlation id, append the encoded request to the send pump. Inbound
//! frames are handled by [`Painter::on_frame`], which is O(1) per frame.

use std::time::Duration;

use bytes::Bytes;

use crate::ack::{AckOutcome, AckRegistry};
use crate::canvas::{Defense, Rgb};
use crate::codec::{InboundFrame, PaintRequest};
use crate::credential::{Credential, CredentialPool};
use crate::governor::{RateCounters, RateReport};
use crate::pump::SendPump;
use crate::tuning::DEFAULT_THRESHOLD;

/// What the agent has to do after a frame was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEffect {
    Nothing,
    /// The server pushed its handshake; confirm it.
    Handshake,
    /// A paint was rejected because its token is invalid.
    InvalidCredential(Credential),
}

#[derive(Debug)]
pub struct Painter {
    pool: CredentialPool,
    acks: AckRegistry,
    pump: SendPump,
    counters: RateCounters,
    defense: Option<Defense>,
    threshold: f64,
}

impl Painter {
    pub fn new(pool: CredentialPool) -> Self {
        Self {
            pool,
            acks: AckRegistry::new(),
            pump: SendPump::new(),
            counters: RateCounters::default(),
            defense: None,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut CredentialPool {
        &mut self.pool
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    // ── Paints ───────────────────────────────────────────────────

    /// Queue one paint. Returns its correlation id, or `None` if the
    /// pool is empty.
    pub fn paint(&mut self, x: u16, y: u16, color: Rgb) -> Option<u32> {
        let credential = self.pool.next()?;
        let request_id = self.acks.register(credential);
        self.pump.push(&PaintRequest {
            x,
            y,
            color,
            uid: credential.uid,
            token: credential.token,
            request_id,
        });
        self.counters.attempted += 1;
        Some(request_id)
    }

    /// Take the coalesced frame for this flush tick.
    pub fn take_frame(&mut self) -> Option<Bytes> {
        self.pump.take_frame()
    }

    /// Bytes queued in the pump.
    pub fn pump_depth(&self) -> usize {
        self.pump.depth()
    }

    pub fn pending_acks(&self) -> usize {
        self.acks.pending_count()
    }

    // ── Defense ──────────────────────────────────────────────────

    pub fn arm(&mut self, defense: Defense) {
        self.defense = Some(defense);
    }

    pub fn disarm(&mut self) {
        self.defense = None;
    }

    pub fn is_armed(&self) -> bool {
        self.defense.is_some()
    }

    // ── Inbound ──────────────────────────────────────────────────

    pub fn on_frame(&mut self, frame: InboundFrame) -> FrameEffect {
        match frame {
            InboundFrame::PixelBroadcast { x, y, color } => {
                let wanted = self
                    .defense
                    .as_ref()
                    .and_then(|d| d.correction(x, y, color, self.threshold));
                if let Some(wanted) = wanted {
                    if self.paint(x, y, wanted).is_some() {
                        self.counters.defended += 1;
                    }
                }
                FrameEffect::Nothing
            }
            InboundFrame::HandshakePush => FrameEffect::Handshake,
            InboundFrame::SubmissionAck { request_id, code } => {
                self.counters.acked += 1;
                match self.acks.resolve(request_id, code) {
                    AckOutcome::Colored => {
                        self.counters.colored += 1;
                        FrameEffect::Nothing
                    }
                    AckOutcome::InvalidCredential(credential) => {
                        FrameEffect::InvalidCredential(credential)
                    }
                    AckOutcome::Ignored(_) | AckOutcome::Unknown => FrameEffect::Nothing,
                }
            }
        }
    }

    /// Close the reporting window. `in_flight` is added to the pump depth.
    pub fn drain_rates(&mut self, window: Duration, in_flight: usize) -> RateReport {
        self.counters.drain(window, self.pump.depth() + in_flight)
    }

    pub fn counters(&self) -> RateCounters {
        self.counters
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::canvas::{Placement, TargetImage};
    use crate::codec::{ACK_INVALID_TOKEN, ACK_SUCCESS, PAINT_FRAME_LEN};
    use crate::credential::Token;

    fn cred(uid: u32) -> Credential {
        Credential::new(uid, Token::from_bytes([uid as u8; 16])).unwrap()
    }

    fn painter(n: u32) -> Painter {
        let mut pool = CredentialPool::new();
        pool.load((0..n).map(cred).collect());
        Painter::new(pool)
    }

    fn decode_all(frame: &[u8]) -> Vec<PaintRequest> {
        frame
            .chunks(PAINT_FRAME_LEN)
            .map(|c| PaintRequest::decode(c).unwrap())
            .collect()
    }

    #[test]
    fn paints_rotate_credentials_and_coalesce() {
        let mut p = painter(2);
        for i in 0..4 {
            assert!(p.paint(i, 0, Rgb::new(1, 2, 3)).is_some());
        }
        assert_eq!(p.counters().attempted, 4);
        assert_eq!(p.pending_acks(), 4);

        let frame = p.take_frame().unwrap();
        let uids: Vec<u32> = decode_all(&frame).iter().map(|r| r.uid).collect();
        assert_eq!(uids, vec![0, 1, 0, 1]);
        assert!(p.take_frame().is_none());
    }

    #[test]
    fn empty_pool_paints_nothing() {
        let mut p = painter(0);
        assert_eq!(p.paint(0, 0, Rgb::new(0, 0, 0)), None);
        assert_eq!(p.pump_depth(), 0);
        assert_eq!(p.counters().attempted, 0);
    }

    #[test]
    fn success_ack_counts_colored_once() {
        let mut p = painter(1);
        let id = p.paint(0, 0, Rgb::new(0, 0, 0)).unwrap();
        let ack = InboundFrame::SubmissionAck {
            request_id: id,
            code: ACK_SUCCESS,
        };
        assert_eq!(p.on_frame(ack), FrameEffect::Nothing);
        assert_eq!(p.on_frame(ack), FrameEffect::Nothing);
        let c = p.counters();
        assert_eq!(c.acked, 2);
        assert_eq!(c.colored, 1);
        assert_eq!(p.pending_acks(), 0);
    }

    #[test]
    fn invalid_token_ack_surfaces_credential() {
        let mut p = painter(3);
        p.paint(0, 0, Rgb::new(0, 0, 0));
        let id = p.paint(0, 0, Rgb::new(0, 0, 0)).unwrap();
        let effect = p.on_frame(InboundFrame::SubmissionAck {
            request_id: id,
            code: ACK_INVALID_TOKEN,
        });
        assert_eq!(effect, FrameEffect::InvalidCredential(cred(1)));
    }

    #[test]
    fn defense_repaints_only_inside_placement() {
        let mut p = painter(1);
        let target = Arc::new(TargetImage::solid(2, 2, Rgb::new(255, 0, 0)));
        p.arm(Defense::new(target, Placement::new(10, 10, 2, 2)));

        // Outside the rectangle
        p.on_frame(InboundFrame::PixelBroadcast {
            x: 12,
            y: 10,
            color: Rgb::new(0, 0, 0),
        });
        // Inside, but close enough
        p.on_frame(InboundFrame::PixelBroadcast {
            x: 10,
            y: 10,
            color: Rgb::new(253, 0, 0),
        });
        assert_eq!(p.counters().defended, 0);

        // Inside and wrong
        p.on_frame(InboundFrame::PixelBroadcast {
            x: 11,
            y: 11,
            color: Rgb::new(0, 0, 255),
        });
        assert_eq!(p.counters().defended, 1);
        let sent = decode_all(&p.take_frame().unwrap());
        assert_eq!(sent.len(), 1);
        assert_eq!((sent[0].x, sent[0].y), (11, 11));
        assert_eq!(sent[0].color, Rgb::new(255, 0, 0));

        p.disarm();
        p.on_frame(InboundFrame::PixelBroadcast {
            x: 11,
            y: 11,
            color: Rgb::new(0, 0, 255),
        });
        assert_eq!(p.counters().defended, 1);
    }

    #[test]
    fn handshake_push_is_reported() {
        let mut p = painter(0);
        assert_eq!(p.on_frame(InboundFrame::HandshakePush), FrameEffect::Handshake);
    }

    #[test]
    fn rates_include_in_flight_bytes() {
        let mut p = painter(1);
        p.paint(0, 0, Rgb::new(0, 0, 0));
        let report = p.drain_rates(Duration::from_secs(1), 100);
        assert_eq!(report.buffer_bytes, PAINT_FRAME_LEN + 100);
        assert_eq!(report.paint_rate, 1.0);
        assert_eq!(p.counters(), RateCounters::default());
    }
}
