//! Binary wire format.
//!
//! Every frame is a 1-byte opcode followed by a fixed-size payload. All
//! multi-byte integers are little-endian.
//!
//! ## Client → server
//! ```text
//! paint (0xfe), 30 byte payload:
//!   x: u16, y: u16, r: u8, g: u8, b: u8,
//!   uid: u24, token: [u8; 16], request_id: u32
//! handshake-confirm (0xfb), no payload
//! ```
//!
//! ## Server → client
//! ```text
//! pixel-broadcast (0xfa): x: u16, y: u16, r: u8, g: u8, b: u8
//! handshake-push  (0xfc): no payload
//! submission-ack  (0xff): request_id: u32, code: u8
//! ```
//!
//! Several frames may be concatenated in one delivery. An unknown opcode
//! ends decoding of that delivery; there is no resynchronization.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::canvas::Rgb;
use crate::credential::Token;
use crate::error::PaintError;

// ── Opcodes ──────────────────────────────────────────────────────

pub const OP_PIXEL_BROADCAST: u8 = 0xfa;
pub const OP_HANDSHAKE_CONFIRM: u8 = 0xfb;
pub const OP_HANDSHAKE_PUSH: u8 = 0xfc;
pub const OP_PAINT: u8 = 0xfe;
pub const OP_SUBMISSION_ACK: u8 = 0xff;

/// Ack result: the pixel was painted.
pub const ACK_SUCCESS: u8 = 0xef;
/// Ack result: the token was rejected.
pub const ACK_INVALID_TOKEN: u8 = 0xed;

/// Correlation ids live in `[0, REQUEST_ID_SPACE)`.
pub const REQUEST_ID_SPACE: u32 = 1 << 20;

/// Encoded size of one paint frame, opcode included.
pub const PAINT_FRAME_LEN: usize = 1 + 2 + 2 + 3 + 3 + Token::LEN + 4;

const BROADCAST_PAYLOAD: usize = 7;
const ACK_PAYLOAD: usize = 5;

/// The fixed 1-byte handshake reply.
pub fn handshake_confirm() -> Bytes {
    Bytes::from_static(&[OP_HANDSHAKE_CONFIRM])
}

// ── PaintRequest ─────────────────────────────────────────────────

/// One pixel assignment submitted under one credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaintRequest {
    pub x: u16,
    pub y: u16,
    pub color: Rgb,
    pub uid: u32,
    pub token: Token,
    pub request_id: u32,
}

impl PaintRequest {
    /// Append the encoded frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(PAINT_FRAME_LEN);
        dst.put_u8(OP_PAINT);
        dst.put_u16_le(self.x);
        dst.put_u16_le(self.y);
        dst.put_u8(self.color.r);
        dst.put_u8(self.color.g);
        dst.put_u8(self.color.b);
        dst.put_uint_le(self.uid as u64, 3);
        dst.put_slice(self.token.as_bytes());
        dst.put_u32_le(self.request_id);
    }

    /// Decode one paint frame, opcode included.
    pub fn decode(mut src: &[u8]) -> Result<Self, PaintError> {
        if src.len() < PAINT_FRAME_LEN {
            return Err(PaintError::Truncated {
                opcode: src.first().copied().unwrap_or(OP_PAINT),
                needed: PAINT_FRAME_LEN,
                available: src.len(),
            });
        }
        let opcode = src.get_u8();
        if opcode != OP_PAINT {
            return Err(PaintError::UnknownOpcode {
                opcode,
                discarded: src.len(),
            });
        }
        let x = src.get_u16_le();
        let y = src.get_u16_le();
        let color = Rgb::new(src.get_u8(), src.get_u8(), src.get_u8());
        let uid = src.get_uint_le(3) as u32;
        let mut token = [0u8; Token::LEN];
        src.copy_to_slice(&mut token);
        let request_id = src.get_u32_le();
        Ok(Self {
            x,
            y,
            color,
            uid,
            token: Token::from_bytes(token),
            request_id,
        })
    }
}

// ── InboundFrame ─────────────────────────────────────────────────

/// A decoded server → client frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundFrame {
    /// Some actor changed a pixel.
    PixelBroadcast { x: u16, y: u16, color: Rgb },
    /// The server is ready; answer with [`handshake_confirm`].
    HandshakePush,
    /// Result of one of our paints.
    SubmissionAck { request_id: u32, code: u8 },
}

impl InboundFrame {
    /// Append the encoded frame to `dst`. Used by test peers.
    pub fn encode(&self, dst: &mut BytesMut) {
        match *self {
            InboundFrame::PixelBroadcast { x, y, color } => {
                dst.put_u8(OP_PIXEL_BROADCAST);
                dst.put_u16_le(x);
                dst.put_u16_le(y);
                dst.put_slice(&[color.r, color.g, color.b]);
            }
            InboundFrame::HandshakePush => dst.put_u8(OP_HANDSHAKE_PUSH),
            InboundFrame::SubmissionAck { request_id, code } => {
                dst.put_u8(OP_SUBMISSION_ACK);
                dst.put_u32_le(request_id);
                dst.put_u8(code);
            }
        }
    }
}

/// Iterator over the frames of one inbound delivery.
///
/// Yields `Err` at most once, for the first unknown or truncated frame,
/// then stops: the rest of the delivery is discarded.
pub struct Frames<'a> {
    src: &'a [u8],
    done: bool,
}

/// Decode every frame in `src`.
pub fn frames(src: &[u8]) -> Frames<'_> {
    Frames { src, done: false }
}

impl Frames<'_> {
    fn fail(&mut self, err: PaintError) -> Option<Result<InboundFrame, PaintError>> {
        self.done = true;
        Some(Err(err))
    }

    fn need(&mut self, opcode: u8, needed: usize) -> Result<(), PaintError> {
        if self.src.remaining() < needed {
            return Err(PaintError::Truncated {
                opcode,
                needed,
                available: self.src.remaining(),
            });
        }
        Ok(())
    }
}

impl Iterator for Frames<'_> {
    type Item = Result<InboundFrame, PaintError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || !self.src.has_remaining() {
            return None;
        }
        let opcode = self.src.get_u8();
        let frame = match opcode {
            OP_PIXEL_BROADCAST => {
                if let Err(e) = self.need(opcode, BROADCAST_PAYLOAD) {
                    return self.fail(e);
                }
                let x = self.src.get_u16_le();
                let y = self.src.get_u16_le();
                let color = Rgb::new(self.src.get_u8(), self.src.get_u8(), self.src.get_u8());
                InboundFrame::PixelBroadcast { x, y, color }
            }
            OP_HANDSHAKE_PUSH => InboundFrame::HandshakePush,
            OP_SUBMISSION_ACK => {
                if let Err(e) = self.need(opcode, ACK_PAYLOAD) {
                    return self.fail(e);
                }
                let request_id = self.src.get_u32_le();
                let code = self.src.get_u8();
                InboundFrame::SubmissionAck { request_id, code }
            }
            _ => {
                let discarded = self.src.remaining();
                return self.fail(PaintError::UnknownOpcode { opcode, discarded });
            }
        };
        Some(Ok(frame))
    }
}
