//! Send pump: coalesces encoded paints into one outbound frame per tick.
//!
//! Requests are appended as they are issued; the agent's flush timer
//! takes the whole buffer at once. There is no coupling to socket
//! backpressure, the depth is only reported.

use bytes::{Bytes, BytesMut};

use crate::codec::{PAINT_FRAME_LEN, PaintRequest};

/// Default flush rate.
pub const DEFAULT_FLUSH_HZ: u32 = 50;

#[derive(Debug, Default)]
pub struct SendPump {
    buffer: BytesMut,
}

impl SendPump {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(PAINT_FRAME_LEN * 256),
        }
    }

    /// Queue one request.
    pub fn push(&mut self, request: &PaintRequest) {
        request.encode(&mut self.buffer);
    }

    /// Take everything queued so far as one frame, leaving the pump empty.
    ///
    /// Returns `None` when nothing is queued.
    pub fn take_frame(&mut self) -> Option<Bytes> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(self.buffer.split().freeze())
    }

    /// Bytes waiting for the next flush.
    pub fn depth(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
