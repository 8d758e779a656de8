//! Repair engine: keeps one placed target painted.
//!
//! A run is a spawned task. It never touches the pool, the pump or the
//! socket itself; it sends [`RunEvent::Paint`] orders to the agent
//! actor, which issues them. That keeps all shared state on one task.
//!
//! ```text
//!   cold fill ──► correction round 1 ──► round 2 ──► ... (forever)
//!       │               │
//!       └───────────────┴──► cancelled? ──► Finished
//! ```

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::board::BoardSource;
use crate::canvas::{BoardSnapshot, Placement, Rgb, TargetImage};
use crate::pacer::Pacer;
use crate::report::{EventLog, RunPhase};
use crate::tuning::Tunables;

/// Default number of correction rounds per logged cycle.
pub const DEFAULT_CORRECTION_ROUNDS: u32 = 20;

/// Pause before the next round after a failed board fetch.
const FETCH_RETRY_PAUSE: Duration = Duration::from_secs(1);

// ── Events ───────────────────────────────────────────────────────

/// Messages from a run task to the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// Paint `(x, y)` in board coordinates.
    Paint { run: u64, x: u16, y: u16, color: Rgb },
    /// Queue progress for the reporting channel.
    Progress {
        run: u64,
        phase: RunPhase,
        total: usize,
        position: usize,
    },
    /// The task has exited. Always the last event of a run.
    Finished { run: u64, outcome: RunOutcome },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Cancellation was observed.
    Stopped,
    /// The agent stopped listening.
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop(RunOutcome),
}

// ── RunContext ───────────────────────────────────────────────────

/// Everything a run borrows from the agent.
#[derive(Clone)]
pub struct RunContext {
    pub board: Arc<dyn BoardSource>,
    pub tunables: watch::Receiver<Tunables>,
    pub events: mpsc::Sender<RunEvent>,
    pub log: EventLog,
    pub pacing_pause: Duration,
    pub correction_rounds: u32,
}

// ── RepairRun ────────────────────────────────────────────────────

pub struct RepairRun {
    id: u64,
    target: Arc<TargetImage>,
    placement: Placement,
    ctx: RunContext,
    cancel: CancellationToken,
    pacer: Pacer,
    rng: StdRng,
}

impl RepairRun {
    pub fn new(
        id: u64,
        target: Arc<TargetImage>,
        placement: Placement,
        ctx: RunContext,
        cancel: CancellationToken,
    ) -> Self {
        let pacer = Pacer::new(ctx.pacing_pause);
        Self {
            id,
            target,
            placement,
            ctx,
            cancel,
            pacer,
            rng: StdRng::from_entropy(),
        }
    }

    /// Drive the run until cancelled, then report [`RunEvent::Finished`].
    pub async fn run(mut self) -> RunOutcome {
        let outcome = self.drive().await;
        tracing::debug!(run = self.id, ?outcome, "repair run exiting");
        let _ = self
            .ctx
            .events
            .send(RunEvent::Finished {
                run: self.id,
                outcome,
            })
            .await;
        outcome
    }

    async fn drive(&mut self) -> RunOutcome {
        if let Flow::Stop(outcome) = self.cold_fill().await {
            return outcome;
        }
        let rounds = self.ctx.correction_rounds.max(1) as u64;
        let mut round = 0u64;
        loop {
            round += 1;
            if let Flow::Stop(outcome) = self.correction_round(round).await {
                return outcome;
            }
            if round % rounds == 0 {
                self.ctx.log.info(format!("{round} correction rounds done, continuing"));
            }
        }
    }

    /// Every on-board target pixel once, in random order.
    async fn cold_fill(&mut self) -> Flow {
        if self.cancel.is_cancelled() {
            return Flow::Stop(RunOutcome::Stopped);
        }
        let mut queue: Vec<(u16, u16)> = self.placement.local_cells().collect();
        queue.shuffle(&mut self.rng);
        self.ctx.log.info(format!("cold fill: {} pixels", queue.len()));
        self.drain(RunPhase::ColdFill, &queue).await
    }

    async fn correction_round(&mut self, round: u64) -> Flow {
        if self.cancel.is_cancelled() {
            return Flow::Stop(RunOutcome::Stopped);
        }
        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => return Flow::Stop(RunOutcome::Stopped),
            fetched = self.ctx.board.fetch() => fetched,
        };
        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.ctx.log.warn(format!("board fetch failed in round {round}: {e}"));
                return tokio::select! {
                    _ = self.cancel.cancelled() => Flow::Stop(RunOutcome::Stopped),
                    _ = tokio::time::sleep(FETCH_RETRY_PAUSE) => Flow::Continue,
                };
            }
        };
        let threshold = self.ctx.tunables.borrow().threshold;
        let mut queue = mismatches(&self.target, self.placement, &snapshot, threshold);
        queue.shuffle(&mut self.rng);
        self.drain(RunPhase::Correction(round), &queue).await
    }

    async fn drain(&mut self, phase: RunPhase, queue: &[(u16, u16)]) -> Flow {
        let total = queue.len();
        if total > 0 {
            if let Flow::Stop(o) = self.progress(phase, total, 0).await {
                return Flow::Stop(o);
            }
        }
        for (i, &(lx, ly)) in queue.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Flow::Stop(RunOutcome::Stopped);
            }
            let Some((x, y)) = self.placement.to_board(lx, ly) else {
                continue;
            };
            let color = self.target.pixel(lx, ly);
            let paint = RunEvent::Paint {
                run: self.id,
                x,
                y,
                color,
            };
            if let Flow::Stop(o) = self.emit(paint).await {
                return Flow::Stop(o);
            }
            let divisor = self.ctx.tunables.borrow().pacing_divisor;
            if self.pacer.step(divisor).await {
                if let Flow::Stop(o) = self.progress(phase, total, i + 1).await {
                    return Flow::Stop(o);
                }
            }
        }
        self.progress(phase, total, total).await
    }

    async fn progress(&mut self, phase: RunPhase, total: usize, position: usize) -> Flow {
        self.emit(RunEvent::Progress {
            run: self.id,
            phase,
            total,
            position,
        })
        .await
    }

    async fn emit(&mut self, event: RunEvent) -> Flow {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Flow::Stop(RunOutcome::Stopped),
            sent = self.ctx.events.send(event) => match sent {
                Ok(()) => Flow::Continue,
                Err(_) => Flow::Stop(RunOutcome::Detached),
            },
        }
    }
}

/// Local cells of the placed target whose live color is off by more
/// than `threshold`, row-major.
pub fn mismatches(
    target: &TargetImage,
    placement: Placement,
    snapshot: &BoardSnapshot,
    threshold: f64,
) -> Vec<(u16, u16)> {
    placement
        .local_cells()
        .filter(|&(lx, ly)| match placement.to_board(lx, ly) {
            Some((bx, by)) => !target.pixel(lx, ly).matches(snapshot.get(bx, by), threshold),
            None => false,
        })
        .collect()
}
