//! Drawing state: whether a run is active, stopping, or waiting to resume.

use serde::Serialize;

use crate::error::PaintError;

/// What a run was started with; kept so an interrupted run can resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunParams {
    /// Image file name inside the images directory.
    pub image: String,
    pub x: u16,
    pub y: u16,
}

/// Run bookkeeping owned by the agent.
///
/// `running` stays `true` until the run task has actually exited, so a
/// new run can never overlap one that is still winding down.
#[derive(Debug, Default)]
pub struct DrawingState {
    running: bool,
    stop_requested: bool,
    resume_pending: bool,
    last: Option<RunParams>,
}

impl DrawingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    pub fn resume_pending(&self) -> bool {
        self.resume_pending
    }

    pub fn last_params(&self) -> Option<&RunParams> {
        self.last.as_ref()
    }

    /// Mark a new run as started. A fresh run supersedes any pending resume.
    pub fn begin(&mut self, params: RunParams) -> Result<(), PaintError> {
        if self.running {
            return Err(PaintError::RunActive);
        }
        self.running = true;
        self.stop_requested = false;
        self.resume_pending = false;
        self.last = Some(params);
        Ok(())
    }

    /// Operator stop. Also cancels a pending resume.
    pub fn request_stop(&mut self) -> Result<(), PaintError> {
        if !self.running && !self.resume_pending {
            return Err(PaintError::NoRunActive);
        }
        self.resume_pending = false;
        if self.running {
            self.stop_requested = true;
        }
        Ok(())
    }

    /// Involuntary disconnect. Returns `true` if a run was interrupted.
    pub fn interrupt(&mut self) -> bool {
        if !self.running || self.stop_requested {
            return false;
        }
        self.stop_requested = true;
        self.resume_pending = true;
        true
    }

    /// The run task has exited.
    pub fn finished(&mut self) {
        self.running = false;
        self.stop_requested = false;
    }

    /// Claim the pending resume, if the previous run has fully exited.
    ///
    /// The flag is cleared whether or not the restart then succeeds.
    pub fn take_resume(&mut self) -> Option<RunParams> {
        if !self.resume_pending || self.running {
            return None;
        }
        self.resume_pending = false;
        self.last.clone()
    }
}
