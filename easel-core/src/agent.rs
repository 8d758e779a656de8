//! The agent actor and its control handle.
//!
//! One task owns every piece of shared state: the connection and its
//! state machine, the drawing state, the credential pool, the ack
//! registry and the send pump (through [`Painter`]). Everything else
//! talks to it through channels:
//!
//! ```text
//!  AgentHandle ──Control──►┐
//!  RepairRun ───RunEvent──►├──► Agent ──► Painter ──► SendPump ──► Connection
//!  Connection ─SocketEvent►┘      │
//!                                 └──► Report / EventLog broadcast
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::board::BoardSource;
use crate::canvas::{Defense, Placement};
use crate::codec::{self, handshake_confirm};
use crate::credential::{CredentialInfo, CredentialPool, parse_records};
use crate::error::PaintError;
use crate::governor::DEFAULT_REPORT_INTERVAL;
use crate::network::{Connection, Connector, SocketEvent};
use crate::pacer::DEFAULT_PACING_PAUSE;
use crate::painter::{FrameEffect, Painter};
use crate::pump::DEFAULT_FLUSH_HZ;
use crate::repair::{DEFAULT_CORRECTION_ROUNDS, RepairRun, RunContext, RunEvent};
use crate::report::{EventLog, Report, report_channel};
use crate::state::{ConnectionState, DrawingState, RunParams};
use crate::target::{self, TargetLoader};
use crate::tuning::{Tunables, check_pacing_divisor, check_threshold};

/// Default warning level for queued plus unwritten bytes.
pub const DEFAULT_BUFFER_HIGH_WATER: usize = 4 * 1024 * 1024;

const CONTROL_CAPACITY: usize = 64;
const RUN_EVENT_CAPACITY: usize = 1024;

// ── Options ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Newline-delimited credential records.
    pub tokens_file: PathBuf,
    /// Where target images are looked up by name.
    pub images_dir: PathBuf,
    pub tunables: Tunables,
    pub flush_interval: Duration,
    pub report_interval: Duration,
    /// Correction rounds per logged cycle.
    pub correction_rounds: u32,
    pub buffer_high_water: usize,
    pub pacing_pause: Duration,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            tokens_file: PathBuf::from("./tokens.txt"),
            images_dir: PathBuf::from("./uploads/"),
            tunables: Tunables::default(),
            flush_interval: Duration::from_secs(1) / DEFAULT_FLUSH_HZ,
            report_interval: DEFAULT_REPORT_INTERVAL,
            correction_rounds: DEFAULT_CORRECTION_ROUNDS,
            buffer_high_water: DEFAULT_BUFFER_HIGH_WATER,
            pacing_pause: DEFAULT_PACING_PAUSE,
        }
    }
}

// ── Status ───────────────────────────────────────────────────────

/// Snapshot of the agent for the operator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub connection: String,
    pub live_for_secs: Option<u64>,
    pub running: bool,
    pub stop_requested: bool,
    pub resume_pending: bool,
    pub last_run: Option<RunParams>,
    pub credentials: usize,
    pub active_count: usize,
    pub pending_acks: usize,
    pub buffered_bytes: usize,
    pub defense_armed: bool,
}

// ── Control ──────────────────────────────────────────────────────

type Reply<T> = oneshot::Sender<Result<T, PaintError>>;

enum Control {
    StartRun(RunParams, Reply<()>),
    StopRun(Reply<()>),
    Status(oneshot::Sender<AgentStatus>),
    Tunables(oneshot::Sender<Tunables>),
    SetActiveCount(usize, Reply<()>),
    SetThreshold(f64, Reply<()>),
    SetPacingDivisor(u32, Reply<()>),
    ReloadCredentials(Reply<Vec<CredentialInfo>>),
    ListImages(Reply<Vec<String>>),
    Shutdown,
}

/// Cloneable control surface of a running agent.
#[derive(Clone)]
pub struct AgentHandle {
    tx: mpsc::Sender<Control>,
    reports: broadcast::Sender<Report>,
    log: EventLog,
}

impl AgentHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Control,
    ) -> Result<T, PaintError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).await?;
        Ok(rx.await?)
    }

    /// Start painting `image` (a name inside the images directory) with
    /// its top-left corner at `(x, y)`.
    pub async fn start_run(
        &self,
        image: impl Into<String>,
        x: u16,
        y: u16,
    ) -> Result<(), PaintError> {
        let params = RunParams {
            image: image.into(),
            x,
            y,
        };
        self.request(|reply| Control::StartRun(params, reply)).await?
    }

    /// Stop the active run, or cancel a pending resume.
    pub async fn stop_run(&self) -> Result<(), PaintError> {
        self.request(Control::StopRun).await?
    }

    pub async fn status(&self) -> Result<AgentStatus, PaintError> {
        self.request(Control::Status).await
    }

    pub async fn tunables(&self) -> Result<Tunables, PaintError> {
        self.request(Control::Tunables).await
    }

    pub async fn set_active_count(&self, count: usize) -> Result<(), PaintError> {
        self.request(|reply| Control::SetActiveCount(count, reply)).await?
    }

    pub async fn set_threshold(&self, threshold: f64) -> Result<(), PaintError> {
        self.request(|reply| Control::SetThreshold(threshold, reply)).await?
    }

    pub async fn set_pacing_divisor(&self, divisor: u32) -> Result<(), PaintError> {
        self.request(|reply| Control::SetPacingDivisor(divisor, reply)).await?
    }

    /// Re-read the tokens file and return the loaded credentials.
    pub async fn reload_credentials(&self) -> Result<Vec<CredentialInfo>, PaintError> {
        self.request(Control::ReloadCredentials).await?
    }

    pub async fn list_images(&self) -> Result<Vec<String>, PaintError> {
        self.request(Control::ListImages).await?
    }

    pub fn subscribe_reports(&self) -> broadcast::Receiver<Report> {
        self.reports.subscribe()
    }

    pub fn subscribe_log(&self) -> broadcast::Receiver<String> {
        self.log.subscribe()
    }

    /// Ask the agent to stop. Returns once the request is queued.
    pub async fn shutdown(&self) -> Result<(), PaintError> {
        self.tx.send(Control::Shutdown).await?;
        Ok(())
    }
}

// ── Agent ────────────────────────────────────────────────────────

pub struct Agent {
    connector: Arc<dyn Connector>,
    board: Arc<dyn BoardSource>,
    loader: Arc<dyn TargetLoader>,
    options: AgentOptions,

    state: ConnectionState,
    connection: Option<Connection>,
    connect_tx: mpsc::Sender<Result<Connection, PaintError>>,
    connect_rx: mpsc::Receiver<Result<Connection, PaintError>>,
    // Failed attempts since the last successful connect
    connect_failures: u32,

    drawing: DrawingState,
    painter: Painter,
    tunables: watch::Sender<Tunables>,

    // Id of the newest run; events from older runs are dropped
    current_run: u64,
    cancel: Option<CancellationToken>,
    run_tx: mpsc::Sender<RunEvent>,
    run_rx: mpsc::Receiver<RunEvent>,

    control_rx: mpsc::Receiver<Control>,
    reports: broadcast::Sender<Report>,
    log: EventLog,
}

impl Agent {
    pub fn new(
        connector: Arc<dyn Connector>,
        board: Arc<dyn BoardSource>,
        loader: Arc<dyn TargetLoader>,
        options: AgentOptions,
    ) -> (Self, AgentHandle) {
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CAPACITY);
        let (run_tx, run_rx) = mpsc::channel(RUN_EVENT_CAPACITY);
        let (connect_tx, connect_rx) = mpsc::channel(1);
        let reports = report_channel();
        let log = EventLog::new();

        let mut painter = Painter::new(CredentialPool::new());
        painter.set_threshold(options.tunables.threshold);
        let (tunables, _) = watch::channel(options.tunables);

        let handle = AgentHandle {
            tx: control_tx,
            reports: reports.clone(),
            log: log.clone(),
        };
        let agent = Self {
            connector,
            board,
            loader,
            options,
            state: ConnectionState::default(),
            connection: None,
            connect_tx,
            connect_rx,
            connect_failures: 0,
            drawing: DrawingState::new(),
            painter,
            tunables,
            current_run: 0,
            cancel: None,
            run_tx,
            run_rx,
            control_rx,
            reports,
            log,
        };
        (agent, handle)
    }

    /// Build the agent and run it on a new task.
    pub fn spawn(
        connector: Arc<dyn Connector>,
        board: Arc<dyn BoardSource>,
        loader: Arc<dyn TargetLoader>,
        options: AgentOptions,
    ) -> (AgentHandle, JoinHandle<()>) {
        let (agent, handle) = Self::new(connector, board, loader, options);
        (handle, tokio::spawn(agent.run()))
    }

    /// The actor loop. Returns after [`AgentHandle::shutdown`] or once
    /// every handle is dropped.
    pub async fn run(mut self) {
        if let Err(e) = self.load_credentials() {
            self.log.warn(format!(
                "no credentials loaded from {}: {e}",
                self.options.tokens_file.display()
            ));
        }

        let mut flush = tokio::time::interval(self.options.flush_interval);
        flush.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let period = self.options.report_interval;
        let mut report = tokio::time::interval_at(Instant::now() + period, period);
        report.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.connect();

        loop {
            tokio::select! {
                Some(result) = self.connect_rx.recv() => self.on_connect(result),
                event = next_socket_event(&mut self.connection) => self.on_socket_event(event),
                _ = flush.tick() => self.flush(),
                _ = report.tick() => self.publish_rates(),
                Some(event) = self.run_rx.recv() => self.on_run_event(event),
                control = self.control_rx.recv() => match control {
                    Some(Control::Shutdown) | None => break,
                    Some(control) => self.on_control(control),
                },
            }
        }

        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.connection = None;
        self.state.force_disconnect();
        self.log.info("agent shut down");
    }

    // ── Connection ───────────────────────────────────────────────

    fn connect(&mut self) {
        if let Err(e) = self.state.begin_connect() {
            tracing::debug!("{e}, forcing a fresh connect");
            self.state.force_disconnect();
            let _ = self.state.begin_connect();
        }
        tracing::debug!("connecting");
        let connector = Arc::clone(&self.connector);
        let tx = self.connect_tx.clone();
        tokio::spawn(async move {
            let result = connector.connect().await;
            let _ = tx.send(result).await;
        });
    }

    fn on_connect(&mut self, result: Result<Connection, PaintError>) {
        match result {
            Ok(connection) => {
                self.connect_failures = 0;
                if let Err(e) = self.state.socket_opened() {
                    tracing::debug!("{e}");
                }
                self.connection = Some(connection);
                self.log.info("connected, awaiting handshake");
            }
            Err(e) => {
                // First failure of a streak at warn, repeats at debug
                if self.connect_failures == 0 {
                    self.log.warn(format!("connect failed: {e}"));
                } else {
                    tracing::debug!(attempt = self.connect_failures + 1, "connect failed: {e}");
                }
                self.connect_failures = self.connect_failures.saturating_add(1);
                let _ = self.state.connection_lost();
                self.connect();
            }
        }
    }

    fn on_socket_event(&mut self, event: Option<SocketEvent>) {
        match event {
            Some(SocketEvent::Message(data)) => self.on_delivery(&data),
            Some(SocketEvent::Closed(reason)) => self.on_close(&reason),
            None => self.on_close("socket tasks ended"),
        }
    }

    fn on_delivery(&mut self, data: &[u8]) {
        for frame in codec::frames(data) {
            match frame {
                Ok(frame) => match self.painter.on_frame(frame) {
                    FrameEffect::Nothing => {}
                    FrameEffect::Handshake => self.on_handshake(),
                    FrameEffect::InvalidCredential(credential) => {
                        self.log.warn(PaintError::from(credential).to_string())
                    }
                },
                Err(e) => self.log.warn(format!("protocol error: {e}")),
            }
        }
    }

    fn on_handshake(&mut self) {
        let Some(connection) = &self.connection else {
            return;
        };
        if let Err(e) = connection.send(handshake_confirm()) {
            tracing::debug!("handshake confirm not sent: {e}");
            return;
        }
        match self.state.complete_handshake() {
            Ok(()) => {
                self.log.info("handshake complete, live");
                self.try_resume();
            }
            Err(e) => tracing::debug!("duplicate handshake: {e}"),
        }
    }

    fn on_close(&mut self, reason: &str) {
        self.connection = None;
        self.log.warn(format!("disconnected: {reason}"));
        if self.state.connection_lost().is_err() {
            self.state.force_disconnect();
        }
        if self.drawing.interrupt() {
            self.log.info("run interrupted, resuming after reconnect");
            if let Some(cancel) = &self.cancel {
                cancel.cancel();
            }
        }
        self.painter.disarm();
        self.connect();
    }

    fn flush(&mut self) {
        if !self.state.is_live() {
            return;
        }
        let Some(connection) = &self.connection else {
            return;
        };
        if let Some(frame) = self.painter.take_frame() {
            if let Err(e) = connection.send(frame) {
                tracing::debug!("flush dropped: {e}");
            }
        }
    }

    fn publish_rates(&mut self) {
        let in_flight = self
            .connection
            .as_ref()
            .map_or(0, Connection::buffered_amount);
        let rates = self
            .painter
            .drain_rates(self.options.report_interval, in_flight);
        if rates.buffer_bytes > self.options.buffer_high_water {
            self.log.warn(format!(
                "send buffer at {} bytes, above {}",
                rates.buffer_bytes, self.options.buffer_high_water
            ));
        }
        let _ = self.reports.send(Report::Rates(rates));
    }

    // ── Runs ─────────────────────────────────────────────────────

    fn on_run_event(&mut self, event: RunEvent) {
        match event {
            RunEvent::Paint { run, x, y, color } => {
                if run == self.current_run
                    && self.drawing.is_running()
                    && !self.drawing.stop_requested()
                {
                    self.painter.paint(x, y, color);
                }
            }
            RunEvent::Progress {
                run,
                phase,
                total,
                position,
            } => {
                if run == self.current_run {
                    let _ = self.reports.send(Report::Progress {
                        phase,
                        total,
                        position,
                    });
                }
            }
            RunEvent::Finished { run, outcome } => {
                if run != self.current_run {
                    return;
                }
                tracing::debug!(run, ?outcome, "run finished");
                self.drawing.finished();
                self.cancel = None;
                self.painter.disarm();
                self.log.info("run stopped");
                self.try_resume();
            }
        }
    }

    fn try_resume(&mut self) {
        if !self.state.is_live() {
            return;
        }
        let Some(params) = self.drawing.take_resume() else {
            return;
        };
        self.log.info(format!(
            "resuming {} at ({}, {})",
            params.image, params.x, params.y
        ));
        if let Err(e) = self.start_run(params) {
            self.log.warn(format!("resume failed: {e}"));
        }
    }

    fn start_run(&mut self, params: RunParams) -> Result<(), PaintError> {
        if !self.state.is_live() {
            return Err(PaintError::NotLive);
        }
        if self.drawing.is_running() {
            return Err(PaintError::RunActive);
        }
        if self.painter.pool().is_empty() {
            return Err(PaintError::NoCredentials);
        }
        let path = target::resolve_image(&self.options.images_dir, &params.image)?;
        let image = Arc::new(self.loader.load(&path)?);
        let placement = Placement::of(&image, params.x, params.y);

        self.drawing.begin(params.clone())?;
        self.current_run += 1;
        let cancel = CancellationToken::new();
        self.painter.arm(Defense::new(Arc::clone(&image), placement));
        let run = RepairRun::new(
            self.current_run,
            image,
            placement,
            self.run_context(),
            cancel.clone(),
        );
        self.cancel = Some(cancel);
        tokio::spawn(run.run());

        self.log.info(format!(
            "run started: {} ({}x{}) at ({}, {})",
            params.image, placement.width, placement.height, params.x, params.y
        ));
        Ok(())
    }

    fn stop_run(&mut self) -> Result<(), PaintError> {
        self.drawing.request_stop()?;
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
        self.painter.disarm();
        self.log.info("stop requested");
        Ok(())
    }

    fn run_context(&self) -> RunContext {
        RunContext {
            board: Arc::clone(&self.board),
            tunables: self.tunables.subscribe(),
            events: self.run_tx.clone(),
            log: self.log.clone(),
            pacing_pause: self.options.pacing_pause,
            correction_rounds: self.options.correction_rounds,
        }
    }

    // ── Control ──────────────────────────────────────────────────

    fn on_control(&mut self, control: Control) {
        match control {
            Control::StartRun(params, reply) => {
                let _ = reply.send(self.start_run(params));
            }
            Control::StopRun(reply) => {
                let _ = reply.send(self.stop_run());
            }
            Control::Status(reply) => {
                let _ = reply.send(self.status());
            }
            Control::Tunables(reply) => {
                let _ = reply.send(self.current_tunables());
            }
            Control::SetActiveCount(count, reply) => {
                let result = self.painter.pool_mut().set_active_count(count);
                if result.is_ok() {
                    self.tunables.send_modify(|t| t.active_count = count);
                    self.log.info(format!("active credentials: {count}"));
                }
                let _ = reply.send(result);
            }
            Control::SetThreshold(value, reply) => {
                let result = check_threshold(value).map(|value| {
                    self.painter.set_threshold(value);
                    self.tunables.send_modify(|t| t.threshold = value);
                    self.log.info(format!("similarity threshold: {value}"));
                });
                let _ = reply.send(result);
            }
            Control::SetPacingDivisor(value, reply) => {
                let result = check_pacing_divisor(value).map(|value| {
                    self.tunables.send_modify(|t| t.pacing_divisor = value);
                    self.log.info(format!("pacing divisor: {value}"));
                });
                let _ = reply.send(result);
            }
            Control::ReloadCredentials(reply) => {
                let result = self.load_credentials().map(|()| {
                    self.painter
                        .pool()
                        .iter()
                        .map(CredentialInfo::from)
                        .collect()
                });
                let _ = reply.send(result);
            }
            Control::ListImages(reply) => {
                let _ = reply.send(target::list_images(&self.options.images_dir));
            }
            // Handled by the loop
            Control::Shutdown => {}
        }
    }

    fn current_tunables(&self) -> Tunables {
        Tunables {
            active_count: self.painter.pool().active_count(),
            ..*self.tunables.borrow()
        }
    }

    fn status(&self) -> AgentStatus {
        let in_flight = self
            .connection
            .as_ref()
            .map_or(0, Connection::buffered_amount);
        AgentStatus {
            connection: self.state.to_string(),
            live_for_secs: self.state.live_duration().map(|d| d.as_secs()),
            running: self.drawing.is_running(),
            stop_requested: self.drawing.stop_requested(),
            resume_pending: self.drawing.resume_pending(),
            last_run: self.drawing.last_params().cloned(),
            credentials: self.painter.pool().len(),
            active_count: self.painter.pool().active_count(),
            pending_acks: self.painter.pending_acks(),
            buffered_bytes: self.painter.pump_depth() + in_flight,
            defense_armed: self.painter.is_armed(),
        }
    }

    /// Read the tokens file into the pool. A configured active count is
    /// applied when it fits the new pool.
    fn load_credentials(&mut self) -> Result<(), PaintError> {
        let text = std::fs::read_to_string(&self.options.tokens_file)?;
        let parsed = parse_records(&text);
        if parsed.skipped > 0 {
            self.log.warn(format!("skipped {} invalid credential records", parsed.skipped));
        }
        let pool = self.painter.pool_mut();
        pool.load(parsed.credentials);
        let wanted = self.tunables.borrow().active_count;
        if wanted > 0 && wanted <= pool.len() {
            pool.set_active_count(wanted)?;
        }
        let (len, active) = (pool.len(), pool.active_count());
        self.log.info(format!("loaded {len} credentials, {active} active"));
        Ok(())
    }
}

/// Next event of the current socket; pending forever when there is none.
async fn next_socket_event(connection: &mut Option<Connection>) -> Option<SocketEvent> {
    match connection {
        Some(connection) => connection.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_flush_at_fifty_hz() {
        let options = AgentOptions::default();
        assert_eq!(options.flush_interval, Duration::from_millis(20));
        assert_eq!(options.report_interval, Duration::from_secs(3));
        assert_eq!(options.correction_rounds, 20);
    }
}
