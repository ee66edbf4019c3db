//! Refresh scheduler: one task owns the timer, the in-flight fetch and the renderer.
//!
//! The task is driven by three sources, polled in this priority order:
//! - commands from [`SchedulerHandle`] (start/stop/trigger/status/dispose)
//! - completion of the single in-flight fetch
//! - the repeating refresh timer, present only while running

use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::WidgetConfig;
use crate::fetcher::{FetchError, PriceFetcher};
use crate::render::Renderer;
use crate::snapshot::PriceSnapshot;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleTrigger {
    Start,
    Timer,
    Manual,
}

impl CycleTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            CycleTrigger::Start => "start",
            CycleTrigger::Timer => "timer",
            CycleTrigger::Manual => "manual",
        }
    }
}

/// Point-in-time view of the scheduler task's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub state: RefreshState,
    pub fetch_in_flight: bool,
    pub has_rendered: bool,
    pub retry_visible: bool,
    pub cycles_started: u64,
    pub ticks_skipped: u64,
    pub last_rendered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("refresh scheduler has been disposed")]
    Closed,
}

#[derive(Debug)]
enum Command {
    Start,
    Stop,
    TriggerOnce,
    Status(oneshot::Sender<SchedulerStatus>),
    Dispose,
}

/// The timer exists exactly while running.
enum Refresh {
    Idle,
    Running { timer: Interval },
}

type FetchFuture = Pin<Box<dyn Future<Output = Result<PriceSnapshot, FetchError>> + Send>>;

pub struct RefreshScheduler<F, R> {
    fetcher: Arc<F>,
    renderer: R,
    period: Duration,
    refresh: Refresh,
    in_flight: Option<FetchFuture>,
    has_rendered: bool,
    retry_visible: bool,
    cycles_started: u64,
    ticks_skipped: u64,
    last_rendered_at: Option<DateTime<Utc>>,
}

impl<F: PriceFetcher, R: Renderer> RefreshScheduler<F, R> {
    /// A zero period is clamped to one millisecond; `WidgetConfig::validate` rejects it earlier.
    pub fn new(fetcher: F, renderer: R, period: Duration) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            renderer,
            period: period.max(Duration::from_millis(1)),
            refresh: Refresh::Idle,
            in_flight: None,
            has_rendered: false,
            retry_visible: false,
            cycles_started: 0,
            ticks_skipped: 0,
            last_rendered_at: None,
        }
    }

    pub fn from_config(fetcher: F, renderer: R, cfg: &WidgetConfig) -> Self {
        Self::new(fetcher, renderer, cfg.refresh_interval())
    }

    /// Moves the scheduler onto its own task. Must be called inside a tokio runtime.
    pub fn spawn(self) -> (SchedulerHandle, JoinHandle<()>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx));
        (SchedulerHandle { commands }, task)
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        debug!(
            component = "refresh_scheduler",
            event = "scheduler.spawn",
            interval_ms = self.period.as_millis() as u64
        );

        loop {
            tokio::select! {
                biased;
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    if self.handle(command).is_break() {
                        break;
                    }
                }
                outcome = poll_in_flight(&mut self.in_flight) => {
                    self.in_flight = None;
                    self.finish_cycle(outcome);
                }
                _ = next_tick(&mut self.refresh) => self.run_cycle(CycleTrigger::Timer),
            }
        }

        let abandoned_fetch = self.in_flight.take().is_some();
        self.refresh = Refresh::Idle;
        info!(
            component = "refresh_scheduler",
            event = "scheduler.dispose",
            cycles_started = self.cycles_started,
            ticks_skipped = self.ticks_skipped,
            abandoned_fetch
        );
    }

    fn handle(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Start => self.start(),
            Command::Stop => self.stop(),
            Command::TriggerOnce => self.run_cycle(CycleTrigger::Manual),
            Command::Status(reply) => {
                // Caller may have given up waiting.
                let _ = reply.send(self.status());
            }
            Command::Dispose => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn start(&mut self) {
        if matches!(self.refresh, Refresh::Running { .. }) {
            debug!(
                component = "refresh_scheduler",
                event = "scheduler.start.noop"
            );
            return;
        }

        self.run_cycle(CycleTrigger::Start);

        let mut timer = interval_at(Instant::now() + self.period, self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.refresh = Refresh::Running { timer };

        info!(
            component = "refresh_scheduler",
            event = "scheduler.start",
            interval_ms = self.period.as_millis() as u64
        );
    }

    fn stop(&mut self) {
        if matches!(self.refresh, Refresh::Idle) {
            debug!(
                component = "refresh_scheduler",
                event = "scheduler.stop.noop"
            );
            return;
        }

        self.refresh = Refresh::Idle;
        info!(
            component = "refresh_scheduler",
            event = "scheduler.stop",
            fetch_in_flight = self.in_flight.is_some()
        );
    }

    fn run_cycle(&mut self, trigger: CycleTrigger) {
        if self.in_flight.is_some() {
            self.ticks_skipped += 1;
            debug!(
                component = "refresh_scheduler",
                event = "scheduler.tick.skipped",
                trigger = trigger.as_str(),
                ticks_skipped = self.ticks_skipped
            );
            return;
        }

        self.cycles_started += 1;
        if !self.has_rendered && !self.retry_visible {
            self.renderer.show_loading();
        }

        let fetcher = Arc::clone(&self.fetcher);
        self.in_flight = Some(Box::pin(async move { fetcher.fetch().await }));

        debug!(
            component = "refresh_scheduler",
            event = "scheduler.fetch.begin",
            trigger = trigger.as_str(),
            cycle = self.cycles_started
        );
    }

    fn finish_cycle(&mut self, outcome: Result<PriceSnapshot, FetchError>) {
        match outcome {
            Ok(snapshot) => {
                info!(
                    component = "refresh_scheduler",
                    event = "scheduler.fetch.ok",
                    cycle = self.cycles_started,
                    items = snapshot.item_count(),
                    last_update = %snapshot.last_update
                );
                self.renderer.render(snapshot);
                self.renderer.hide_loading();
                self.has_rendered = true;
                self.retry_visible = false;
                self.last_rendered_at = Some(Utc::now());
            }
            Err(err) => {
                warn!(
                    component = "refresh_scheduler",
                    event = "scheduler.fetch.error",
                    cycle = self.cycles_started,
                    error = %err,
                    running = matches!(self.refresh, Refresh::Running { .. })
                );
                self.renderer.show_retry(&err);
                self.retry_visible = true;
            }
        }
    }

    fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            state: match self.refresh {
                Refresh::Idle => RefreshState::Idle,
                Refresh::Running { .. } => RefreshState::Running,
            },
            fetch_in_flight: self.in_flight.is_some(),
            has_rendered: self.has_rendered,
            retry_visible: self.retry_visible,
            cycles_started: self.cycles_started,
            ticks_skipped: self.ticks_skipped,
            last_rendered_at: self.last_rendered_at,
        }
    }
}

async fn poll_in_flight(in_flight: &mut Option<FetchFuture>) -> Result<PriceSnapshot, FetchError> {
    match in_flight {
        Some(fetch) => fetch.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(refresh: &mut Refresh) {
    match refresh {
        Refresh::Running { timer } => {
            timer.tick().await;
        }
        Refresh::Idle => std::future::pending().await,
    }
}

/// Cloneable control surface for a spawned [`RefreshScheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl SchedulerHandle {
    pub fn start(&self) -> Result<(), SchedulerError> {
        self.send(Command::Start)
    }

    pub fn stop(&self) -> Result<(), SchedulerError> {
        self.send(Command::Stop)
    }

    /// One fetch-and-render cycle outside the timer cadence, e.g. a manual retry.
    pub fn trigger_once(&self) -> Result<(), SchedulerError> {
        self.send(Command::TriggerOnce)
    }

    pub async fn status(&self) -> Result<SchedulerStatus, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Status(reply))?;
        rx.await.map_err(|_| SchedulerError::Closed)
    }

    /// Ends the scheduler task. Commands queued before this one are still applied.
    pub fn dispose(&self) -> Result<(), SchedulerError> {
        self.send(Command::Dispose)
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: Command) -> Result<(), SchedulerError> {
        self.commands
            .send(command)
            .map_err(|_| SchedulerError::Closed)
    }
}
