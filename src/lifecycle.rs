//! Lifecycle gate: maps host activation and page visibility onto scheduler start/stop.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, info};

use crate::scheduler::{SchedulerError, SchedulerHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    HostActivated,
    HostDeactivated,
    PageVisible,
    PageHidden,
}

impl LifecycleSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleSignal::HostActivated => "host_activated",
            LifecycleSignal::HostDeactivated => "host_deactivated",
            LifecycleSignal::PageVisible => "page_visible",
            LifecycleSignal::PageHidden => "page_hidden",
        }
    }

    pub fn wants_refresh(self) -> bool {
        matches!(
            self,
            LifecycleSignal::HostActivated | LifecycleSignal::PageVisible
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Activated,
    Deactivated,
}

impl From<HostEvent> for LifecycleSignal {
    fn from(event: HostEvent) -> Self {
        match event {
            HostEvent::Activated => LifecycleSignal::HostActivated,
            HostEvent::Deactivated => LifecycleSignal::HostDeactivated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

impl From<Visibility> for LifecycleSignal {
    fn from(visibility: Visibility) -> Self {
        match visibility {
            Visibility::Visible => LifecycleSignal::PageVisible,
            Visibility::Hidden => LifecycleSignal::PageHidden,
        }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("lifecycle gate has been torn down")]
    TornDown,
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Shared entry point for every signal source. Delivery happens under the lock,
/// so signals reach the scheduler's command queue in the order they were sent
/// and nothing lands after the teardown stop.
#[derive(Debug)]
struct Intake {
    scheduler: SchedulerHandle,
    open: Mutex<bool>,
}

impl Intake {
    fn deliver(
        &self,
        source: &'static str,
        signal: LifecycleSignal,
    ) -> Result<(), LifecycleError> {
        let open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        if !*open {
            debug!(
                component = "lifecycle_gate",
                event = "lifecycle.signal.dropped",
                source,
                signal = signal.as_str()
            );
            return Err(LifecycleError::TornDown);
        }

        forward_signal(&self.scheduler, source, signal)?;
        Ok(())
    }

    fn close(&self) -> Result<(), SchedulerError> {
        let mut open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        *open = false;
        self.scheduler.stop()
    }

    fn is_open(&self) -> bool {
        *self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sending end registered for one signal source. Dropping it releases the listener.
#[derive(Debug)]
pub struct Subscription<S> {
    source: &'static str,
    intake: Arc<Intake>,
    _event: PhantomData<fn(S)>,
}

impl<S: Into<LifecycleSignal>> Subscription<S> {
    pub fn source(&self) -> &'static str {
        self.source
    }

    /// False once the gate has been torn down.
    pub fn is_active(&self) -> bool {
        self.intake.is_open()
    }

    pub fn send(&self, event: S) -> Result<(), LifecycleError> {
        self.intake.deliver(self.source, event.into())
    }

    pub fn release(self) {
        drop(self);
    }
}

/// Stateless forwarder; correctness rests on the scheduler's idempotent start/stop.
pub struct LifecycleGate {
    intake: Arc<Intake>,
    sources: Vec<&'static str>,
}

impl LifecycleGate {
    pub fn new(scheduler: SchedulerHandle) -> Self {
        Self {
            intake: Arc::new(Intake {
                scheduler,
                open: Mutex::new(true),
            }),
            sources: Vec::new(),
        }
    }

    pub fn on_signal(&self, signal: LifecycleSignal) -> Result<(), LifecycleError> {
        self.intake.deliver("direct", signal)
    }

    /// Without a host bridge only visibility drives refresh and no host
    /// subscription is handed out.
    pub fn subscribe_host(&mut self, bridge_available: bool) -> Option<Subscription<HostEvent>> {
        if !bridge_available {
            info!(
                component = "lifecycle_gate",
                event = "lifecycle.host_bridge.unavailable"
            );
            return None;
        }
        Some(self.subscribe("host_bridge"))
    }

    pub fn subscribe_visibility(&mut self) -> Subscription<Visibility> {
        self.subscribe("page_visibility")
    }

    /// Sources registered so far, in subscription order.
    pub fn sources(&self) -> &[&'static str] {
        &self.sources
    }

    /// Environment unload: close the intake for every subscription, then a final stop.
    pub fn teardown(self) -> Result<(), SchedulerError> {
        let released = self.sources.len();
        info!(
            component = "lifecycle_gate",
            event = "lifecycle.teardown",
            released
        );
        self.intake.close()
    }

    fn subscribe<S>(&mut self, source: &'static str) -> Subscription<S> {
        debug!(
            component = "lifecycle_gate",
            event = "lifecycle.subscribe",
            source
        );
        self.sources.push(source);
        Subscription {
            source,
            intake: Arc::clone(&self.intake),
            _event: PhantomData,
        }
    }
}

fn forward_signal(
    scheduler: &SchedulerHandle,
    source: &'static str,
    signal: LifecycleSignal,
) -> Result<(), SchedulerError> {
    info!(
        component = "lifecycle_gate",
        event = "lifecycle.signal",
        source,
        signal = signal.as_str()
    );

    if signal.wants_refresh() {
        scheduler.start()
    } else {
        scheduler.stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::fetcher::{FetchError, PriceFetcher};
    use crate::render::Renderer;
    use crate::scheduler::{RefreshScheduler, RefreshState};
    use crate::snapshot::PriceSnapshot;

    struct EmptyFetcher;

    impl PriceFetcher for EmptyFetcher {
        async fn fetch(&self) -> Result<PriceSnapshot, FetchError> {
            Ok(PriceSnapshot::default())
        }
    }

    struct NullRenderer;

    impl Renderer for NullRenderer {
        fn show_loading(&mut self) {}
        fn hide_loading(&mut self) {}
        fn render(&mut self, _snapshot: PriceSnapshot) {}
        fn show_retry(&mut self, _error: &FetchError) {}
    }

    #[test]
    fn activation_and_visibility_map_to_refresh_intent() {
        assert!(LifecycleSignal::from(HostEvent::Activated).wants_refresh());
        assert!(LifecycleSignal::from(Visibility::Visible).wants_refresh());
        assert!(!LifecycleSignal::from(HostEvent::Deactivated).wants_refresh());
        assert!(!LifecycleSignal::from(Visibility::Hidden).wants_refresh());
    }

    #[test]
    fn signal_names_are_stable() {
        assert_eq!(LifecycleSignal::HostActivated.as_str(), "host_activated");
        assert_eq!(LifecycleSignal::PageHidden.as_str(), "page_hidden");
    }

    #[tokio::test]
    async fn subscriptions_go_inert_after_teardown() {
        let (scheduler, task) =
            RefreshScheduler::new(EmptyFetcher, NullRenderer, Duration::from_secs(30)).spawn();
        let mut gate = LifecycleGate::new(scheduler.clone());
        let visibility = gate.subscribe_visibility();
        let host = gate.subscribe_host(true).expect("bridge is available");
        assert_eq!(gate.sources(), &["page_visibility", "host_bridge"]);
        assert!(visibility.is_active());

        host.send(HostEvent::Deactivated).unwrap();
        gate.teardown().unwrap();

        assert!(!visibility.is_active());
        assert!(matches!(
            visibility.send(Visibility::Visible),
            Err(LifecycleError::TornDown)
        ));
        assert!(matches!(
            host.send(HostEvent::Activated),
            Err(LifecycleError::TornDown)
        ));

        let status = scheduler.status().await.unwrap();
        assert_eq!(status.state, RefreshState::Idle);
        assert_eq!(status.cycles_started, 0);

        scheduler.dispose().unwrap();
        task.await.unwrap();
    }
}
