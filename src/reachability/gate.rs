use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

/// Wait between stopping and restarting monitoring after the host changes.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    EthernetOrWiFi,
    Cellular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReachabilityStatus {
    #[default]
    Unknown,
    NotReachable,
    Reachable(ConnectionType),
}

impl ReachabilityStatus {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ReachabilityStatus::Reachable(_))
    }
}

impl fmt::Display for ReachabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReachabilityStatus::Unknown => write!(f, "unknown"),
            ReachabilityStatus::NotReachable => write!(f, "not_reachable"),
            ReachabilityStatus::Reachable(ConnectionType::EthernetOrWiFi) => {
                write!(f, "reachable(ethernet_or_wifi)")
            }
            ReachabilityStatus::Reachable(ConnectionType::Cellular) => {
                write!(f, "reachable(cellular)")
            }
        }
    }
}

/// Receives reachability transitions as they happen.
pub trait ReachabilityObserver: Send + Sync {
    fn reachability_status_changed(&self, status: ReachabilityStatus);
}

/// Platform capability that watches a host and reports through the handle.
pub trait ReachabilityMonitor: Send + Sync {
    fn start_listening(&self, host: &str, handle: ReachabilityHandle);
    fn stop_listening(&self);
}

/// Reporting end given to monitors. Reports after the gate is dropped are ignored.
#[derive(Clone)]
pub struct ReachabilityHandle {
    inner: Weak<GateInner>,
}

impl ReachabilityHandle {
    pub fn report(&self, status: ReachabilityStatus) {
        if let Some(inner) = self.inner.upgrade() {
            inner.report(status);
        }
    }
}

struct GateState {
    enabled: bool,
    host: String,
    listened_host: Option<String>,
    status: ReachabilityStatus,
    generation: u64,
}

struct GateInner {
    state: Mutex<GateState>,
    monitor: Option<Arc<dyn ReachabilityMonitor>>,
    observer: Mutex<Option<Weak<dyn ReachabilityObserver>>>,
    settle_delay: Duration,
}

impl GateInner {
    fn report(&self, status: ReachabilityStatus) {
        {
            let mut state = self.state.lock();
            if state.status == status {
                return;
            }
            state.status = status;
        }
        debug!(status = %status, "reachability status changed");
        let observer = self.observer.lock().as_ref().and_then(Weak::upgrade);
        if let Some(observer) = observer {
            observer.reachability_status_changed(status);
        }
    }
}

/// Admission control for outbound calls.
///
/// Disabled gates admit everything. Enabled gates admit only while the last
/// reported status is reachable; nothing reported yet counts as unreachable.
pub struct ReachabilityGate {
    inner: Arc<GateInner>,
}

impl ReachabilityGate {
    pub fn new(host: impl Into<String>, monitor: Option<Arc<dyn ReachabilityMonitor>>) -> Self {
        Self::with_settle_delay(host, monitor, SETTLE_DELAY)
    }

    pub fn with_settle_delay(
        host: impl Into<String>,
        monitor: Option<Arc<dyn ReachabilityMonitor>>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(GateInner {
                state: Mutex::new(GateState {
                    enabled: false,
                    host: host.into(),
                    listened_host: None,
                    status: ReachabilityStatus::Unknown,
                    generation: 0,
                }),
                monitor,
                observer: Mutex::new(None),
                settle_delay,
            }),
        }
    }

    pub fn handle(&self) -> ReachabilityHandle {
        ReachabilityHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Registers the single observer. The gate keeps only a weak reference.
    pub fn set_observer<O: ReachabilityObserver + 'static>(&self, observer: &Arc<O>) {
        let weak: Weak<O> = Arc::downgrade(observer);
        self.set_observer_weak(weak);
    }

    /// Same as [`ReachabilityGate::set_observer`], for observers already
    /// held as trait objects.
    pub fn set_observer_weak(&self, observer: Weak<dyn ReachabilityObserver>) {
        *self.inner.observer.lock() = Some(observer);
    }

    pub fn clear_observer(&self) {
        *self.inner.observer.lock() = None;
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.state.lock().enabled
    }

    pub fn host(&self) -> String {
        self.inner.state.lock().host.clone()
    }

    pub fn status(&self) -> ReachabilityStatus {
        self.inner.state.lock().status
    }

    pub fn set_enabled(&self, enable: bool) {
        let host_changed = {
            let mut state = self.inner.state.lock();
            if state.enabled == enable {
                return;
            }
            state.enabled = enable;
            state.generation += 1;
            state
                .listened_host
                .as_ref()
                .is_some_and(|listened| *listened != state.host)
        };

        if !enable {
            if let Some(monitor) = self.inner.monitor.as_ref() {
                monitor.stop_listening();
            }
            return;
        }

        if host_changed {
            self.schedule_start();
        } else {
            start_listening(&self.inner);
        }
    }

    pub fn update_host(&self, host: impl Into<String>) {
        let enabled = {
            let mut state = self.inner.state.lock();
            state.host = host.into();
            state.enabled
        };
        if !enabled {
            return;
        }
        if let Some(monitor) = self.inner.monitor.as_ref() {
            monitor.stop_listening();
        }
        self.schedule_start();
    }

    pub fn is_permitted(&self) -> bool {
        let state = self.inner.state.lock();
        !state.enabled || state.status.is_reachable()
    }

    fn schedule_start(&self) {
        let generation = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            state.generation
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime available; restarting reachability monitoring immediately");
            start_listening(&self.inner);
            return;
        };
        let weak = Arc::downgrade(&self.inner);
        let delay = self.inner.settle_delay;
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let current = {
                let state = inner.state.lock();
                state.enabled && state.generation == generation
            };
            if current {
                start_listening(&inner);
            }
        });
    }
}

fn start_listening(inner: &Arc<GateInner>) {
    let host = {
        let mut state = inner.state.lock();
        state.listened_host = Some(state.host.clone());
        state.host.clone()
    };
    if let Some(monitor) = inner.monitor.as_ref() {
        debug!(host = %host, "reachability monitoring started");
        monitor.start_listening(
            &host,
            ReachabilityHandle {
                inner: Arc::downgrade(inner),
            },
        );
    }
}
