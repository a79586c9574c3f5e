use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::gate::{ConnectionType, ReachabilityHandle, ReachabilityMonitor, ReachabilityStatus};

/// Monitor that treats a host as reachable while a TCP connection to it succeeds.
pub struct TcpProbeMonitor {
    port: u16,
    interval: Duration,
    connect_timeout: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TcpProbeMonitor {
    pub fn new(port: u16) -> Self {
        Self::with_timing(port, Duration::from_secs(10), Duration::from_secs(3))
    }

    pub fn with_timing(port: u16, interval: Duration, connect_timeout: Duration) -> Self {
        Self {
            port,
            interval,
            connect_timeout,
            task: Mutex::new(None),
        }
    }

    async fn probe(host: &str, port: u16, connect_timeout: Duration) -> ReachabilityStatus {
        match tokio::time::timeout(connect_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_)) => ReachabilityStatus::Reachable(ConnectionType::EthernetOrWiFi),
            Ok(Err(e)) => {
                debug!(host, port, error = %e, "reachability probe failed");
                ReachabilityStatus::NotReachable
            }
            Err(_) => {
                debug!(host, port, "reachability probe timed out");
                ReachabilityStatus::NotReachable
            }
        }
    }
}

impl ReachabilityMonitor for TcpProbeMonitor {
    fn start_listening(&self, host: &str, handle: ReachabilityHandle) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(host, "no async runtime available; reachability probe not started");
            return;
        };
        let host = host.to_string();
        let port = self.port;
        let interval = self.interval;
        let connect_timeout = self.connect_timeout;
        let task = runtime.spawn(async move {
            loop {
                let status = Self::probe(&host, port, connect_timeout).await;
                handle.report(status);
                tokio::time::sleep(interval).await;
            }
        });
        if let Some(previous) = self.task.lock().replace(task) {
            previous.abort();
        }
    }

    fn stop_listening(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

impl Drop for TcpProbeMonitor {
    fn drop(&mut self) {
        self.stop_listening();
    }
}
