mod gate;
mod probe;

pub use gate::{
    ConnectionType, ReachabilityGate, ReachabilityHandle, ReachabilityMonitor,
    ReachabilityObserver, ReachabilityStatus, SETTLE_DELAY,
};
pub use probe::TcpProbeMonitor;
