pub mod activity;
pub mod config;
pub mod decode;
pub mod errors;
pub mod headers;
pub mod logging;
pub mod mock;
pub mod reachability;
mod service;
pub mod target;
pub mod transport;

pub use activity::{ActivityGuard, ActivityIndicator};
pub use config::{MockConfig, ServiceConfig};
pub use decode::{Decodable, decode};
pub use errors::{CallError, CallResult, Error};
pub use headers::{AuthSlot, HeaderSet, HeaderStore};
pub use mock::{DirFixtureSource, FixtureSource, MockNetworkService, StaticFixtureSource};
pub use reachability::{ReachabilityGate, ReachabilityObserver, ReachabilityStatus};
pub use service::{NetworkService, RestCall};
pub use transport::{ParameterEncoding, Parameters, ReqwestTransport, RestMethod, Transport};

#[cfg(test)]
mod tests;
