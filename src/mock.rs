//! Fixture-backed stand-in for [`crate::NetworkService`].
//!
//! A mock call loads `service.<method>.<base name>.response` from its fixture
//! source, decodes it like a real response, waits the configured delay and
//! then reports either the decoded fixture or a simulated failure.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::activity::{ActivityGuard, ActivityIndicator};
use crate::config::MockConfig;
use crate::decode::{Decodable, decode_with_reason};
use crate::errors::{CallError, CallResult, Error};
use crate::service::runtime_handle;
use crate::transport::RestMethod;

/// Read-only store of recorded responses.
pub trait FixtureSource: Send + Sync {
    fn load_fixture(&self, identifier: &str) -> Option<Bytes>;
}

/// Loads `<identifier>.json` from a directory, re-reading on every call.
pub struct DirFixtureSource {
    dir: PathBuf,
}

impl DirFixtureSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl FixtureSource for DirFixtureSource {
    fn load_fixture(&self, identifier: &str) -> Option<Bytes> {
        let path = self.dir.join(format!("{identifier}.json"));
        match std::fs::read(&path) {
            Ok(data) => Some(Bytes::from(data)),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "fixture not readable");
                None
            }
        }
    }
}

/// In-memory fixtures keyed by identifier.
#[derive(Default)]
pub struct StaticFixtureSource {
    fixtures: HashMap<String, Bytes>,
}

impl StaticFixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fixture(mut self, identifier: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        self.insert(identifier, payload);
        self
    }

    pub fn insert(&mut self, identifier: impl Into<String>, payload: impl Into<Bytes>) {
        self.fixtures.insert(identifier.into(), payload.into());
    }
}

impl FixtureSource for StaticFixtureSource {
    fn load_fixture(&self, identifier: &str) -> Option<Bytes> {
        self.fixtures.get(identifier).cloned()
    }
}

pub fn fixture_identifier(kind: RestMethod, service_base_name: &str) -> String {
    format!(
        "service.{}.{}.response",
        kind.as_str().to_lowercase(),
        service_base_name
    )
}

#[derive(Clone, Copy)]
struct MockSettings {
    enable_success_mock: bool,
    response_delay_ms: f32,
}

impl MockSettings {
    fn delay(&self) -> Duration {
        if self.response_delay_ms.is_finite() && self.response_delay_ms > 0.0 {
            Duration::try_from_secs_f64(f64::from(self.response_delay_ms) / 1000.0)
                .unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }
}

pub struct MockNetworkService {
    settings: Mutex<MockSettings>,
    fixtures: Arc<dyn FixtureSource>,
    runtime: Option<Handle>,
}

impl MockNetworkService {
    pub fn new(config: &MockConfig, fixtures: Arc<dyn FixtureSource>) -> Self {
        Self {
            settings: Mutex::new(MockSettings {
                enable_success_mock: config.enable_success_mock,
                response_delay_ms: config.response_delay_ms,
            }),
            fixtures,
            runtime: Handle::try_current().ok(),
        }
    }

    /// Runtime used when a call is issued from a thread that is not inside one.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Uses `config.fixture_dir` as a [`DirFixtureSource`].
    pub fn from_config(config: &MockConfig) -> Result<Self, Error> {
        let dir = config
            .fixture_dir
            .as_ref()
            .ok_or_else(|| Error::Config("fixture_dir is required for a mock service".into()))?;
        Ok(Self::new(config, Arc::new(DirFixtureSource::new(dir))))
    }

    pub fn enable_success_mock(&self) -> bool {
        self.settings.lock().enable_success_mock
    }

    pub fn set_enable_success_mock(&self, enable: bool) {
        self.settings.lock().enable_success_mock = enable;
    }

    pub fn response_delay_ms(&self) -> f32 {
        self.settings.lock().response_delay_ms
    }

    pub fn set_response_delay_ms(&self, delay_ms: f32) {
        self.settings.lock().response_delay_ms = delay_ms;
    }

    /// Replays the fixture for `kind` + `service_base_name` and invokes
    /// exactly one of the callbacks.
    ///
    /// Work runs on the current Tokio runtime, or on the one captured at
    /// construction. With neither, `on_error(NoRuntime, false)` fires at once.
    pub fn perform_mock_call<T, S, E>(
        &self,
        kind: RestMethod,
        service_base_name: &str,
        indicator: Option<Arc<dyn ActivityIndicator>>,
        activity_label: Option<&str>,
        on_success: S,
        on_error: E,
    ) where
        T: Decodable,
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(CallError) + Send + 'static,
    {
        let call_id = Uuid::new_v4();
        let identifier = fixture_identifier(kind, service_base_name);
        let Some(runtime) = runtime_handle(self.runtime.as_ref()) else {
            warn!(call_id = %call_id, fixture = %identifier, "mock call rejected: no async runtime");
            on_error(CallError::new(Error::NoRuntime, false));
            return;
        };
        let activity = ActivityGuard::show(indicator, activity_label);
        let settings = *self.settings.lock();
        let fixtures = Arc::clone(&self.fixtures);

        runtime.spawn(async move {
            let Some(payload) = fixtures.load_fixture(&identifier) else {
                debug!(call_id = %call_id, fixture = %identifier, "mock fixture missing");
                activity.finish();
                on_error(CallError::new(Error::FixtureLoad(identifier), true));
                return;
            };

            let value = match decode_with_reason::<T>(&payload) {
                Ok(value) => value,
                Err(reason) => {
                    activity.finish();
                    on_error(CallError::new(
                        Error::Decode {
                            type_name: std::any::type_name::<T>(),
                            reason,
                        },
                        true,
                    ));
                    return;
                }
            };

            tokio::time::sleep(settings.delay()).await;
            activity.finish();
            info!(
                call_id = %call_id,
                fixture = %identifier,
                success = settings.enable_success_mock,
                "mock call completed"
            );
            if settings.enable_success_mock {
                on_success(value);
            } else {
                drop(value);
                on_error(CallError::new(Error::SimulatedFailure, true));
            }
        });
    }

    /// Future-returning form of [`MockNetworkService::perform_mock_call`].
    pub async fn mock_call<T: Decodable>(
        &self,
        kind: RestMethod,
        service_base_name: &str,
        indicator: Option<Arc<dyn ActivityIndicator>>,
        activity_label: Option<&str>,
    ) -> CallResult<T> {
        let (tx, rx) = oneshot::channel();
        let err_tx = Arc::new(Mutex::new(Some(tx)));
        let ok_tx = Arc::clone(&err_tx);
        self.perform_mock_call(
            kind,
            service_base_name,
            indicator,
            activity_label,
            move |value: T| {
                if let Some(tx) = ok_tx.lock().take() {
                    let _ = tx.send(Ok(value));
                }
            },
            move |err| {
                if let Some(tx) = err_tx.lock().take() {
                    let _ = tx.send(Err(err));
                }
            },
        );
        rx.await
            .unwrap_or_else(|_| Err(CallError::new(Error::Internal, false)))
    }
}
