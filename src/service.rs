use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::activity::{ActivityGuard, ActivityIndicator};
use crate::config::ServiceConfig;
use crate::decode::{Decodable, decode_with_reason};
use crate::errors::{CallError, CallResult, Error};
use crate::headers::{AuthSlot, HeaderSet, HeaderStore};
use crate::logging::log_exchange;
use crate::reachability::{ReachabilityGate, ReachabilityMonitor, ReachabilityObserver};
use crate::target::resolve;
use crate::transport::{
    ParameterEncoding, Parameters, ReqwestTransport, RestMethod, Transport, TransportRequest,
    TransportResponse,
};

/// One outbound call: what to send, where, and with which saved auth.
#[derive(Debug, Clone)]
pub struct RestCall {
    pub method: RestMethod,
    pub path: String,
    pub parameters: Parameters,
    pub encoding: ParameterEncoding,
    pub auth: AuthSlot,
    pub extra_headers: HeaderSet,
    pub activity_label: Option<String>,
}

impl RestCall {
    pub fn new(method: RestMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            parameters: Parameters::new(),
            encoding: ParameterEncoding::QueryString,
            auth: AuthSlot::None,
            extra_headers: HeaderSet::new(),
            activity_label: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(RestMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(RestMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(RestMethod::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(RestMethod::Delete, path)
    }

    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn encoding(mut self, encoding: ParameterEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn auth(mut self, auth: AuthSlot) -> Self {
        self.auth = auth;
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key, value);
        self
    }

    pub fn activity_label(mut self, label: impl Into<String>) -> Self {
        self.activity_label = Some(label.into());
        self
    }
}

struct ServiceState {
    base_address: String,
    headers: HeaderStore,
}

enum Completion<T> {
    NoResponse(Error),
    Success(T),
    Rejected(Error),
    MissingCause,
}

/// Coordinates admission, header/URL setup, dispatch and completion for
/// calls against one REST service.
///
/// Completion runs on a task spawned onto the current Tokio runtime, or onto
/// the runtime captured at construction (see [`NetworkService::with_runtime`])
/// when the caller's thread is outside one. Header state is shared by every call on the instance, so
/// overlapping calls that use different auth or extra headers need external
/// serialization.
pub struct NetworkService {
    state: Mutex<ServiceState>,
    gate: ReachabilityGate,
    transport: Arc<dyn Transport>,
    runtime: Option<Handle>,
}

impl NetworkService {
    pub fn new(
        config: ServiceConfig,
        transport: Arc<dyn Transport>,
        monitor: Option<Arc<dyn ReachabilityMonitor>>,
    ) -> Self {
        let mut headers = HeaderStore::new(config.default_headers.clone());
        headers.clear_service_headers();
        headers.clear_saved_auth();

        let gate = ReachabilityGate::new(config.reachability_host.clone(), monitor);
        gate.set_enabled(config.reachability_enabled);

        Self {
            state: Mutex::new(ServiceState {
                base_address: config.base_url,
                headers,
            }),
            gate,
            transport,
            runtime: Handle::try_current().ok(),
        }
    }

    /// Runtime used when a call is issued from a thread that is not inside one.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Builds a service dispatching through reqwest.
    pub fn with_reqwest(
        config: ServiceConfig,
        monitor: Option<Arc<dyn ReachabilityMonitor>>,
    ) -> Result<Self, Error> {
        let transport = ReqwestTransport::from_config(&config)?;
        Ok(Self::new(config, Arc::new(transport), monitor))
    }

    pub fn base_address(&self) -> String {
        self.state.lock().base_address.clone()
    }

    pub fn update_base_address(&self, base_address: impl Into<String>) {
        self.state.lock().base_address = base_address.into();
    }

    // Reachability

    pub fn reachability(&self) -> &ReachabilityGate {
        &self.gate
    }

    pub fn enable_reachability(&self, enable: bool) {
        self.gate.set_enabled(enable);
    }

    pub fn update_host_for_reachability(&self, host: impl Into<String>) {
        self.gate.update_host(host);
    }

    pub fn set_reachability_observer<O: ReachabilityObserver + 'static>(&self, observer: &Arc<O>) {
        self.gate.set_observer(observer);
    }

    pub fn set_reachability_observer_weak(&self, observer: Weak<dyn ReachabilityObserver>) {
        self.gate.set_observer_weak(observer);
    }

    // Headers

    pub fn add_default_headers(&self) {
        self.state.lock().headers.add_default_headers();
    }

    pub fn clear_and_update_default_headers(&self, headers: HeaderSet) {
        self.state.lock().headers.set_default_headers(headers);
    }

    pub fn add_service_headers(&self, headers: &HeaderSet) {
        self.state.lock().headers.add_service_headers(headers);
    }

    pub fn remove_service_header(&self, key: &str) {
        self.state.lock().headers.remove_service_header(key);
    }

    pub fn add_basic_auth(&self, username: &str, password: &str) {
        self.state.lock().headers.add_basic_auth(username, password);
    }

    pub fn add_bearer_auth(&self, token: &str) {
        self.state.lock().headers.add_bearer_auth(token);
    }

    pub fn save_basic_auth(&self) {
        self.state.lock().headers.save_auth(AuthSlot::Basic);
    }

    pub fn save_bearer_auth(&self) {
        self.state.lock().headers.save_auth(AuthSlot::Bearer);
    }

    pub fn clear_auth(&self, slot: AuthSlot) {
        self.state.lock().headers.clear_auth(slot);
    }

    pub fn clear_all_auth(&self) {
        self.state.lock().headers.clear_all_auth();
    }

    pub fn clear_saved_auth(&self) {
        self.state.lock().headers.clear_saved_auth();
    }

    pub fn resolve_headers(&self) -> HeaderSet {
        self.state.lock().headers.resolve_headers()
    }

    // Call lifecycle

    /// Admission check; unreachable calls never touch the transport.
    pub fn can_perform(&self) -> Result<(), CallError> {
        if self.gate.is_permitted() {
            Ok(())
        } else {
            Err(CallError::unreachable())
        }
    }

    /// Resets service headers, applies the saved auth and extra headers, then
    /// returns the merged headers and the resolved target.
    pub fn setup_rest_operation(
        &self,
        auth: AuthSlot,
        path: &str,
        extra_headers: &HeaderSet,
    ) -> Result<(HeaderSet, String), Error> {
        let mut state = self.state.lock();
        state.headers.clear_service_headers();
        state.headers.apply_auth_from_slot(auth);
        state.headers.add_service_headers(extra_headers);
        let headers = state.headers.resolve_headers();
        let url = resolve(&state.base_address, path)?;
        Ok((headers, url))
    }

    /// Runs `call` and invokes exactly one of `on_success` / `on_error`.
    ///
    /// The indicator, when given, is shown during setup and hidden once
    /// before the callback fires.
    pub fn perform_call<T, S, E>(
        &self,
        call: RestCall,
        indicator: Option<Arc<dyn ActivityIndicator>>,
        on_success: S,
        on_error: E,
    ) where
        T: Decodable,
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(CallError) + Send + 'static,
    {
        let call_id = Uuid::new_v4();
        if let Err(err) = self.can_perform() {
            warn!(call_id = %call_id, "call rejected: network unreachable");
            on_error(err);
            return;
        }

        let (headers, url) =
            match self.setup_rest_operation(call.auth, &call.path, &call.extra_headers) {
                Ok(prepared) => prepared,
                Err(err) => {
                    warn!(call_id = %call_id, error = %err, "call setup failed");
                    on_error(CallError::new(err, false));
                    return;
                }
            };
        let Some(runtime) = runtime_handle(self.runtime.as_ref()) else {
            warn!(call_id = %call_id, "call rejected: no async runtime");
            on_error(CallError::new(Error::NoRuntime, false));
            return;
        };
        let activity = ActivityGuard::show(indicator, call.activity_label.as_deref());

        debug!(call_id = %call_id, method = %call.method, url = %url, "dispatching call");
        let request = TransportRequest {
            method: call.method,
            url,
            parameters: call.parameters,
            encoding: call.encoding,
            headers,
        };
        let transport = Arc::clone(&self.transport);
        runtime.spawn(async move {
            let response = transport.request(request).await;
            complete(call_id, response, activity, on_success, on_error);
        });
    }

    /// Future-returning form of [`NetworkService::perform_call`].
    pub async fn call<T: Decodable>(
        &self,
        call: RestCall,
        indicator: Option<Arc<dyn ActivityIndicator>>,
    ) -> CallResult<T> {
        let (tx, rx) = oneshot::channel();
        let err_tx = Arc::new(Mutex::new(Some(tx)));
        let ok_tx = Arc::clone(&err_tx);
        self.perform_call(
            call,
            indicator,
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

    /// Untyped call used to exercise an endpoint: no saved auth, no
    /// indicator, and the body delivered as a JSON object. Failures always
    /// report `valid_response = true`.
    pub fn perform_raw_call<S, E>(
        &self,
        method: RestMethod,
        path: &str,
        encoding: ParameterEncoding,
        headers: &HeaderSet,
        parameters: Parameters,
        on_success: S,
        on_error: E,
    ) where
        S: FnOnce(Parameters) + Send + 'static,
        E: FnOnce(CallError) + Send + 'static,
    {
        let call_id = Uuid::new_v4();
        if let Err(err) = self.can_perform() {
            on_error(err);
            return;
        }
        let (headers, url) = match self.setup_rest_operation(AuthSlot::None, path, headers) {
            Ok(prepared) => prepared,
            Err(err) => {
                on_error(CallError::new(err, false));
                return;
            }
        };
        let Some(runtime) = runtime_handle(self.runtime.as_ref()) else {
            on_error(CallError::new(Error::NoRuntime, false));
            return;
        };
        let request = TransportRequest {
            method,
            url,
            parameters,
            encoding,
            headers,
        };
        let transport = Arc::clone(&self.transport);
        runtime.spawn(async move {
            let response = transport.request(request).await;
            log_exchange(call_id, &response.summary);
            match response.outcome {
                Ok(body) => {
                    let map = match serde_json::from_slice::<Value>(&body) {
                        Ok(Value::Object(map)) => map,
                        _ => Parameters::new(),
                    };
                    on_success(map);
                }
                Err(cause) => {
                    let cause = cause.unwrap_or_else(|| {
                        Error::NoResponse("transport reported no cause".to_string())
                    });
                    on_error(CallError::new(cause, true));
                }
            }
        });
    }
}

/// The caller's runtime if there is one, otherwise the captured one.
pub(crate) fn runtime_handle(captured: Option<&Handle>) -> Option<Handle> {
    Handle::try_current().ok().or_else(|| captured.cloned())
}

fn classify<T: Decodable>(response: TransportResponse) -> Completion<T> {
    if response.response.is_none() {
        let reason = match response.outcome {
            Err(Some(cause)) => cause.to_string(),
            _ => "transport produced no response".to_string(),
        };
        return Completion::NoResponse(Error::NoResponse(reason));
    }
    match response.outcome {
        Ok(body) => match decode_with_reason::<T>(&body) {
            Ok(value) => Completion::Success(value),
            Err(reason) => Completion::Rejected(Error::Decode {
                type_name: std::any::type_name::<T>(),
                reason,
            }),
        },
        Err(Some(cause)) => Completion::Rejected(cause),
        Err(None) => Completion::MissingCause,
    }
}

fn complete<T, S, E>(
    call_id: Uuid,
    response: TransportResponse,
    activity: ActivityGuard,
    on_success: S,
    on_error: E,
) where
    T: Decodable,
    S: FnOnce(T),
    E: FnOnce(CallError),
{
    log_exchange(call_id, &response.summary);
    let completion = classify::<T>(response);
    activity.finish();

    match completion {
        Completion::Success(value) => {
            info!(call_id = %call_id, success = true, "call completed");
            on_success(value);
        }
        Completion::NoResponse(cause) => {
            debug!(call_id = %call_id, error = %cause, "invalid response");
            on_error(CallError::new(cause, false));
        }
        Completion::Rejected(cause) => {
            debug!(call_id = %call_id, error = %cause, "invalid response");
            on_error(CallError::new(cause, true));
        }
        Completion::MissingCause => {
            warn!(call_id = %call_id, "failed response carried no cause");
            on_error(CallError::new(Error::Internal, false));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::logging::ExchangeSummary;
    use async_trait::async_trait;
    use bytes::Bytes;
    use reqwest::StatusCode;

    struct PanicTransport;

    #[async_trait]
    impl Transport for PanicTransport {
        async fn request(&self, _request: TransportRequest) -> TransportResponse {
            panic!("transport must not be reached");
        }
    }

    struct NumberTransport;

    #[async_trait]
    impl Transport for NumberTransport {
        async fn request(&self, _request: TransportRequest) -> TransportResponse {
            answered(Ok(Bytes::from_static(b"7")))
        }
    }

    fn service(base: &str) -> NetworkService {
        NetworkService::new(ServiceConfig::from_values(base), Arc::new(PanicTransport), None)
    }

    fn answered(outcome: Result<Bytes, Option<Error>>) -> TransportResponse {
        TransportResponse {
            summary: ExchangeSummary::started_now(),
            response: Some(crate::transport::ResponseParts {
                status: StatusCode::OK,
                headers: HeaderSet::new(),
                body: Bytes::new(),
            }),
            outcome,
        }
    }

    #[test]
    fn setup_applies_saved_auth_and_extra_headers() {
        let service = service("https://api.example.com");
        service.add_bearer_auth("secret");
        service.save_bearer_auth();

        let extra = HeaderSet::from_pairs([("X-Trace", "1")]);
        let (headers, url) = service
            .setup_rest_operation(AuthSlot::Bearer, "/v1/me", &extra)
            .unwrap();
        assert_eq!(url, "https://api.example.com/v1/me");
        assert_eq!(headers.get("Authorization"), Some("Bearer secret"));
        assert_eq!(headers.get("X-Trace"), Some("1"));
        assert_eq!(headers.get("Accept"), Some("application/json"));

        let (headers, _) = service
            .setup_rest_operation(AuthSlot::None, "/v1/me", &HeaderSet::new())
            .unwrap();
        assert!(headers.get("Authorization").is_none());
        assert!(headers.get("X-Trace").is_none());
    }

    #[test]
    fn base_address_update_changes_resolution() {
        let service = service("https://old.example.com");
        service.update_base_address("https://new.example.com");
        let (_, url) = service
            .setup_rest_operation(AuthSlot::None, "/ping", &HeaderSet::new())
            .unwrap();
        assert_eq!(url, "https://new.example.com/ping");
    }

    #[test]
    fn unreachable_call_fails_without_dispatch() {
        let service = service("https://api.example.com");
        service.enable_reachability(true);

        let seen = Arc::new(Mutex::new(None));
        let seen_err = seen.clone();
        service.perform_call::<serde_json::Value, _, _>(
            RestCall::get("/v1/users"),
            None,
            |_| panic!("success must not fire"),
            move |err| *seen_err.lock() = Some(err),
        );

        let err = seen.lock().take().expect("error callback fired synchronously");
        assert!(matches!(err.cause, Error::NetworkUnreachable));
        assert!(!err.valid_response);
    }

    #[test]
    fn malformed_target_fails_before_dispatch() {
        let service = service("not a url");
        let seen = Arc::new(Mutex::new(None));
        let seen_err = seen.clone();
        service.perform_call::<serde_json::Value, _, _>(
            RestCall::get("/v1/users"),
            None,
            |_| panic!("success must not fire"),
            move |err| *seen_err.lock() = Some(err),
        );

        let err = seen.lock().take().expect("error callback fired");
        assert!(matches!(err.cause, Error::MalformedTarget(_)));
        assert!(!err.valid_response);
    }

    #[test]
    fn call_outside_any_runtime_reports_error() {
        let service = service("https://api.example.com");
        let seen = Arc::new(Mutex::new(None));
        let seen_err = seen.clone();
        service.perform_call::<serde_json::Value, _, _>(
            RestCall::get("/v1/users"),
            None,
            |_| panic!("success must not fire"),
            move |err| *seen_err.lock() = Some(err),
        );

        let err = seen.lock().take().expect("error callback fired synchronously");
        assert!(matches!(err.cause, Error::NoRuntime));
        assert!(!err.valid_response);

        let raw_seen = Arc::new(Mutex::new(None));
        let raw_err = raw_seen.clone();
        service.perform_raw_call(
            RestMethod::Get,
            "/v1/status",
            ParameterEncoding::QueryString,
            &HeaderSet::new(),
            Parameters::new(),
            |_| panic!("success must not fire"),
            move |err| *raw_err.lock() = Some(err),
        );
        let err = raw_seen.lock().take().expect("raw error callback fired");
        assert!(matches!(err.cause, Error::NoRuntime));
    }

    #[test]
    fn captured_runtime_serves_calls_from_plain_threads() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let service = NetworkService::new(
            ServiceConfig::from_values("https://api.example.com"),
            Arc::new(NumberTransport),
            None,
        )
        .with_runtime(runtime.handle().clone());

        let (tx, rx) = oneshot::channel();
        service.perform_call::<u32, _, _>(
            RestCall::get("/v1/count"),
            None,
            move |value| {
                let _ = tx.send(value);
            },
            |err| panic!("unexpected error: {err}"),
        );
        assert_eq!(runtime.block_on(rx).unwrap(), 7);
    }

    #[test]
    fn classify_covers_each_branch() {
        let missing = TransportResponse {
            summary: ExchangeSummary::started_now(),
            response: None,
            outcome: Err(None),
        };
        assert!(matches!(
            classify::<u32>(missing),
            Completion::NoResponse(Error::NoResponse(_))
        ));
        assert!(matches!(
            classify::<u32>(answered(Ok(Bytes::from_static(b"42")))),
            Completion::Success(42)
        ));
        assert!(matches!(
            classify::<u32>(answered(Ok(Bytes::from_static(b"\"x\"")))),
            Completion::Rejected(Error::Decode { .. })
        ));
        assert!(matches!(
            classify::<u32>(answered(Err(Some(Error::ContentType(None))))),
            Completion::Rejected(Error::ContentType(None))
        ));
        assert!(matches!(
            classify::<u32>(answered(Err(None))),
            Completion::MissingCause
        ));
    }
}
