use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

pub const AUTH_HEADER_KEY: &str = "Authorization";
pub const BASIC_AUTH_PREFIX: &str = "Basic ";
pub const BEARER_AUTH_PREFIX: &str = "Bearer ";

/// Header name to value mapping. Merging is last-write-wins.
///
/// Names are case-insensitive: they are stored lowercased, and lookups
/// lowercase the queried name.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct HeaderSet(BTreeMap<String, String>);

fn normalize(name: impl Into<String>) -> String {
    let mut name = name.into();
    name.make_ascii_lowercase();
    name
}

impl<'de> serde::Deserialize<'de> for HeaderSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        <BTreeMap<String, String> as serde::Deserialize>::deserialize(deserializer)
            .map(HeaderSet::from_pairs)
    }
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (normalize(k), v.into()))
                .collect(),
        )
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(normalize(key), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&normalize(key)).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(&normalize(key))
    }

    /// Copies every entry of `other` into `self`, overwriting on collision.
    pub fn merge(&mut self, other: &HeaderSet) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

/// Which saved authorization header, if any, a call should carry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthSlot {
    #[default]
    None,
    Basic,
    Bearer,
}

/// Default, service and saved-auth header layers for one service instance.
#[derive(Clone, Debug, Default)]
pub struct HeaderStore {
    default_headers: HeaderSet,
    service_headers: HeaderSet,
    basic_auth_saved: HeaderSet,
    bearer_auth_saved: HeaderSet,
}

impl HeaderStore {
    pub fn new(defaults: HeaderSet) -> Self {
        Self {
            default_headers: defaults,
            ..Self::default()
        }
    }

    /// Merges the built-in defaults into the default layer.
    pub fn add_default_headers(&mut self) {
        self.default_headers.merge(&crate::config::default_headers());
    }

    pub fn set_default_headers(&mut self, headers: HeaderSet) {
        self.default_headers = headers;
    }

    pub fn clear_and_add_default_headers(&mut self) {
        self.default_headers.clear();
        self.add_default_headers();
    }

    pub fn default_headers(&self) -> &HeaderSet {
        &self.default_headers
    }

    pub fn add_service_headers(&mut self, headers: &HeaderSet) {
        self.service_headers.merge(headers);
    }

    pub fn remove_service_header(&mut self, key: &str) {
        self.service_headers.remove(key);
    }

    pub fn clear_service_headers(&mut self) {
        self.service_headers.clear();
    }

    pub fn service_headers(&self) -> &HeaderSet {
        &self.service_headers
    }

    pub fn add_basic_auth(&mut self, username: &str, password: &str) {
        let encoded = STANDARD.encode(format!("{username}:{password}"));
        self.service_headers
            .insert(AUTH_HEADER_KEY, format!("{BASIC_AUTH_PREFIX}{encoded}"));
    }

    pub fn add_bearer_auth(&mut self, token: &str) {
        self.service_headers
            .insert(AUTH_HEADER_KEY, format!("{BEARER_AUTH_PREFIX}{token}"));
    }

    /// Drops the authorization header from the service layer. Saved slots are untouched.
    pub fn clear_all_auth(&mut self) {
        self.service_headers.remove(AUTH_HEADER_KEY);
    }

    /// Copies the current service authorization header into `slot`; no-op when absent.
    pub fn save_auth(&mut self, slot: AuthSlot) {
        let Some(value) = self.service_headers.get(AUTH_HEADER_KEY) else {
            return;
        };
        let saved = HeaderSet::from_pairs([(AUTH_HEADER_KEY, value)]);
        match slot {
            AuthSlot::None => {}
            AuthSlot::Basic => self.basic_auth_saved = saved,
            AuthSlot::Bearer => self.bearer_auth_saved = saved,
        }
    }

    pub fn clear_auth(&mut self, slot: AuthSlot) {
        match slot {
            AuthSlot::None => {}
            AuthSlot::Basic => self.basic_auth_saved.clear(),
            AuthSlot::Bearer => self.bearer_auth_saved.clear(),
        }
    }

    pub fn clear_saved_auth(&mut self) {
        self.clear_auth(AuthSlot::Basic);
        self.clear_auth(AuthSlot::Bearer);
    }

    pub fn saved_auth(&self, slot: AuthSlot) -> Option<&HeaderSet> {
        match slot {
            AuthSlot::None => None,
            AuthSlot::Basic => Some(&self.basic_auth_saved),
            AuthSlot::Bearer => Some(&self.bearer_auth_saved),
        }
    }

    /// Re-adds the saved slot's header to the service layer if the slot is non-empty.
    pub fn apply_auth_from_slot(&mut self, slot: AuthSlot) {
        let saved = match slot {
            AuthSlot::None => return,
            AuthSlot::Basic => &self.basic_auth_saved,
            AuthSlot::Bearer => &self.bearer_auth_saved,
        };
        if saved.is_empty() {
            return;
        }
        let saved = saved.clone();
        self.service_headers.merge(&saved);
        debug!(slot = ?slot, "saved auth header added");
    }

    /// Default layer first, then service layer; service values win on collision.
    pub fn resolve_headers(&self) -> HeaderSet {
        let mut headers = self.default_headers.clone();
        headers.merge(&self.service_headers);
        headers
    }
}
