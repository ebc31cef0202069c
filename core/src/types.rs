//! Domain types for the CollectionSpace app layer.
//!
//! # Design
//! Record payloads stay opaque `serde_json::Value` documents; the client
//! never interprets record fields. `ConnectionStatus` keeps the reported
//! object as-is and reads fields on demand.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Any record, vocabulary, or search result document returned by the server.
pub type RecordPayload = Value;

/// Session state reported by the `/loginstatus` endpoint.
///
/// Only `login` drives session logic and it is read by JSON truthiness.
/// The metadata accessors return `None` when a field is absent or has an
/// unexpected shape, so a live session is never rejected over metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionStatus(Map<String, Value>);

impl ConnectionStatus {
    pub fn login(&self) -> bool {
        self.0.get("login").is_some_and(is_truthy)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.0.get("userId").and_then(Value::as_str)
    }

    pub fn csid(&self) -> Option<&str> {
        self.0.get("csid").and_then(Value::as_str)
    }

    /// Session inactivity timeout in seconds; negative means none.
    pub fn max_inactive(&self) -> Option<i64> {
        self.0.get("maxInactive").and_then(Value::as_i64)
    }

    pub fn permissions(&self) -> Option<&Value> {
        self.0.get("permissions")
    }

    /// Any other field, as reported.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for ConnectionStatus {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// JSON truthiness: `false`, `null`, zero and `""` are false, anything else
/// is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
        Value::Null => false,
    }
}

/// Sort direction for paged queries, encoded as `1`/`0` on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDir {
    #[default]
    Ascending,
    Descending,
}

impl SortDir {
    pub fn as_param(self) -> &'static str {
        match self {
            SortDir::Ascending => "1",
            SortDir::Descending => "0",
        }
    }
}

/// Paging and sorting for `find_terms_used`, `find_related` and `search`.
///
/// Unset fields take the server defaults in `to_query`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    pub page_size: Option<u32>,
    pub page_num: Option<u32>,
    pub sort_key: Option<String>,
    pub sort_dir: Option<SortDir>,
}

impl SearchOptions {
    pub const DEFAULT_PAGE_SIZE: u32 = 40;
    pub const DEFAULT_PAGE_NUM: u32 = 0;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn page_num(mut self, page_num: u32) -> Self {
        self.page_num = Some(page_num);
        self
    }

    pub fn sort_by(mut self, key: impl Into<String>, dir: SortDir) -> Self {
        self.sort_key = Some(key.into());
        self.sort_dir = Some(dir);
        self
    }

    /// Query pairs with defaults filled in. `sortKey` and `sortDir` are
    /// omitted together when no (non-empty) sort key is set.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = vec![
            (
                "pageSize".to_string(),
                self.page_size.unwrap_or(Self::DEFAULT_PAGE_SIZE).to_string(),
            ),
            (
                "pageNum".to_string(),
                self.page_num.unwrap_or(Self::DEFAULT_PAGE_NUM).to_string(),
            ),
        ];
        if let Some(key) = self.sort_key.as_deref().filter(|k| !k.is_empty()) {
            query.push(("sortKey".to_string(), key.to_string()));
            query.push((
                "sortDir".to_string(),
                self.sort_dir.unwrap_or_default().as_param().to_string(),
            ));
        }
        query
    }
}

/// Map a public record-type alias to the service name used on the wire.
///
/// The app layer calls `collectionobject` records "cataloging"; every other
/// type passes through unchanged.
pub fn service_name(record_type: &str) -> &str {
    match record_type {
        "collectionobject" => "cataloging",
        other => other,
    }
}

/// Convert a vocabulary short identifier into the compound identifier
/// accepted by the term-list endpoint.
pub fn short_id_to_csid(short_id: &str) -> String {
    format!("urn:cspace:name({short_id})")
}
