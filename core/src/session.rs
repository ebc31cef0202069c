//! Cookie-based login session and the record operations that require it.
//!
//! # Design
//! `SessionClient` owns exactly one `Transport` (and so one cookie jar) and
//! one `SessionState`. The state is replaced as a whole: `connect` and
//! `disconnect` reset it to `Unconfirmed` before asking the server for the
//! authoritative `/loginstatus`, and a fetched status is cached behind an
//! `Arc` so repeated `connection_status` calls hand out the same value.
//! Methods that touch the session take `&mut self`, which keeps callers from
//! overlapping a login with a logout on one instance.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::CollectionSpaceApi;
use crate::config::ClientOptions;
use crate::error::ApiError;
use crate::http::HttpRequest;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{ConnectionStatus, RecordPayload, SearchOptions};

#[derive(Debug, Clone, Default)]
enum SessionState {
    /// No status fetched since construction or the last reset.
    #[default]
    Unconfirmed,
    Confirmed(Arc<ConnectionStatus>),
}

impl SessionState {
    fn status(&self) -> Option<&Arc<ConnectionStatus>> {
        match self {
            SessionState::Unconfirmed => None,
            SessionState::Confirmed(status) => Some(status),
        }
    }

    fn is_logged_in(&self) -> bool {
        self.status().is_some_and(|status| status.login())
    }
}

/// An authenticated conversation with one CollectionSpace tenant.
pub struct SessionClient<T = ReqwestTransport> {
    api: CollectionSpaceApi,
    transport: T,
    state: SessionState,
}

impl SessionClient<ReqwestTransport> {
    /// Build a disconnected client with its own cookie jar.
    ///
    /// `options.host` must be set: without it the base URL is path-only and
    /// no request could be sent.
    pub fn new(options: &ClientOptions) -> Result<Self, ApiError> {
        if options.host.trim().is_empty() {
            return Err(ApiError::Transport("no host configured".to_string()));
        }
        Ok(Self::with_transport(
            CollectionSpaceApi::from_options(options),
            ReqwestTransport::new()?,
        ))
    }
}

impl<T: Transport> SessionClient<T> {
    pub fn with_transport(api: CollectionSpaceApi, transport: T) -> Self {
        Self {
            api,
            transport,
            state: SessionState::Unconfirmed,
        }
    }

    /// Base URL every request is resolved against.
    pub fn url(&self) -> &str {
        self.api.base_url()
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_logged_in()
    }

    /// The logged-in user's id, while connected.
    pub fn username(&self) -> Option<&str> {
        self.state
            .status()
            .filter(|status| status.login())
            .and_then(|status| status.user_id())
    }

    /// Log in, then confirm the login against `/loginstatus`.
    ///
    /// The body of the login response is ignored; only the status endpoint
    /// decides whether the session is live.
    pub async fn connect(&mut self, username: &str, password: &str) -> Result<Arc<ConnectionStatus>, ApiError> {
        let response = self
            .transport
            .execute(self.api.build_login(username, password))
            .await?;
        debug!(status = response.status, "login request completed");

        self.state = SessionState::Unconfirmed;
        let status = self.connection_status().await?;
        if !status.login() {
            warn!(username, url = self.url(), "login was not confirmed by server");
            return Err(ApiError::LoginFailed);
        }

        info!(username, url = self.url(), "connected");
        Ok(status)
    }

    /// The cached session status, fetching it first if nothing is cached.
    pub async fn connection_status(&mut self) -> Result<Arc<ConnectionStatus>, ApiError> {
        if let Some(status) = self.state.status() {
            return Ok(Arc::clone(status));
        }

        let response = self.transport.execute(self.api.build_login_status()).await?;
        let status = Arc::new(self.api.parse_connection_status(response)?);
        self.state = SessionState::Confirmed(Arc::clone(&status));
        Ok(status)
    }

    /// Log out, then confirm against `/loginstatus` that the session ended.
    pub async fn disconnect(&mut self) -> Result<(), ApiError> {
        self.assert_connected()?;

        let response = self.transport.execute(self.api.build_logout()).await?;
        debug!(status = response.status, "logout request completed");

        self.state = SessionState::Unconfirmed;
        let status = self.connection_status().await?;
        if status.login() {
            warn!(url = self.url(), "server still reports an active session after logout");
            return Err(ApiError::LogoutFailed);
        }

        info!(url = self.url(), "disconnected");
        Ok(())
    }

    pub async fn get_record(&self, record_type: &str, csid: &str) -> Result<RecordPayload, ApiError> {
        self.assert_connected()?;
        self.send(self.api.build_get_record(record_type, csid)).await
    }

    pub async fn create_record<D: Serialize + ?Sized>(
        &self,
        record_type: &str,
        data: &D,
    ) -> Result<RecordPayload, ApiError> {
        self.assert_connected()?;
        self.send(self.api.build_create_record(record_type, data)?).await
    }

    pub async fn update_record<D: Serialize + ?Sized>(
        &self,
        record_type: &str,
        csid: &str,
        data: &D,
    ) -> Result<RecordPayload, ApiError> {
        self.assert_connected()?;
        self.send(self.api.build_update_record(record_type, csid, data)?).await
    }

    /// Update when `csid` names a record, create otherwise. An empty id
    /// counts as absent.
    pub async fn save_record<D: Serialize + ?Sized>(
        &self,
        record_type: &str,
        csid: Option<&str>,
        data: &D,
    ) -> Result<RecordPayload, ApiError> {
        match csid.filter(|csid| !csid.is_empty()) {
            Some(csid) => self.update_record(record_type, csid, data).await,
            None => self.create_record(record_type, data).await,
        }
    }

    pub async fn get_vocabulary(&self, short_id: &str) -> Result<RecordPayload, ApiError> {
        self.assert_connected()?;
        self.send(self.api.build_get_vocabulary(short_id)).await
    }

    pub async fn find_terms(
        &self,
        record_type: &str,
        field_name: &str,
        query: &str,
    ) -> Result<RecordPayload, ApiError> {
        self.assert_connected()?;
        self.send(self.api.build_find_terms(record_type, field_name, query))
            .await
    }

    pub async fn find_terms_used(
        &self,
        record_type: &str,
        csid: &str,
        options: &SearchOptions,
    ) -> Result<RecordPayload, ApiError> {
        self.assert_connected()?;
        self.send(self.api.build_find_terms_used(record_type, csid, options))
            .await
    }

    pub async fn find_related(
        &self,
        record_type: &str,
        csid: &str,
        related_record_type: &str,
        options: &SearchOptions,
    ) -> Result<RecordPayload, ApiError> {
        self.assert_connected()?;
        self.send(
            self.api
                .build_find_related(record_type, csid, related_record_type, options),
        )
        .await
    }

    pub async fn search(
        &self,
        record_type: &str,
        keywords: &str,
        options: &SearchOptions,
    ) -> Result<RecordPayload, ApiError> {
        self.assert_connected()?;
        self.send(self.api.build_search(record_type, keywords, options))
            .await
    }

    fn assert_connected(&self) -> Result<(), ApiError> {
        if self.state.is_logged_in() {
            Ok(())
        } else {
            Err(ApiError::NotConnected)
        }
    }

    async fn send(&self, request: HttpRequest) -> Result<RecordPayload, ApiError> {
        let response = self.transport.execute(request).await?;
        self.api.parse_response(response)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::http::{HttpMethod, HttpResponse};

    const BASE: &str = "http://cspace.test:8180/collectionspace/tenant/core";

    /// Replays canned responses in order and records every request.
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<HttpResponse, ApiError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<HttpResponse, ApiError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::default(),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted response left")
        }
    }

    fn html(body: &str) -> Result<HttpResponse, ApiError> {
        Ok(HttpResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: body.to_string(),
        })
    }

    fn text_json(body: serde_json::Value) -> Result<HttpResponse, ApiError> {
        Ok(HttpResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "text/json".to_string())],
            body: body.to_string(),
        })
    }

    fn logged_in() -> Result<HttpResponse, ApiError> {
        text_json(json!({ "login": true, "userId": "admin@core.collectionspace.org", "maxInactive": 1800 }))
    }

    fn logged_out() -> Result<HttpResponse, ApiError> {
        text_json(json!({ "login": false }))
    }

    fn session(responses: Vec<Result<HttpResponse, ApiError>>) -> SessionClient<ScriptedTransport> {
        SessionClient::with_transport(CollectionSpaceApi::new(BASE), ScriptedTransport::new(responses))
    }

    fn sent(client: &SessionClient<ScriptedTransport>) -> Vec<HttpRequest> {
        client.transport.requests.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn connect_confirms_with_status_endpoint() {
        let mut client = session(vec![html("<html>welcome</html>"), logged_in()]);
        let status = client.connect("admin@core.collectionspace.org", "Administrator").await.unwrap();

        assert!(status.login());
        assert!(client.is_connected());
        assert_eq!(client.username(), Some("admin@core.collectionspace.org"));

        let requests = sent(&client);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].path, format!("{BASE}/login"));
        assert_eq!(requests[1].path, format!("{BASE}/loginstatus"));
    }

    #[tokio::test]
    async fn connect_ignores_login_page_heuristics() {
        // A body that looks like success must not count without confirmation.
        let mut client = session(vec![html("<html>login successful</html>"), logged_out()]);
        let err = client.connect("admin@core.collectionspace.org", "wrong").await.unwrap_err();

        assert_eq!(err, ApiError::LoginFailed);
        assert!(!client.is_connected());
        assert!(client.username().is_none());
    }

    #[tokio::test]
    async fn connect_tolerates_odd_status_metadata() {
        let status = text_json(json!({ "login": true, "maxInactive": -1, "csid": 42 }));
        let mut client = session(vec![html(""), status]);
        let status = client.connect("admin@core.collectionspace.org", "Administrator").await.unwrap();

        assert!(status.login());
        assert_eq!(status.max_inactive(), Some(-1));
        assert!(status.csid().is_none());
        assert!(client.is_connected());
        assert!(client.username().is_none());
    }

    #[tokio::test]
    async fn connect_reads_login_by_truthiness() {
        let status = text_json(json!({ "login": 1, "userId": "admin@core.collectionspace.org", "maxInactive": 1800.5 }));
        let mut client = session(vec![html(""), status]);
        client.connect("admin@core.collectionspace.org", "Administrator").await.unwrap();

        assert!(client.is_connected());
        assert_eq!(client.username(), Some("admin@core.collectionspace.org"));
    }

    #[tokio::test]
    async fn connect_transport_failure() {
        let mut client = session(vec![Err(ApiError::Transport("dns error".to_string()))]);
        let err = client.connect("a", "b").await.unwrap_err();
        assert_eq!(err.code(), "ENOTFOUND");
        assert_eq!(sent(&client).len(), 1);
    }

    #[tokio::test]
    async fn connect_refetches_cached_status() {
        let mut client = session(vec![logged_out(), html(""), logged_in()]);
        let before = client.connection_status().await.unwrap();
        assert!(!before.login());

        let after = client.connect("admin@core.collectionspace.org", "Administrator").await.unwrap();
        assert!(after.login());
        assert_eq!(sent(&client).len(), 3);
    }

    #[tokio::test]
    async fn connection_status_is_cached() {
        let mut client = session(vec![logged_out()]);
        let first = client.connection_status().await.unwrap();
        let second = client.connection_status().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(sent(&client).len(), 1);
    }

    #[tokio::test]
    async fn operations_require_connection() {
        let mut client = session(Vec::new());
        let options = SearchOptions::default();

        assert_eq!(client.get_record("collectionobject", "x").await.unwrap_err(), ApiError::NotConnected);
        assert_eq!(client.create_record("collectionobject", &json!({})).await.unwrap_err(), ApiError::NotConnected);
        assert_eq!(client.update_record("collectionobject", "x", &json!({})).await.unwrap_err(), ApiError::NotConnected);
        assert_eq!(client.save_record("collectionobject", None, &json!({})).await.unwrap_err(), ApiError::NotConnected);
        assert_eq!(client.get_vocabulary("languages").await.unwrap_err(), ApiError::NotConnected);
        assert_eq!(client.find_terms("collectionobject", "f", "q").await.unwrap_err(), ApiError::NotConnected);
        assert_eq!(client.find_terms_used("person", "x", &options).await.unwrap_err(), ApiError::NotConnected);
        assert_eq!(client.find_related("collectionobject", "x", "media", &options).await.unwrap_err(), ApiError::NotConnected);
        assert_eq!(client.search("collectionobject", "kw", &options).await.unwrap_err(), ApiError::NotConnected);
        assert_eq!(client.disconnect().await.unwrap_err(), ApiError::NotConnected);

        assert!(sent(&client).is_empty());
    }

    #[tokio::test]
    async fn disconnect_confirms_logout() {
        let mut client = session(vec![html(""), logged_in(), html(""), logged_out()]);
        client.connect("admin@core.collectionspace.org", "Administrator").await.unwrap();
        client.disconnect().await.unwrap();

        assert!(!client.is_connected());
        assert!(client.username().is_none());
        let status = client.connection_status().await.unwrap();
        assert!(!status.login());

        let requests = sent(&client);
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[2].path, format!("{BASE}/logout"));
    }

    #[tokio::test]
    async fn disconnect_fails_when_still_logged_in() {
        let mut client = session(vec![html(""), logged_in(), html(""), logged_in()]);
        client.connect("admin@core.collectionspace.org", "Administrator").await.unwrap();

        let err = client.disconnect().await.unwrap_err();
        assert_eq!(err, ApiError::LogoutFailed);
        assert_eq!(err.to_string(), "logout failed (ELOGOUTFAILED)");
    }

    #[tokio::test]
    async fn save_record_dispatches_on_csid() {
        let record = Ok(HttpResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: r#"{"csid":"abc","fields":{}}"#.to_string(),
        });
        let mut client = session(vec![html(""), logged_in(), record.clone(), record.clone(), record]);
        client.connect("admin@core.collectionspace.org", "Administrator").await.unwrap();

        let data = json!({ "fields": { "objectNumber": "1" } });
        client.save_record("collectionobject", None, &data).await.unwrap();
        client.save_record("collectionobject", Some(""), &data).await.unwrap();
        client.save_record("collectionobject", Some("abc"), &data).await.unwrap();

        let requests = sent(&client);
        assert_eq!(requests[2].method, HttpMethod::Post);
        assert_eq!(requests[3].method, HttpMethod::Post);
        assert_eq!(requests[4].method, HttpMethod::Put);
        assert_eq!(requests[4].path, format!("{BASE}/cataloging/abc"));
    }

    #[tokio::test]
    async fn api_errors_surface_from_record_calls() {
        let missing = Ok(HttpResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: r#"{"isError":true,"csid":"foobar","messages":[{"message":"Does not exist"}]}"#.to_string(),
        });
        let mut client = session(vec![html(""), logged_in(), missing]);
        client.connect("admin@core.collectionspace.org", "Administrator").await.unwrap();

        let err = client.get_record("collectionobject", "foobar").await.unwrap_err();
        assert_eq!(err.code(), "EAPI");
        assert_eq!(err.csid(), Some("foobar"));
        assert!(err.to_string().contains("Does not exist"));
    }

    #[test]
    fn new_requires_host() {
        let err = SessionClient::new(&ClientOptions::default()).err().unwrap();
        assert_eq!(err.code(), "ENOTFOUND");
        assert!(err.to_string().contains("no host configured"));

        assert!(SessionClient::new(&ClientOptions::new("cspace.test")).is_ok());
    }
}
