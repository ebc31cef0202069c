//! Stateless HTTP request builder and response normalizer for the
//! CollectionSpace app layer.
//!
//! # Design
//! `CollectionSpaceApi` holds only a `base_url` and carries no mutable state
//! between calls. Each operation has a `build_*` method that produces an
//! `HttpRequest`; every response goes through the same `parse_response`
//! normalizer. Session bookkeeping lives in `SessionClient`, which pairs this
//! builder with a `Transport`.

use serde::Serialize;
use serde_json::Value;

use crate::config::ClientOptions;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{is_truthy, service_name, short_id_to_csid, ConnectionStatus, RecordPayload, SearchOptions};

const LOGIN_PATH: &str = "/login";
const LOGOUT_PATH: &str = "/logout";
const LOGIN_STATUS_PATH: &str = "/loginstatus";
const RECORD_READ_PATH: &str = "/basic";
const VOCABULARY_PATH: &str = "/termlist";
const AUTHORITY_SEARCH_PATH: &str = "/autocomplete";
const TERMS_USED_PATH: &str = "/authorities";
const SEARCH_PATH: &str = "/search";

/// Synchronous, stateless request builder for one tenant of the app layer.
#[derive(Debug, Clone)]
pub struct CollectionSpaceApi {
    base_url: String,
}

impl CollectionSpaceApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_options(options: &ClientOptions) -> Self {
        Self::new(&options.base_url())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_login(&self, username: &str, password: &str) -> HttpRequest {
        let body = format!(
            "userid={}&password={}",
            urlencoding::encode(username),
            urlencoding::encode(password)
        );
        HttpRequest {
            method: HttpMethod::Post,
            path: format!("{}{LOGIN_PATH}", self.base_url),
            query: Vec::new(),
            headers: vec![(
                "content-type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            body: Some(body),
        }
    }

    pub fn build_login_status(&self) -> HttpRequest {
        HttpRequest::get(format!("{}{LOGIN_STATUS_PATH}", self.base_url))
    }

    pub fn build_logout(&self) -> HttpRequest {
        HttpRequest::get(format!("{}{LOGOUT_PATH}", self.base_url))
    }

    pub fn build_get_record(&self, record_type: &str, csid: &str) -> HttpRequest {
        HttpRequest::get(format!(
            "{}{RECORD_READ_PATH}/{}/{csid}",
            self.base_url,
            service_name(record_type)
        ))
    }

    pub fn build_create_record<T: Serialize + ?Sized>(
        &self,
        record_type: &str,
        data: &T,
    ) -> Result<HttpRequest, ApiError> {
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: format!("{}/{}/", self.base_url, service_name(record_type)),
            query: Vec::new(),
            headers: json_headers(),
            body: Some(to_json(data)?),
        })
    }

    pub fn build_update_record<T: Serialize + ?Sized>(
        &self,
        record_type: &str,
        csid: &str,
        data: &T,
    ) -> Result<HttpRequest, ApiError> {
        Ok(HttpRequest {
            method: HttpMethod::Put,
            path: format!("{}/{}/{csid}", self.base_url, service_name(record_type)),
            query: Vec::new(),
            headers: json_headers(),
            body: Some(to_json(data)?),
        })
    }

    pub fn build_get_vocabulary(&self, short_id: &str) -> HttpRequest {
        HttpRequest::get(format!(
            "{}{VOCABULARY_PATH}/{}",
            self.base_url,
            short_id_to_csid(short_id)
        ))
    }

    /// Autocomplete against the authority bound to `field_name` of
    /// `record_type`.
    pub fn build_find_terms(&self, record_type: &str, field_name: &str, query: &str) -> HttpRequest {
        let mut req = HttpRequest::get(format!(
            "{}/{}{AUTHORITY_SEARCH_PATH}/{field_name}",
            self.base_url,
            service_name(record_type)
        ));
        req.query.push(("q".to_string(), query.to_string()));
        req
    }

    pub fn build_find_terms_used(
        &self,
        record_type: &str,
        csid: &str,
        options: &SearchOptions,
    ) -> HttpRequest {
        let mut req = HttpRequest::get(format!(
            "{}/{}{TERMS_USED_PATH}/{csid}",
            self.base_url,
            service_name(record_type)
        ));
        req.query = options.to_query();
        req
    }

    pub fn build_find_related(
        &self,
        record_type: &str,
        csid: &str,
        related_record_type: &str,
        options: &SearchOptions,
    ) -> HttpRequest {
        let mut req = HttpRequest::get(format!(
            "{}/{}/{}/{csid}",
            self.base_url,
            service_name(record_type),
            service_name(related_record_type)
        ));
        req.query = options.to_query();
        req
    }

    pub fn build_search(&self, record_type: &str, keywords: &str, options: &SearchOptions) -> HttpRequest {
        let mut req = HttpRequest::get(format!(
            "{}/{}{SEARCH_PATH}",
            self.base_url,
            service_name(record_type)
        ));
        req.query.push(("query".to_string(), keywords.to_string()));
        req.query.extend(options.to_query());
        req
    }

    /// Normalize any app-layer response into its payload.
    ///
    /// JSON media types (including the non-standard `text/json`) are parsed;
    /// anything else is returned as a JSON string holding the raw text. An
    /// `isError` payload becomes `ApiError::Api` regardless of status.
    pub fn parse_response(&self, response: HttpResponse) -> Result<RecordPayload, ApiError> {
        let data = decode_body(&response)?;

        if is_error_payload(&data) {
            return Err(api_error(&data));
        }
        if !response.is_success() {
            return Err(ApiError::HttpError {
                status: response.status,
                body: response.body,
            });
        }
        Ok(data)
    }

    pub fn parse_connection_status(&self, response: HttpResponse) -> Result<ConnectionStatus, ApiError> {
        let data = self.parse_response(response)?;
        serde_json::from_value(data).map_err(|e| ApiError::DeserializationError(e.to_string()))
    }
}

fn json_headers() -> Vec<(String, String)> {
    vec![("content-type".to_string(), "application/json".to_string())]
}

fn to_json<T: Serialize + ?Sized>(data: &T) -> Result<String, ApiError> {
    serde_json::to_string(data).map_err(|e| ApiError::SerializationError(e.to_string()))
}

fn is_json_media_type(media_type: &str) -> bool {
    media_type == "application/json" || media_type == "text/json" || media_type.ends_with("+json")
}

fn decode_body(response: &HttpResponse) -> Result<Value, ApiError> {
    let is_json = response
        .media_type()
        .is_some_and(|media_type| is_json_media_type(&media_type));
    if !is_json {
        return Ok(Value::String(response.body.clone()));
    }
    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

fn is_error_payload(data: &Value) -> bool {
    data.get("isError").is_some_and(is_truthy)
}

fn api_error(data: &Value) -> ApiError {
    let message = data
        .get("messages")
        .and_then(Value::as_array)
        .and_then(|messages| messages.first())
        .and_then(|first| first.get("message"))
        .and_then(Value::as_str)
        .map(|message| message.trim().to_string())
        .unwrap_or_default();
    let csid = data.get("csid").and_then(Value::as_str).map(str::to_string);
    ApiError::Api { message, csid }
}
