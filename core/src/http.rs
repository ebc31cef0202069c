//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The
//! `CollectionSpaceApi` builds `HttpRequest` values and normalizes
//! `HttpResponse` values without touching the network; a `Transport`
//! executes the actual I/O. Query parameters are kept apart from the path so
//! the transport owns URL encoding and tests can assert on the raw pairs.

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

/// An HTTP request described as plain data.
///
/// `path` is the absolute URL without a query string; `query` holds the
/// unencoded key/value pairs in the order they are sent.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub(crate) fn get(path: String) -> Self {
        Self {
            method: HttpMethod::Get,
            path,
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Look up a query parameter by exact key.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Full URL with the query string percent-encoded.
    pub fn url(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        format!("{}?{}", self.path, query.join("&"))
    }
}

/// An HTTP response described as plain data.
///
/// Constructed by a `Transport` after executing an `HttpRequest`, then passed
/// to `CollectionSpaceApi::parse_*` for normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// The media type of the body, lowercased and stripped of parameters
    /// such as `charset`.
    pub fn media_type(&self) -> Option<String> {
        self.header("content-type").map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_encodes_query_pairs() {
        let mut req = HttpRequest::get("http://localhost:8180/x/search".to_string());
        req.query.push(("query".to_string(), "blue vase & bowl".to_string()));
        req.query.push(("pageSize".to_string(), "40".to_string()));
        assert_eq!(
            req.url(),
            "http://localhost:8180/x/search?query=blue%20vase%20%26%20bowl&pageSize=40"
        );
    }

    #[test]
    fn url_without_query_is_path() {
        let req = HttpRequest::get("http://localhost:8180/x/loginstatus".to_string());
        assert_eq!(req.url(), "http://localhost:8180/x/loginstatus");
    }

    #[test]
    fn media_type_strips_parameters() {
        let response = HttpResponse {
            status: 200,
            headers: vec![("Content-Type".to_string(), "Text/JSON; charset=UTF-8".to_string())],
            body: String::new(),
        };
        assert_eq!(response.media_type().as_deref(), Some("text/json"));
    }

    #[test]
    fn media_type_absent() {
        let response = HttpResponse {
            status: 204,
            headers: Vec::new(),
            body: String::new(),
        };
        assert!(response.media_type().is_none());
        assert!(response.is_success());
    }
}
