//! In-memory stand-in for the CollectionSpace app layer.
//!
//! Serves one tenant (`core`) with a single account, cookie sessions, and
//! the record, vocabulary, authority and search endpoints the client uses.
//! App-level failures are answered with the app layer's
//! `{"isError": true, "messages": [...]}` payloads.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub const TENANT_PATH: &str = "/collectionspace/tenant/core";
pub const USERNAME: &str = "admin@core.collectionspace.org";
pub const PASSWORD: &str = "Administrator";
pub const SESSION_COOKIE: &str = "CSPACESESSID";

/// Seeded cataloging record.
pub const SEEDED_OBJECT_CSID: &str = "0f72eb05-ebc3-477f-86d0";
/// Seeded media record whose fields reference `SEEDED_OBJECT_CSID`.
pub const SEEDED_MEDIA_CSID: &str = "7a1c2e44-5b0d-4f6e-9c1a";

const USER_CSID: &str = "5f8a2d1e-admin";
const MAX_INACTIVE_SECS: u64 = 1800;
const DEFAULT_PAGE_SIZE: usize = 40;

#[derive(Debug, Clone)]
struct Term {
    display_name: String,
    ref_name: String,
}

impl Term {
    fn person(short_id: &str, display_name: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            ref_name: format!(
                "urn:cspace:core.collectionspace.org:personauthorities:name(person):item:name({short_id})'{display_name}'"
            ),
        }
    }
}

/// Server state: live sessions, records keyed by service name then csid,
/// vocabularies keyed by short id, and one person authority.
#[derive(Debug, Default)]
pub struct Store {
    sessions: HashSet<Uuid>,
    records: HashMap<String, BTreeMap<String, Value>>,
    vocabularies: HashMap<String, Vec<Term>>,
    persons: Vec<Term>,
}

impl Store {
    pub fn seeded() -> Self {
        let persons = vec![
            Term::person("JohnSmith", "John Smith"),
            Term::person("JohnnyAppleseed", "Johnny Appleseed"),
            Term::person("MaryJohnson", "Mary Johnson"),
            Term::person("AdaLovelace", "Ada Lovelace"),
        ];

        let languages = [("eng", "English"), ("fre", "French"), ("ger", "German")]
            .iter()
            .map(|(short_id, label)| Term {
                display_name: label.to_string(),
                ref_name: format!(
                    "urn:cspace:core.collectionspace.org:vocabularies:name(languages):item:name({short_id})'{label}'"
                ),
            })
            .collect();

        let inscriber = persons[0].ref_name.clone();
        let mut store = Self {
            persons,
            ..Self::default()
        };
        store.vocabularies.insert("languages".to_string(), languages);
        store.insert(
            "cataloging",
            SEEDED_OBJECT_CSID,
            json!({
                "objectNumber": "2015.4.24",
                "briefDescriptions": [{ "briefDescription": "Blue glazed vase" }],
                "inscriptionContentInscriber": inscriber,
            }),
        );
        store.insert(
            "media",
            SEEDED_MEDIA_CSID,
            json!({
                "title": "Vase, front view",
                "relatedObject": SEEDED_OBJECT_CSID,
            }),
        );
        store
    }

    fn insert(&mut self, service: &str, csid: &str, fields: Value) {
        self.records
            .entry(service.to_string())
            .or_default()
            .insert(csid.to_string(), json!({ "csid": csid, "fields": fields }));
    }

    fn record(&self, service: &str, csid: &str) -> Option<&Value> {
        self.records.get(service).and_then(|records| records.get(csid))
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    app_with_store(Store::seeded())
}

pub fn app_with_store(store: Store) -> Router {
    let db: Db = Arc::new(RwLock::new(store));
    let api = Router::new()
        .route("/login", post(login))
        .route("/loginstatus", get(login_status))
        .route("/logout", get(logout))
        .route("/basic/{service}/{csid}", get(get_record))
        .route("/termlist/{csid}", get(get_vocabulary))
        .route("/{service}/", post(create_record))
        .route("/{service}/search", get(search))
        .route("/{service}/autocomplete/{field}", get(autocomplete))
        .route("/{service}/authorities/{csid}", get(terms_used))
        .route("/{service}/{id}", put(update_record))
        .route("/{service}/{id}/{csid}", get(related))
        .with_state(db);
    Router::new()
        .nest(TENANT_PATH, api)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct LoginForm {
    pub userid: String,
    pub password: String,
}

fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
        .find_map(|id| Uuid::parse_str(id).ok())
}

async fn is_logged_in(db: &Db, headers: &HeaderMap) -> bool {
    match session_id(headers) {
        Some(id) => db.read().await.sessions.contains(&id),
        None => false,
    }
}

async fn authorize(db: &Db, headers: &HeaderMap) -> Result<(), Response> {
    if is_logged_in(db, headers).await {
        Ok(())
    } else {
        Err(error_payload(StatusCode::UNAUTHORIZED, "Not logged in", None))
    }
}

async fn login(State(db): State<Db>, Form(form): Form<LoginForm>) -> Response {
    if form.userid != USERNAME || form.password != PASSWORD {
        tracing::info!(userid = %form.userid, "rejected login");
        return Html("<html><body>Login failed</body></html>").into_response();
    }

    let id = Uuid::new_v4();
    db.write().await.sessions.insert(id);
    tracing::info!(userid = %form.userid, session = %id, "session opened");
    (
        [(header::SET_COOKIE, format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly"))],
        Html("<html><body>Welcome</body></html>"),
    )
        .into_response()
}

/// Answers with the non-standard `text/json` media type, as the app layer
/// does for this endpoint.
async fn login_status(State(db): State<Db>, headers: HeaderMap) -> Response {
    let body = if is_logged_in(&db, &headers).await {
        json!({
            "login": true,
            "result": "success",
            "userId": USERNAME,
            "csid": USER_CSID,
            "screenName": "Administrator",
            "maxInactive": MAX_INACTIVE_SECS,
            "permissions": {
                "cataloging": ["create", "read", "update", "delete", "list"],
                "media": ["create", "read", "update", "delete", "list"],
                "person": ["read", "list"],
            },
        })
    } else {
        json!({ "login": false, "result": "fail", "maxInactive": 0 })
    };
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/json;charset=UTF-8")],
        body.to_string(),
    )
        .into_response()
}

async fn logout(State(db): State<Db>, headers: HeaderMap) -> Html<&'static str> {
    if let Some(id) = session_id(&headers) {
        db.write().await.sessions.remove(&id);
    }
    Html("<html><body>Logged out</body></html>")
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

fn error_payload(status: StatusCode, message: &str, csid: Option<&str>) -> Response {
    let body = json!({
        "isError": true,
        "csid": csid,
        "messages": [{ "message": message, "severity": "error" }],
    });
    (status, Json(body)).into_response()
}

fn does_not_exist(csid: &str) -> Response {
    // The trailing space mirrors the app layer's message text.
    error_payload(StatusCode::OK, "Does not exist ", Some(csid))
}

async fn get_record(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((service, csid)): Path<(String, String)>,
) -> Result<Json<Value>, Response> {
    authorize(&db, &headers).await?;
    let store = db.read().await;
    store
        .record(&service, &csid)
        .cloned()
        .map(Json)
        .ok_or_else(|| does_not_exist(&csid))
}

fn payload_fields(input: &Value) -> Result<Value, Response> {
    input
        .get("fields")
        .filter(|fields| fields.is_object())
        .cloned()
        .ok_or_else(|| error_payload(StatusCode::BAD_REQUEST, "Record payload has no fields", None))
}

async fn create_record(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(service): Path<String>,
    Json(input): Json<Value>,
) -> Result<Json<Value>, Response> {
    authorize(&db, &headers).await?;
    let fields = payload_fields(&input)?;
    let csid = Uuid::new_v4().to_string();

    let mut store = db.write().await;
    store.insert(&service, &csid, fields);
    tracing::info!(%service, %csid, "record created");
    Ok(Json(store.record(&service, &csid).cloned().unwrap_or_default()))
}

async fn update_record(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((service, csid)): Path<(String, String)>,
    Json(input): Json<Value>,
) -> Result<Json<Value>, Response> {
    authorize(&db, &headers).await?;
    let fields = payload_fields(&input)?;

    let mut store = db.write().await;
    if store.record(&service, &csid).is_none() {
        return Err(does_not_exist(&csid));
    }
    store.insert(&service, &csid, fields);
    Ok(Json(store.record(&service, &csid).cloned().unwrap_or_default()))
}

// ---------------------------------------------------------------------------
// Vocabularies and authorities
// ---------------------------------------------------------------------------

async fn get_vocabulary(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(csid): Path<String>,
) -> Result<Json<Value>, Response> {
    authorize(&db, &headers).await?;
    let store = db.read().await;
    let terms = csid
        .strip_prefix("urn:cspace:name(")
        .and_then(|rest| rest.strip_suffix(')'))
        .and_then(|short_id| store.vocabularies.get(short_id))
        .ok_or_else(|| does_not_exist(&csid))?;

    let options: Vec<Value> = terms
        .iter()
        .map(|term| json!({ "value": term.ref_name, "label": term.display_name }))
        .collect();
    Ok(Json(json!({ "csid": csid, "optionlist": options })))
}

#[derive(Deserialize)]
pub struct AutocompleteQuery {
    #[serde(default)]
    pub q: String,
}

async fn autocomplete(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((_service, _field)): Path<(String, String)>,
    Query(query): Query<AutocompleteQuery>,
) -> Result<Json<Value>, Response> {
    authorize(&db, &headers).await?;
    let needle = query.q.to_lowercase();
    let store = db.read().await;
    let matches: Vec<Value> = store
        .persons
        .iter()
        .filter(|term| term.display_name.to_lowercase().contains(&needle))
        .map(|term| json!({ "displayName": term.display_name, "urn": term.ref_name }))
        .collect();
    Ok(Json(Value::Array(matches)))
}

/// Paging parameters exactly as received; `pagination` in responses echoes
/// them so callers can see what was sent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paging {
    pub page_size: Option<usize>,
    pub page_num: Option<usize>,
    pub sort_key: Option<String>,
    pub sort_dir: Option<u8>,
}

impl Paging {
    fn page(&self, items: Vec<Value>) -> Value {
        let total = items.len();
        let size = match self.page_size.unwrap_or(DEFAULT_PAGE_SIZE) {
            0 => total.max(1),
            n => n,
        };
        let results: Vec<Value> = items
            .into_iter()
            .skip(self.page_num.unwrap_or(0).saturating_mul(size))
            .take(size)
            .collect();
        json!({
            "pagination": {
                "pageSize": self.page_size,
                "pageNum": self.page_num,
                "sortKey": self.sort_key,
                "sortDir": self.sort_dir,
                "totalItems": total,
            },
            "results": results,
        })
    }
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_strings(item, out)),
        _ => {}
    }
}

fn field_strings(record: &Value) -> Vec<&str> {
    let mut out = Vec::new();
    if let Some(fields) = record.get("fields") {
        collect_strings(fields, &mut out);
    }
    out
}

/// Display name embedded in a ref name: the text between the final quotes.
fn display_name(ref_name: &str) -> &str {
    ref_name
        .strip_suffix('\'')
        .and_then(|rest| rest.rfind('\'').map(|start| &rest[start + 1..]))
        .unwrap_or(ref_name)
}

async fn terms_used(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((service, csid)): Path<(String, String)>,
    Query(paging): Query<Paging>,
) -> Result<Json<Value>, Response> {
    authorize(&db, &headers).await?;
    let store = db.read().await;
    let record = store.record(&service, &csid).ok_or_else(|| does_not_exist(&csid))?;

    let terms: Vec<Value> = field_strings(record)
        .into_iter()
        .filter(|s| s.starts_with("urn:cspace:"))
        .map(|ref_name| json!({ "refName": ref_name, "displayName": display_name(ref_name) }))
        .collect();
    Ok(Json(paging.page(terms)))
}

async fn related(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((service, related_service, csid)): Path<(String, String, String)>,
    Query(paging): Query<Paging>,
) -> Result<Json<Value>, Response> {
    authorize(&db, &headers).await?;
    let store = db.read().await;
    if store.record(&service, &csid).is_none() {
        return Err(does_not_exist(&csid));
    }

    let items: Vec<Value> = store
        .records
        .get(&related_service)
        .into_iter()
        .flat_map(|records| records.values())
        .filter(|record| field_strings(record).contains(&csid.as_str()))
        .map(|record| json!({ "csid": record["csid"], "recordtype": related_service }))
        .collect();
    Ok(Json(paging.page(items)))
}

#[derive(Deserialize)]
pub struct KeywordQuery {
    #[serde(default)]
    pub query: String,
}

fn sort_value(record: &Value, key: &str) -> String {
    match &record["fields"][key] {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

async fn search(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(service): Path<String>,
    Query(keywords): Query<KeywordQuery>,
    Query(paging): Query<Paging>,
) -> Result<Json<Value>, Response> {
    authorize(&db, &headers).await?;
    let needle = keywords.query.to_lowercase();
    let store = db.read().await;

    let mut hits: Vec<&Value> = store
        .records
        .get(&service)
        .into_iter()
        .flat_map(|records| records.values())
        .filter(|record| {
            needle.is_empty()
                || field_strings(record)
                    .iter()
                    .any(|s| s.to_lowercase().contains(&needle))
        })
        .collect();

    if let Some(key) = paging.sort_key.as_deref() {
        hits.sort_by_key(|record| sort_value(record, key));
        if paging.sort_dir == Some(0) {
            hits.reverse();
        }
    }

    let items = hits
        .into_iter()
        .map(|record| json!({ "csid": record["csid"], "recordtype": service, "fields": record["fields"] }))
        .collect();
    Ok(Json(paging.page(items)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_found_among_cookies() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            format!("theme=dark; {SESSION_COOKIE}={id}; other=1").parse().unwrap(),
        );
        assert_eq!(session_id(&headers), Some(id));
    }

    #[test]
    fn session_id_rejects_garbage() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, format!("{SESSION_COOKIE}=nope").parse().unwrap());
        assert_eq!(session_id(&headers), None);
        assert_eq!(session_id(&HeaderMap::new()), None);
    }

    #[test]
    fn display_name_from_ref_name() {
        let term = Term::person("JohnSmith", "John Smith");
        assert_eq!(display_name(&term.ref_name), "John Smith");
        assert_eq!(display_name("plain"), "plain");
    }

    #[test]
    fn paging_defaults_and_echo() {
        let items = (0..45).map(|n| json!(n)).collect();
        let page = Paging::default().page(items);
        assert_eq!(page["results"].as_array().unwrap().len(), DEFAULT_PAGE_SIZE);
        assert_eq!(page["pagination"]["totalItems"], 45);
        assert!(page["pagination"]["pageSize"].is_null());
    }

    #[test]
    fn paging_second_page() {
        let paging = Paging {
            page_size: Some(10),
            page_num: Some(4),
            ..Paging::default()
        };
        let page = paging.page((0..45).map(|n| json!(n)).collect());
        assert_eq!(page["results"], json!([40, 41, 42, 43, 44]));
    }

    #[test]
    fn seeded_store_has_related_media() {
        let store = Store::seeded();
        let media = store.record("media", SEEDED_MEDIA_CSID).unwrap();
        assert!(field_strings(media).contains(&SEEDED_OBJECT_CSID));
    }

    #[test]
    fn login_form_parses() {
        let form: LoginForm = serde_json::from_value(json!({ "userid": USERNAME, "password": PASSWORD })).unwrap();
        assert_eq!(form.userid, USERNAME);
    }
}
