//! In-memory stand-in for the Data API.
//!
//! Every answer uses the `{response, messages}` envelope. Sessions are
//! opened with basic or OAuth headers and checked by bearer token; layouts
//! spring into existence on first write.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Server-side settings of the mock.
#[derive(Clone, Debug)]
pub struct MockConfig {
    pub database: String,
    pub user: String,
    pub password: String,
    pub scripts: Vec<String>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            database: "Shop".to_string(),
            user: "admin".to_string(),
            password: "admin".to_string(),
            scripts: vec!["Recalc".to_string(), "Notify".to_string()],
        }
    }
}

impl MockConfig {
    /// Read `FM_MOCK_USER` / `FM_MOCK_PASSWORD` / `FM_MOCK_DATABASE`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database: std::env::var("FM_MOCK_DATABASE").unwrap_or(defaults.database),
            user: std::env::var("FM_MOCK_USER").unwrap_or(defaults.user),
            password: std::env::var("FM_MOCK_PASSWORD").unwrap_or(defaults.password),
            scripts: defaults.scripts,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Record {
    pub record_id: u64,
    pub mod_id: u64,
    pub field_data: Map<String, Value>,
    pub portal_data: Map<String, Value>,
}

impl Record {
    fn to_json(&self, portals: Option<&[String]>) -> Value {
        let portal_data: Map<String, Value> = self
            .portal_data
            .iter()
            .filter(|(name, _)| portals.map_or(true, |wanted| wanted.contains(name)))
            .map(|(name, rows)| (name.clone(), rows.clone()))
            .collect();
        json!({
            "fieldData": self.field_data,
            "portalData": portal_data,
            "recordId": self.record_id.to_string(),
            "modId": self.mod_id.to_string(),
        })
    }
}

#[derive(Debug, Default)]
pub struct Store {
    pub sessions: HashSet<String>,
    pub layouts: HashMap<String, BTreeMap<u64, Record>>,
    pub globals: Map<String, Value>,
    next_id: u64,
}

impl Store {
    fn next_record_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MockConfig>,
    pub store: Arc<RwLock<Store>>,
}

/// An error envelope with its HTTP status.
#[derive(Debug)]
pub struct Failure {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl Failure {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn invalid_token() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "952", "Invalid FileMaker Data API token (*)")
    }

    fn record_missing() -> Self {
        Self::new(StatusCode::NOT_FOUND, "101", "Record is missing")
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let body = json!({
            "response": {},
            "messages": [{"code": self.code, "message": self.message}],
        });
        (self.status, Json(body)).into_response()
    }
}

type Reply = Result<Json<Value>, Failure>;

fn ok(response: Value) -> Reply {
    Ok(Json(json!({
        "response": response,
        "messages": [{"code": "0", "message": "OK"}],
    })))
}

pub fn app() -> Router {
    app_with(MockConfig::default())
}

pub fn app_with(config: MockConfig) -> Router {
    let state = AppState {
        config: Arc::new(config),
        store: Arc::new(RwLock::new(Store::default())),
    };
    Router::new()
        .route("/{version}/productInfo", get(product_info))
        .route("/{version}/validateSession", get(validate_session))
        .route("/{version}/databases", get(database_names))
        .route("/{version}/databases/{db}/sessions", post(open_session))
        .route("/{version}/databases/{db}/sessions/{token}", delete(close_session))
        .route("/{version}/databases/{db}/layouts", get(layout_names))
        .route("/{version}/databases/{db}/scripts", get(script_names))
        .route("/{version}/databases/{db}/globals", patch(set_globals))
        .route("/{version}/databases/{db}/layouts/{layout}", get(layout_metadata))
        .route("/{version}/databases/{db}/layouts/{layout}/metadata", get(layout_metadata))
        .route(
            "/{version}/databases/{db}/layouts/{layout}/records",
            get(list_records).post(create_record),
        )
        .route(
            "/{version}/databases/{db}/layouts/{layout}/records/{id}",
            get(get_record)
                .post(duplicate_record)
                .patch(edit_record)
                .delete(delete_record),
        )
        .route(
            "/{version}/databases/{db}/layouts/{layout}/records/{id}/containers/{field}",
            post(upload_container),
        )
        .route(
            "/{version}/databases/{db}/layouts/{layout}/records/{id}/containers/{field}/{repetition}",
            post(upload_container_repetition),
        )
        .route("/{version}/databases/{db}/layouts/{layout}/_find", post(find_records))
        .route("/{version}/databases/{db}/layouts/{layout}/script/{script}", get(run_script))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, MockConfig::default()).await
}

pub async fn run_with(listener: TcpListener, config: MockConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(config)).await
}

// --- auth helpers ---

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn basic_auth_matches(headers: &HeaderMap, config: &MockConfig) -> bool {
    let Some(encoded) = header_str(headers, "authorization").and_then(|v| v.strip_prefix("Basic ")) else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(encoded) else {
        return false;
    };
    String::from_utf8_lossy(&decoded) == format!("{}:{}", config.user, config.password)
}

fn oauth_present(headers: &HeaderMap) -> bool {
    header_str(headers, "x-fm-data-login-type") == Some("oauth")
        && header_str(headers, "x-fm-data-oauth-request-id").is_some_and(|v| !v.is_empty())
        && header_str(headers, "x-fm-data-oauth-identifier").is_some_and(|v| !v.is_empty())
}

async fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), Failure> {
    let token = header_str(headers, "authorization")
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(Failure::invalid_token)?;
    if state.store.read().await.sessions.contains(token) {
        Ok(())
    } else {
        Err(Failure::invalid_token())
    }
}

fn check_database(state: &AppState, db: &str) -> Result<(), Failure> {
    if db == state.config.database {
        Ok(())
    } else {
        Err(Failure::new(StatusCode::INTERNAL_SERVER_ERROR, "802", "Unable to open file"))
    }
}

// --- sessions & metadata ---

async fn open_session(
    State(state): State<AppState>,
    Path((_version, db)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    check_database(&state, &db)?;
    if !basic_auth_matches(&headers, &state.config) && !oauth_present(&headers) {
        return Err(Failure::new(
            StatusCode::UNAUTHORIZED,
            "212",
            "Invalid user account and/or password; please try again",
        ));
    }

    let token = Uuid::new_v4().simple().to_string();
    state.store.write().await.sessions.insert(token.clone());
    tracing::info!(database = %db, "session_opened");

    let mut response = ok(json!({"token": token}))?.into_response();
    if let Ok(value) = HeaderValue::from_str(&token) {
        response.headers_mut().insert("X-FM-Data-Access-Token", value);
    }
    Ok(response)
}

async fn close_session(
    State(state): State<AppState>,
    Path((_version, _db, token)): Path<(String, String, String)>,
) -> Reply {
    if state.store.write().await.sessions.remove(&token) {
        tracing::info!("session_closed");
        ok(json!({}))
    } else {
        Err(Failure::invalid_token())
    }
}

async fn validate_session(State(state): State<AppState>, headers: HeaderMap) -> Reply {
    authorize(&state, &headers).await?;
    ok(json!({}))
}

async fn product_info(Path(version): Path<String>) -> Reply {
    ok(json!({"productInfo": {"name": "Mock Data API", "version": version}}))
}

async fn database_names(State(state): State<AppState>, headers: HeaderMap) -> Reply {
    if !basic_auth_matches(&headers, &state.config) && !oauth_present(&headers) {
        return Err(Failure::new(StatusCode::UNAUTHORIZED, "212", "Invalid user account and/or password"));
    }
    ok(json!({"databases": [{"name": state.config.database}]}))
}

async fn layout_names(
    State(state): State<AppState>,
    Path((_version, db)): Path<(String, String)>,
    headers: HeaderMap,
) -> Reply {
    check_database(&state, &db)?;
    authorize(&state, &headers).await?;
    let store = state.store.read().await;
    let mut names: Vec<&String> = store.layouts.keys().collect();
    names.sort();
    let layouts: Vec<Value> = names.into_iter().map(|name| json!({"name": name})).collect();
    ok(json!({"layouts": layouts}))
}

async fn script_names(
    State(state): State<AppState>,
    Path((_version, db)): Path<(String, String)>,
    headers: HeaderMap,
) -> Reply {
    check_database(&state, &db)?;
    authorize(&state, &headers).await?;
    let scripts: Vec<Value> = state
        .config
        .scripts
        .iter()
        .map(|name| json!({"name": name, "isFolder": false}))
        .collect();
    ok(json!({"scripts": scripts}))
}

async fn layout_metadata(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Reply {
    let param = |key: &str| params.get(key).cloned().unwrap_or_default();
    check_database(&state, &param("db"))?;
    authorize(&state, &headers).await?;

    let store = state.store.read().await;
    let records = store.layouts.get(&param("layout"));
    if let Some(id) = query.get("recordId") {
        let known = id
            .parse::<u64>()
            .ok()
            .and_then(|id| records.and_then(|r| r.get(&id)))
            .is_some();
        if !known {
            return Err(Failure::record_missing());
        }
    }

    let mut fields: Vec<&String> = records
        .into_iter()
        .flat_map(|records| records.values())
        .flat_map(|record| record.field_data.keys())
        .collect();
    fields.sort();
    fields.dedup();
    let field_meta: Vec<Value> = fields
        .into_iter()
        .map(|name| json!({"name": name, "type": "normal", "result": "text"}))
        .collect();
    ok(json!({"fieldMetaData": field_meta, "portalMetaData": {}}))
}

#[derive(Deserialize)]
struct GlobalsBody {
    #[serde(rename = "globalFields")]
    global_fields: Map<String, Value>,
}

async fn set_globals(
    State(state): State<AppState>,
    Path((_version, db)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<GlobalsBody>,
) -> Reply {
    check_database(&state, &db)?;
    authorize(&state, &headers).await?;
    state.store.write().await.globals.extend(body.global_fields);
    ok(json!({}))
}

// --- records ---

type LayoutPath = Path<(String, String, String)>;
type RecordPath = Path<(String, String, String, String)>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordBody {
    #[serde(default)]
    field_data: Map<String, Value>,
    #[serde(default)]
    portal_data: Map<String, Value>,
    #[serde(default)]
    mod_id: Option<Value>,
}

async fn create_record(
    State(state): State<AppState>,
    Path((_version, db, layout)): LayoutPath,
    headers: HeaderMap,
    Json(body): Json<RecordBody>,
) -> Reply {
    check_database(&state, &db)?;
    authorize(&state, &headers).await?;

    let mut store = state.store.write().await;
    let record_id = store.next_record_id();
    let record = Record {
        record_id,
        mod_id: 0,
        field_data: body.field_data,
        portal_data: body.portal_data,
    };
    store.layouts.entry(layout).or_default().insert(record_id, record);
    ok(json!({"recordId": record_id.to_string(), "modId": "0"}))
}

fn parse_record_id(id: &str) -> Result<u64, Failure> {
    id.parse().map_err(|_| Failure::record_missing())
}

fn portal_filter(query: &HashMap<String, String>) -> Option<Vec<String>> {
    query
        .get("portal")
        .and_then(|text| serde_json::from_str(text).ok())
}

async fn get_record(
    State(state): State<AppState>,
    Path((_version, db, layout, id)): RecordPath,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Reply {
    check_database(&state, &db)?;
    authorize(&state, &headers).await?;

    let id = parse_record_id(&id)?;
    let store = state.store.read().await;
    let record = store
        .layouts
        .get(&layout)
        .and_then(|records| records.get(&id))
        .ok_or_else(Failure::record_missing)?;
    let portals = portal_filter(&query);
    ok(json!({
        "data": [record.to_json(portals.as_deref())],
        "dataInfo": {"database": db, "layout": layout, "foundCount": 1, "returnedCount": 1},
    }))
}

async fn duplicate_record(
    State(state): State<AppState>,
    Path((_version, db, layout, id)): RecordPath,
    headers: HeaderMap,
) -> Reply {
    check_database(&state, &db)?;
    authorize(&state, &headers).await?;

    let id = parse_record_id(&id)?;
    let mut store = state.store.write().await;
    let original = store
        .layouts
        .get(&layout)
        .and_then(|records| records.get(&id))
        .cloned()
        .ok_or_else(Failure::record_missing)?;
    let record_id = store.next_record_id();
    let copy = Record {
        record_id,
        mod_id: 0,
        ..original
    };
    store.layouts.entry(layout).or_default().insert(record_id, copy);
    ok(json!({"recordId": record_id.to_string(), "modId": "0"}))
}

async fn edit_record(
    State(state): State<AppState>,
    Path((_version, db, layout, id)): RecordPath,
    headers: HeaderMap,
    Json(body): Json<RecordBody>,
) -> Reply {
    check_database(&state, &db)?;
    authorize(&state, &headers).await?;

    let id = parse_record_id(&id)?;
    let mut store = state.store.write().await;
    let record = store
        .layouts
        .get_mut(&layout)
        .and_then(|records| records.get_mut(&id))
        .ok_or_else(Failure::record_missing)?;

    if let Some(expected) = body.mod_id.as_ref().map(value_text) {
        if expected != record.mod_id.to_string() {
            return Err(Failure::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "306",
                "Record modification ID does not match",
            ));
        }
    }
    record.field_data.extend(body.field_data);
    record.portal_data.extend(body.portal_data);
    record.mod_id += 1;
    ok(json!({"modId": record.mod_id.to_string()}))
}

async fn delete_record(
    State(state): State<AppState>,
    Path((_version, db, layout, id)): RecordPath,
    headers: HeaderMap,
) -> Reply {
    check_database(&state, &db)?;
    authorize(&state, &headers).await?;

    let id = parse_record_id(&id)?;
    let mut store = state.store.write().await;
    store
        .layouts
        .get_mut(&layout)
        .and_then(|records| records.remove(&id))
        .ok_or_else(Failure::record_missing)?;
    ok(json!({}))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SortRule {
    field_name: String,
    #[serde(default)]
    sort_order: Option<String>,
}

/// Sort and paging options of a list or find request.
#[derive(Default)]
struct Page<'a> {
    sort: Option<&'a str>,
    /// One-based, like the real server.
    offset: Option<usize>,
    limit: Option<usize>,
    portals: Option<&'a [String]>,
}

/// Sort, page and wrap a found set.
fn found_set(mut records: Vec<Record>, total: usize, page: Page<'_>, db: &str, layout: &str) -> Value {
    if let Some(rules) = page.sort.and_then(|text| serde_json::from_str::<Vec<SortRule>>(text).ok()) {
        records.sort_by(|a, b| {
            for rule in &rules {
                let left = a.field_data.get(&rule.field_name).map(value_text).unwrap_or_default();
                let right = b.field_data.get(&rule.field_name).map(value_text).unwrap_or_default();
                let ordering = if rule.sort_order.as_deref() == Some("descend") {
                    right.cmp(&left)
                } else {
                    left.cmp(&right)
                };
                if ordering.is_ne() {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });
    }

    let found = records.len();
    let skip = page.offset.unwrap_or(1).saturating_sub(1);
    let data: Vec<Value> = records
        .iter()
        .skip(skip)
        .take(page.limit.unwrap_or(100))
        .map(|record| record.to_json(page.portals))
        .collect();

    json!({
        "data": data,
        "dataInfo": {
            "database": db,
            "layout": layout,
            "totalRecordCount": total,
            "foundCount": found,
            "returnedCount": data.len(),
        },
    })
}

async fn list_records(
    State(state): State<AppState>,
    Path((_version, db, layout)): LayoutPath,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Reply {
    check_database(&state, &db)?;
    authorize(&state, &headers).await?;

    let store = state.store.read().await;
    let records: Vec<Record> = store
        .layouts
        .get(&layout)
        .map(|records| records.values().cloned().collect())
        .unwrap_or_default();
    let total = records.len();
    let number = |key: &str| query.get(key).and_then(|v| v.parse::<usize>().ok());
    let portals = portal_filter(&query);

    let page = Page {
        sort: query.get("_sort").map(String::as_str),
        offset: number("_offset"),
        limit: number("_limit"),
        portals: portals.as_deref(),
    };
    ok(found_set(records, total, page, &db, &layout))
}

#[derive(Deserialize)]
struct FindBody {
    query: Vec<Map<String, Value>>,
    #[serde(default)]
    sort: Option<Value>,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    portal: Option<Vec<String>>,
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `==x` and `=x` match exactly; anything else matches case-insensitively
/// at the start of the field value.
fn criterion_matches(field: Option<&Value>, criterion: &Value) -> bool {
    let actual = field.map(value_text).unwrap_or_default();
    let wanted = value_text(criterion);
    if let Some(exact) = wanted.strip_prefix("==").or_else(|| wanted.strip_prefix('=')) {
        actual == exact
    } else {
        actual.to_lowercase().starts_with(&wanted.to_lowercase())
    }
}

fn request_matches(record: &Record, request: &Map<String, Value>) -> bool {
    request
        .iter()
        .filter(|(key, _)| key.as_str() != "omit")
        .all(|(key, criterion)| criterion_matches(record.field_data.get(key), criterion))
}

async fn find_records(
    State(state): State<AppState>,
    Path((_version, db, layout)): LayoutPath,
    headers: HeaderMap,
    Json(body): Json<FindBody>,
) -> Reply {
    check_database(&state, &db)?;
    authorize(&state, &headers).await?;

    let store = state.store.read().await;
    let all: Vec<Record> = store
        .layouts
        .get(&layout)
        .map(|records| records.values().cloned().collect())
        .unwrap_or_default();
    let total = all.len();

    let is_omit = |request: &Map<String, Value>| request.get("omit").map(value_text).as_deref() == Some("true");
    let (omits, finds): (Vec<_>, Vec<_>) = body.query.iter().partition(|request| is_omit(*request));

    let found: Vec<Record> = all
        .into_iter()
        .filter(|record| finds.is_empty() || finds.iter().any(|request| request_matches(record, request)))
        .filter(|record| !omits.iter().any(|request| request_matches(record, request)))
        .collect();

    if found.is_empty() {
        tracing::debug!(layout = %layout, "find_no_records");
        return Err(Failure::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "401",
            "No records match the request",
        ));
    }

    let sort = body.sort.as_ref().map(|sort| match sort {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    });
    let page = Page {
        sort: sort.as_deref(),
        offset: body.offset,
        limit: body.limit,
        portals: body.portal.as_deref(),
    };
    ok(found_set(found, total, page, &db, &layout))
}

async fn run_script(
    State(state): State<AppState>,
    Path((_version, db, _layout, script)): RecordPath,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Reply {
    check_database(&state, &db)?;
    authorize(&state, &headers).await?;

    if !state.config.scripts.contains(&script) {
        return Err(Failure::new(StatusCode::INTERNAL_SERVER_ERROR, "104", "Script is missing"));
    }
    let result = query.get("script.param").cloned().unwrap_or_default();
    ok(json!({"scriptResult": result, "scriptError": "0"}))
}

async fn store_upload(
    state: &AppState,
    layout: &str,
    id: &str,
    field: String,
    mut multipart: Multipart,
) -> Reply {
    let id = parse_record_id(id)?;
    let mut uploaded = None;
    while let Ok(Some(part)) = multipart.next_field().await {
        if part.name() != Some("upload") {
            continue;
        }
        let file_name = part.file_name().unwrap_or("upload").to_string();
        let size = part.bytes().await.map(|bytes| bytes.len()).unwrap_or_default();
        uploaded = Some((file_name, size));
    }
    let Some((file_name, size)) = uploaded else {
        return Err(Failure::new(StatusCode::BAD_REQUEST, "10", "Requested data is missing"));
    };

    let mut store = state.store.write().await;
    let record = store
        .layouts
        .get_mut(layout)
        .and_then(|records| records.get_mut(&id))
        .ok_or_else(Failure::record_missing)?;
    record.field_data.insert(field, json!(file_name));
    record.mod_id += 1;
    tracing::debug!(size, "container_uploaded");
    ok(json!({"modId": record.mod_id.to_string()}))
}

async fn upload_container(
    State(state): State<AppState>,
    Path((_version, db, layout, id, field)): Path<(String, String, String, String, String)>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Reply {
    check_database(&state, &db)?;
    authorize(&state, &headers).await?;
    store_upload(&state, &layout, &id, field, multipart).await
}

async fn upload_container_repetition(
    State(state): State<AppState>,
    Path((_version, db, layout, id, field, repetition)): Path<(String, String, String, String, String, u32)>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Reply {
    check_database(&state, &db)?;
    authorize(&state, &headers).await?;
    store_upload(&state, &layout, &id, format!("{field}({repetition})"), multipart).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: Value) -> Record {
        Record {
            record_id: 1,
            mod_id: 0,
            field_data: fields.as_object().unwrap().clone(),
            portal_data: Map::new(),
        }
    }

    #[test]
    fn exact_and_prefix_criteria() {
        let r = record(json!({"city": "Paris", "qty": 3}));
        assert!(request_matches(&r, json!({"city": "par"}).as_object().unwrap()));
        assert!(request_matches(&r, json!({"city": "==Paris"}).as_object().unwrap()));
        assert!(!request_matches(&r, json!({"city": "==Par"}).as_object().unwrap()));
        assert!(request_matches(&r, json!({"qty": 3, "omit": "true"}).as_object().unwrap()));
    }

    #[test]
    fn found_set_pages_with_one_based_offset() {
        let records: Vec<Record> = (1..=5)
            .map(|n| Record {
                record_id: n,
                ..record(json!({"n": n}))
            })
            .collect();
        let page = Page {
            offset: Some(2),
            limit: Some(2),
            ..Page::default()
        };
        let value = found_set(records, 5, page, "Shop", "L");
        assert_eq!(value["data"][0]["recordId"], "2");
        assert_eq!(value["dataInfo"]["returnedCount"], 2);
        assert_eq!(value["dataInfo"]["foundCount"], 5);
    }

    #[test]
    fn found_set_sorts_descending() {
        let records = vec![
            Record { record_id: 1, ..record(json!({"name": "a"})) },
            Record { record_id: 2, ..record(json!({"name": "c"})) },
            Record { record_id: 3, ..record(json!({"name": "b"})) },
        ];
        let page = Page {
            sort: Some(r#"[{"fieldName":"name","sortOrder":"descend"}]"#),
            ..Page::default()
        };
        let value = found_set(records, 3, page, "Shop", "L");
        let names: Vec<&str> = value["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["fieldData"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[test]
    fn portal_filter_limits_portals() {
        let mut r = record(json!({}));
        r.portal_data.insert("Lines".to_string(), json!([{"sku": "A"}]));
        r.portal_data.insert("Notes".to_string(), json!([]));
        let wanted = vec!["Lines".to_string()];
        let value = r.to_json(Some(&wanted));
        assert!(value["portalData"].get("Lines").is_some());
        assert!(value["portalData"].get("Notes").is_none());
    }
}
