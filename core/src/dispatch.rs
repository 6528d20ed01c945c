//! Request assembly and response normalization.
//!
//! # Design
//! `RequestDispatcher` holds only the base URL. `build` turns a method, a
//! path and `RequestOptions` into an `HttpRequest`; `normalize` turns the
//! server's `{response, messages}` envelope into the value callers see.
//! `request` glues the two around a `Transport`. Keeping the steps apart
//! lets tests check either side without a network.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use url::Url;

use crate::error::{DataApiError, Result};
use crate::http::{clean_token, HttpBody, HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::options::JsonOptions;
use crate::types::FileUpload;

/// Message code the server uses for "no records match the request".
const CODE_NO_RECORDS: &str = "401";
const CODE_OK: &str = "0";
const CODE_NO_RESULT: &str = "10";

/// Characters `encodeURI` escapes besides controls and non-ASCII. Reserved
/// URI characters (`/ ? # & = ...`) pass through, `%` does not.
const URI_PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Everything a call contributes to the request besides method and path.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: Vec<(String, String)>,
    /// Encoded into the URL query string.
    pub query_params: Option<JsonOptions>,
    /// Encoded into the JSON body; ignored for GET.
    pub json: Option<JsonOptions>,
    /// Sent as multipart field `upload`; only for POST.
    pub file: Option<FileUpload>,
}

impl RequestOptions {
    pub fn with_headers(headers: Vec<(String, String)>) -> Self {
        Self {
            headers,
            ..Self::default()
        }
    }

    pub fn query(mut self, params: JsonOptions) -> Self {
        self.query_params = Some(params);
        self
    }

    pub fn json(mut self, body: JsonOptions) -> Self {
        self.json = Some(body);
        self
    }

    pub fn file(mut self, file: FileUpload) -> Self {
        self.file = Some(file);
        self
    }
}

/// One server message: `{code, message}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// The server's response envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Envelope {
    fn first_code(&self) -> Option<&str> {
        self.messages.first().map(|m| m.code.as_str())
    }
}

/// Builds requests against one Data API host and normalizes its answers.
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    base_url: String,
}

impl RequestDispatcher {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build, send and normalize one call.
    ///
    /// With `full_response` the whole `response` object is returned instead
    /// of its most specific member.
    pub fn request<T: Transport + ?Sized>(
        &self,
        transport: &T,
        method: HttpMethod,
        path: &str,
        options: RequestOptions,
        full_response: bool,
    ) -> Result<Value> {
        let request = self.build(method, path, options)?;
        let route = loggable_path(path);
        tracing::debug!(method = method.as_str(), path = %route, "request_dispatched");
        let response = transport.execute(&request)?;
        tracing::debug!(method = method.as_str(), path = %route, status = response.status, "response_received");
        self.normalize(path, response, full_response)
    }

    pub fn build(&self, method: HttpMethod, path: &str, options: RequestOptions) -> Result<HttpRequest> {
        let encoded = utf8_percent_encode(path, URI_PATH).to_string();
        let mut url = Url::parse(&format!("{}{encoded}", self.base_url))
            .map_err(|e| DataApiError::RequestBuild(format!("invalid url {}{encoded}: {e}", self.base_url)))?;
        if let Some(params) = options.query_params.as_ref().filter(|p| !p.is_empty()) {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                match value {
                    Value::Array(values) => {
                        for value in values {
                            pairs.append_pair(key, &query_value(value));
                        }
                    }
                    other => {
                        pairs.append_pair(key, &query_value(other));
                    }
                }
            }
        }

        let mut headers: Vec<(String, String)> = options
            .headers
            .into_iter()
            .map(|(key, value)| (clean_token(&key), value))
            .collect();
        if !headers.iter().any(|(key, _)| key.eq_ignore_ascii_case("content-type")) {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        let mut body = None;
        if method == HttpMethod::Post {
            if let Some(file) = options.file.as_ref() {
                body = Some(multipart_upload(file)?);
            }
        }
        if body.is_none() && method != HttpMethod::Get {
            if let Some(json) = options.json.as_ref() {
                body = Some(HttpBody::Json(encode_json_body(json)?));
            }
        }

        // The multipart payload carries its own boundary, which the
        // caller-facing JSON content type cannot express on the wire.
        if let Some(multipart @ HttpBody::Multipart { .. }) = body.as_ref() {
            for (key, value) in headers.iter_mut() {
                if key.eq_ignore_ascii_case("content-type") {
                    *value = multipart.content_type();
                }
            }
        }

        Ok(HttpRequest {
            method,
            url: url.into(),
            headers,
            body,
        })
    }

    /// Turn a raw response into the value handed back to the caller.
    pub fn normalize(&self, path: &str, response: HttpResponse, full_response: bool) -> Result<Value> {
        let envelope: Envelope = serde_json::from_str(&response.body).map_err(|e| {
            if response.is_success() {
                DataApiError::Deserialization(e.to_string())
            } else {
                DataApiError::Api {
                    code: response.status.to_string(),
                    message: response.body.clone(),
                }
            }
        })?;

        if response.is_success() {
            Ok(normalize_success(envelope, full_response))
        } else {
            normalize_failure(path, envelope, response.status)
        }
    }
}

fn normalize_success(envelope: Envelope, full_response: bool) -> Value {
    let code = envelope.first_code().map(str::to_string);
    let Some(response) = envelope.response else {
        return Value::Null;
    };
    if full_response {
        return response;
    }

    for key in ["data", "recordId", "modId"] {
        if let Some(value) = response.get(key) {
            return value.clone();
        }
    }

    if response.as_array().is_some_and(Vec::is_empty) {
        match code.as_deref() {
            Some(CODE_OK) => return Value::Bool(true),
            Some(CODE_NO_RESULT) => return Value::Bool(false),
            _ => {}
        }
    }
    response
}

fn normalize_failure(path: &str, envelope: Envelope, status: u16) -> Result<Value> {
    let first = envelope.messages.into_iter().next();
    match first {
        Some(message) if path.contains("_find") && message.code == CODE_NO_RECORDS => {
            tracing::debug!(path, "find_no_records");
            Ok(json!({"data": {}, "dataInfo": {"foundCount": 0}}))
        }
        Some(message) => Err(DataApiError::Api {
            code: message.code,
            message: message.message,
        }),
        None => Err(DataApiError::Api {
            code: status.to_string(),
            message: "empty error envelope".to_string(),
        }),
    }
}

/// Re-encode options into a JSON object.
///
/// String values that already hold JSON text are embedded as JSON; every
/// other value is JSON-encoded. Keys are written verbatim, so a key that
/// breaks the object syntax fails the build.
fn encode_json_body(options: &JsonOptions) -> Result<String> {
    let members: Vec<String> = options
        .iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) if serde_json::from_str::<Value>(s).is_ok() => s.clone(),
                other => other.to_string(),
            };
            format!("\"{key}\":{text}")
        })
        .collect();
    let text = format!("{{{}}}", members.join(","));

    let object: Map<String, Value> = serde_json::from_str(&text)
        .map_err(|e| DataApiError::RequestBuild(format!("failed to json encode parameters: {e}")))?;
    serde_json::to_string(&object).map_err(|e| DataApiError::RequestBuild(e.to_string()))
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Path as it may appear in logs: the token segment of
/// `/sessions/{token}` is masked.
fn loggable_path(path: &str) -> String {
    match path.split_once("/sessions/") {
        Some((prefix, _)) => format!("{prefix}/sessions/***"),
        None => path.to_string(),
    }
}

fn multipart_upload(file: &FileUpload) -> Result<HttpBody> {
    if [&file.name, &file.content_type]
        .iter()
        .any(|value| value.contains(['\r', '\n']))
    {
        return Err(DataApiError::RequestBuild(
            "line breaks are not allowed in upload name or content type".to_string(),
        ));
    }
    let boundary = format!("fmdata-{}", uuid::Uuid::new_v4().simple());
    let filename = file.name.replace('"', "");

    let mut bytes = Vec::with_capacity(file.bytes.len() + 256);
    bytes.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    bytes.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"upload\"; filename=\"{filename}\"\r\n").as_bytes(),
    );
    bytes.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
    bytes.extend_from_slice(&file.bytes);
    bytes.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Ok(HttpBody::Multipart { boundary, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> RequestDispatcher {
        RequestDispatcher::new("https://fm.example.com/fmi/data/")
    }

    fn response(status: u16, body: Value) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    fn options(value: Value) -> JsonOptions {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn build_get_appends_query_string() {
        let req = dispatcher()
            .build(
                HttpMethod::Get,
                "/v1/databases/Shop/layouts/Order List/records",
                RequestOptions::default().query(options(json!({"_limit": 10, "portal": "[\"Lines\"]"}))),
            )
            .unwrap();

        assert_eq!(req.method, HttpMethod::Get);
        assert!(req
            .url
            .starts_with("https://fm.example.com/fmi/data/v1/databases/Shop/layouts/Order%20List/records?"));
        assert!(req.url.contains("_limit=10"));
        assert!(req.url.contains("portal=%5B%22Lines%22%5D"));
        assert!(req.body.is_none());
    }

    #[test]
    fn array_query_values_repeat_the_key() {
        let req = dispatcher()
            .build(
                HttpMethod::Get,
                "/v1/productInfo",
                RequestOptions::default().query(options(json!({"tag": ["a", "b"]}))),
            )
            .unwrap();
        assert!(req.url.ends_with("?tag=a&tag=b"));
    }

    #[test]
    fn empty_query_params_leave_url_bare() {
        let req = dispatcher()
            .build(HttpMethod::Get, "/v1/productInfo", RequestOptions::default().query(JsonOptions::new()))
            .unwrap();
        assert_eq!(req.url, "https://fm.example.com/fmi/data/v1/productInfo");
    }

    #[test]
    fn content_type_defaults_to_json_and_keys_are_cleaned() {
        let req = dispatcher()
            .build(
                HttpMethod::Get,
                "/v1/productInfo",
                RequestOptions::with_headers(vec![(" \"Authorization\" ".to_string(), "Bearer t".to_string())]),
            )
            .unwrap();
        assert_eq!(req.header("Authorization"), Some("Bearer t"));
        assert_eq!(req.header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn caller_content_type_is_kept() {
        let req = dispatcher()
            .build(
                HttpMethod::Post,
                "/v1/x",
                RequestOptions::with_headers(vec![("content-type".to_string(), "text/plain".to_string())]),
            )
            .unwrap();
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.header("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn json_body_embeds_json_text_values() {
        let req = dispatcher()
            .build(
                HttpMethod::Post,
                "/v1/databases/Shop/layouts/Orders/records",
                RequestOptions::default().json(options(json!({
                    "fieldData": "{\"qty\":2}",
                    "script": "Log",
                    "limit": 5
                }))),
            )
            .unwrap();

        let Some(HttpBody::Json(text)) = req.body else {
            panic!("expected json body");
        };
        let body: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(body, json!({"fieldData": {"qty": 2}, "script": "Log", "limit": 5}));
    }

    #[test]
    fn get_requests_never_carry_a_body() {
        let req = dispatcher()
            .build(HttpMethod::Get, "/v1/productInfo", RequestOptions::default().json(JsonOptions::new()))
            .unwrap();
        assert!(req.body.is_none());
    }

    #[test]
    fn empty_json_options_send_empty_object() {
        let req = dispatcher()
            .build(HttpMethod::Post, "/v1/databases/Shop/sessions", RequestOptions::default().json(JsonOptions::new()))
            .unwrap();
        assert_eq!(req.body, Some(HttpBody::Json("{}".to_string())));
    }

    #[test]
    fn key_breaking_json_syntax_fails_the_build() {
        let err = dispatcher()
            .build(HttpMethod::Post, "/v1/x", RequestOptions::default().json(options(json!({"bad\"key": 1}))))
            .unwrap_err();
        assert!(matches!(err, DataApiError::RequestBuild(_)));
    }

    #[test]
    fn file_upload_becomes_multipart() {
        let file = FileUpload::new("photo.png", b"PNGDATA".to_vec()).with_content_type("image/png");
        let req = dispatcher()
            .build(
                HttpMethod::Post,
                "/v1/databases/Shop/layouts/Items/records/1/containers/Photo",
                RequestOptions::default().file(file),
            )
            .unwrap();

        let Some(HttpBody::Multipart { boundary, bytes }) = req.body.clone() else {
            panic!("expected multipart body");
        };
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("name=\"upload\"; filename=\"photo.png\""));
        assert!(text.contains("PNGDATA"));
        assert!(text.ends_with(&format!("--{boundary}--\r\n")));
        assert_eq!(
            req.header("Content-Type").map(str::to_string),
            Some(format!("multipart/form-data; boundary={boundary}"))
        );
    }

    #[test]
    fn file_is_ignored_for_non_post() {
        let req = dispatcher()
            .build(HttpMethod::Patch, "/v1/x", RequestOptions::default().file(FileUpload::new("a", vec![1])))
            .unwrap();
        assert!(req.body.is_none());
    }

    #[test]
    fn success_returns_data_array() {
        let value = dispatcher()
            .normalize(
                "/v1/databases/Shop/layouts/Orders/records",
                response(200, json!({"response": {"data": [{"recordId": "1"}], "dataInfo": {}}, "messages": [{"code": "0"}]})),
                false,
            )
            .unwrap();
        assert_eq!(value, json!([{"recordId": "1"}]));
    }

    #[test]
    fn full_response_returns_response_object() {
        let value = dispatcher()
            .normalize(
                "/v1/x",
                response(200, json!({"response": {"data": [], "dataInfo": {"foundCount": 0}}, "messages": [{"code": "0"}]})),
                true,
            )
            .unwrap();
        assert_eq!(value["dataInfo"]["foundCount"], 0);
    }

    #[test]
    fn record_id_then_mod_id_precedence() {
        let value = dispatcher()
            .normalize("/v1/x", response(200, json!({"response": {"recordId": "7", "modId": "0"}, "messages": []})), false)
            .unwrap();
        assert_eq!(value, json!("7"));

        let value = dispatcher()
            .normalize("/v1/x", response(200, json!({"response": {"modId": "3"}, "messages": []})), false)
            .unwrap();
        assert_eq!(value, json!("3"));
    }

    #[test]
    fn empty_response_maps_codes_to_booleans() {
        let ok = dispatcher()
            .normalize("/v1/x", response(200, json!({"response": [], "messages": [{"code": "0"}]})), false)
            .unwrap();
        assert_eq!(ok, json!(true));

        let none = dispatcher()
            .normalize("/v1/x", response(200, json!({"response": [], "messages": [{"code": "10"}]})), false)
            .unwrap();
        assert_eq!(none, json!(false));

        let other = dispatcher()
            .normalize("/v1/x", response(200, json!({"response": [], "messages": [{"code": "5"}]})), false)
            .unwrap();
        assert_eq!(other, json!([]));
    }

    #[test]
    fn find_without_matches_is_an_empty_result() {
        let value = dispatcher()
            .normalize(
                "/v1/databases/Shop/layouts/Orders/_find",
                response(500, json!({"messages": [{"code": "401", "message": "No records match the request"}]})),
                false,
            )
            .unwrap();
        assert_eq!(value, json!({"data": {}, "dataInfo": {"foundCount": 0}}));
    }

    #[test]
    fn code_401_outside_find_is_an_error() {
        let err = dispatcher()
            .normalize(
                "/v1/databases/Shop/layouts/Orders/records",
                response(500, json!({"messages": [{"code": "401", "message": "No records match the request"}]})),
                false,
            )
            .unwrap_err();
        assert_eq!(err.code(), Some("401"));
    }

    #[test]
    fn failure_surfaces_code_and_message() {
        let err = dispatcher()
            .normalize("/v1/x", response(401, json!({"response": {}, "messages": [{"code": "952", "message": "Invalid token"}]})), false)
            .unwrap_err();
        match err {
            DataApiError::Api { code, message } => {
                assert_eq!(code, "952");
                assert_eq!(message, "Invalid token");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_json_failure_uses_http_status() {
        let resp = HttpResponse {
            status: 502,
            headers: Vec::new(),
            body: "Bad Gateway".to_string(),
        };
        let err = dispatcher().normalize("/v1/x", resp, false).unwrap_err();
        assert_eq!(err.code(), Some("502"));
    }

    #[test]
    fn percent_sign_in_path_is_escaped() {
        let req = dispatcher()
            .build(
                HttpMethod::Get,
                "/v1/databases/Shop/layouts/50% off/records",
                RequestOptions::default(),
            )
            .unwrap();
        assert_eq!(
            req.url,
            "https://fm.example.com/fmi/data/v1/databases/Shop/layouts/50%25%20off/records"
        );
    }

    #[test]
    fn reserved_path_characters_pass_through() {
        let req = dispatcher()
            .build(HttpMethod::Get, "/v1/databases/Shop/layouts/A&B=C/metadata", RequestOptions::default())
            .unwrap();
        assert!(req.url.ends_with("/layouts/A&B=C/metadata"));
    }

    #[test]
    fn session_token_is_masked_in_logged_path() {
        let logged = loggable_path("/v1/databases/Shop/sessions/tok-secret");
        assert_eq!(logged, "/v1/databases/Shop/sessions/***");
        assert!(!logged.contains("tok-secret"));
        assert_eq!(loggable_path("/v1/databases/Shop/sessions"), "/v1/databases/Shop/sessions");
    }

    #[test]
    fn line_breaks_in_upload_headers_are_rejected() {
        let bad_name = FileUpload::new("a.png\r\nX-Injected: 1", b"PNG".to_vec());
        let err = dispatcher()
            .build(HttpMethod::Post, "/v1/x", RequestOptions::default().file(bad_name))
            .unwrap_err();
        assert!(matches!(err, DataApiError::RequestBuild(_)));

        let bad_type = FileUpload::new("a.png", b"PNG".to_vec()).with_content_type("image/png\nX-Injected: 1");
        let err = dispatcher()
            .build(HttpMethod::Post, "/v1/x", RequestOptions::default().file(bad_type))
            .unwrap_err();
        assert!(matches!(err, DataApiError::RequestBuild(_)));
    }

    #[test]
    fn non_json_success_is_a_deserialization_error() {
        let resp = HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: "<html>".to_string(),
        };
        let err = dispatcher().normalize("/v1/x", resp, false).unwrap_err();
        assert!(matches!(err, DataApiError::Deserialization(_)));
    }
}
