//! Public facade: one method per Data API operation.
//!
//! # Design
//! `DataApi` composes the session, the option encoders and the dispatcher.
//! Each method fills a `JsonOptions` map, picks the verb and path template,
//! and projects the normalized response into the type its call site needs:
//! ids come back as `String`, `delete_record` as `()`, `validate_session`
//! as `bool`, and everything that returns record data or metadata as
//! `serde_json::Value`.

use serde::Serialize;
use serde_json::Value;

use crate::config::DataApiConfig;
use crate::dispatch::{RequestDispatcher, RequestOptions};
use crate::error::{DataApiError, Result};
use crate::http::{HttpMethod, Transport};
use crate::options::{
    encode_field_data, encode_portal_data, prepare_json_option, prepare_portals_options,
    prepare_script_options, JsonOptions,
};
use crate::query::FindQuery;
use crate::session::{Session, SessionManager, SessionState};
use crate::types::{EditOptions, FileUpload, RecordListOptions, RecordOptions, ScriptSpec};

/// Client for one database on one Data API host.
#[derive(Debug)]
pub struct DataApi<T> {
    dispatcher: RequestDispatcher,
    session: SessionManager,
    transport: T,
}

#[cfg(feature = "ureq")]
impl DataApi<crate::transport::UreqTransport> {
    /// Build a client over HTTP and log in right away.
    pub fn connect_http(config: DataApiConfig) -> Result<Self> {
        Self::connect(config, crate::transport::UreqTransport::new())
    }
}

impl<T: Transport> DataApi<T> {
    /// Build a client without contacting the server.
    ///
    /// Requires `apiUrl`, plus credentials or a token.
    pub fn new(config: DataApiConfig, transport: T) -> Result<Self> {
        Self::with_options(config, transport, false)
    }

    /// Build a client and open a session immediately.
    pub fn connect(config: DataApiConfig, transport: T) -> Result<Self> {
        Self::with_options(config, transport, true)
    }

    pub fn with_options(config: DataApiConfig, transport: T, log_now: bool) -> Result<Self> {
        let api_url = config
            .api_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| DataApiError::Configuration("Data API needs an apiUrl".to_string()))?;
        let session = SessionManager::from_config(&config);
        if !session.has_credentials() && session.token().is_empty() {
            return Err(DataApiError::Configuration(
                "Data API needs valid credentials [username;password] or [authRequestId;authIdentifier] or [token]"
                    .to_string(),
            ));
        }

        let mut api = Self {
            dispatcher: RequestDispatcher::new(api_url),
            session,
            transport,
        };
        // A token-only config is already authenticated.
        if log_now && api.session.has_credentials() {
            api.login()?;
        }
        Ok(api)
    }

    // -- auth --

    pub fn login(&mut self) -> Result<()> {
        self.session.login(&self.dispatcher, &self.transport)
    }

    pub fn logout(&mut self) -> Result<()> {
        self.session.logout(&self.dispatcher, &self.transport)
    }

    /// Whether the server still accepts the current token.
    pub fn validate_session(&self) -> Result<bool> {
        let path = format!("/{}/validateSession", self.session.version());
        let value = self.send(HttpMethod::Get, &path, self.authorized(), false)?;
        Ok(value.as_bool().unwrap_or(true))
    }

    // -- records --

    /// Create a record and return its id.
    pub fn create_record<D: Serialize + ?Sized>(
        &self,
        layout: &str,
        data: &D,
        scripts: &[ScriptSpec],
        portal_data: Option<&Value>,
    ) -> Result<String> {
        let mut options = encode_field_data(data)?;
        if let Some(portal) = portal_data.filter(|p| has_entries(p)) {
            options.insert("portalData".to_string(), Value::String(encode_portal_data(portal)?));
        }
        prepare_script_options(scripts, &mut options);

        let path = self.records_path(layout, None);
        let value = self.send(HttpMethod::Post, &path, self.authorized().json(options), false)?;
        into_id(value, "recordId")
    }

    /// Duplicate a record and return the new record's id.
    pub fn duplicate_record(&self, layout: &str, record_id: &str, scripts: &[ScriptSpec]) -> Result<String> {
        let mut options = JsonOptions::new();
        prepare_script_options(scripts, &mut options);

        let path = self.records_path(layout, Some(record_id));
        let value = self.send(HttpMethod::Post, &path, self.authorized().json(options), false)?;
        into_id(value, "recordId")
    }

    /// Edit a record and return its new modification id.
    pub fn edit_record<D: Serialize + ?Sized>(
        &self,
        layout: &str,
        record_id: &str,
        data: &D,
        edit: &EditOptions,
    ) -> Result<String> {
        let mut options = encode_field_data(data)?;
        if let Some(mod_id) = edit.mod_id.as_deref().filter(|id| !id.is_empty()) {
            options.insert("modId".to_string(), Value::from(mod_id));
        }
        if let Some(portal) = edit.portal_data.as_ref().filter(|p| has_entries(p)) {
            options.insert("portalData".to_string(), Value::String(encode_portal_data(portal)?));
        }
        prepare_script_options(&edit.scripts, &mut options);

        let path = self.records_path(layout, Some(record_id));
        let value = self.send(HttpMethod::Patch, &path, self.authorized().json(options), false)?;
        into_id(value, "modId")
    }

    pub fn delete_record(&self, layout: &str, record_id: &str, scripts: &[ScriptSpec]) -> Result<()> {
        let mut options = JsonOptions::new();
        prepare_script_options(scripts, &mut options);

        let path = self.records_path(layout, Some(record_id));
        self.send(HttpMethod::Delete, &path, self.authorized().json(options), false)?;
        Ok(())
    }

    pub fn get_record(&self, layout: &str, record_id: &str, record: &RecordOptions) -> Result<Value> {
        let mut options = JsonOptions::new();
        if let Some(response_layout) = record.response_layout.as_deref().filter(|l| !l.is_empty()) {
            options.insert("layout.response".to_string(), Value::from(response_layout));
        }
        prepare_script_options(&record.scripts, &mut options);
        prepare_portals_options(&record.portals, &mut options)?;

        let path = self.records_path(layout, Some(record_id));
        self.send(HttpMethod::Get, &path, self.authorized().query(options), false)
    }

    /// Page through a layout's records.
    pub fn get_records(&self, layout: &str, list: &RecordListOptions) -> Result<Value> {
        let mut options = JsonOptions::new();
        prepare_json_option(
            &mut options,
            list.offset,
            list.limit,
            list.sort.as_ref(),
            list.response_layout.as_deref(),
            true,
        )?;
        prepare_script_options(&list.scripts, &mut options);
        prepare_portals_options(&list.portals, &mut options)?;

        let path = self.records_path(layout, None);
        self.send(HttpMethod::Get, &path, self.authorized().query(options), list.data_info)
    }

    /// Run a find. No match is not an error: the result is then an empty
    /// found set with `foundCount` 0.
    pub fn find_records(&self, layout: &str, query: &FindQuery, list: &RecordListOptions) -> Result<Value> {
        let mut options = JsonOptions::new();
        let query_text = serde_json::to_string(&query.to_value())
            .map_err(|e| DataApiError::RequestBuild(e.to_string()))?;
        options.insert("query".to_string(), Value::String(query_text));
        prepare_json_option(
            &mut options,
            list.offset,
            list.limit,
            list.sort.as_ref(),
            list.response_layout.as_deref(),
            false,
        )?;
        prepare_script_options(&list.scripts, &mut options);
        prepare_portals_options(&list.portals, &mut options)?;

        let path = format!("{}/layouts/{layout}/_find", self.session.database_path());
        self.send(HttpMethod::Post, &path, self.authorized().json(options), list.data_info)
    }

    // -- scripts --

    pub fn execute_script(&self, layout: &str, script_name: &str, script_param: Option<&str>) -> Result<Value> {
        let mut options = JsonOptions::new();
        if let Some(param) = script_param.filter(|p| !p.is_empty()) {
            options.insert("script.param".to_string(), Value::from(param));
        }

        let path = format!(
            "{}/layouts/{layout}/script/{script_name}",
            self.session.database_path()
        );
        self.send(HttpMethod::Get, &path, self.authorized().query(options), false)
    }

    // -- containers --

    /// Upload a file into a container field, optionally into one
    /// repetition of it.
    pub fn upload_to_container(
        &self,
        layout: &str,
        record_id: &str,
        field_name: &str,
        repetition: Option<u32>,
        file: FileUpload,
    ) -> Result<Value> {
        let repetition = repetition.map(|r| format!("/{r}")).unwrap_or_default();
        let mut headers = self.session.default_headers();
        headers.push(("Content-Type".to_string(), "application/json".to_string()));

        let path = format!(
            "{}/containers/{field_name}{repetition}",
            self.records_path(layout, Some(record_id))
        );
        self.send(HttpMethod::Post, &path, RequestOptions::with_headers(headers).file(file), false)
    }

    // -- globals --

    pub fn set_global_fields<G: Serialize + ?Sized>(&self, global_fields: &G) -> Result<Value> {
        let mut options = JsonOptions::new();
        let text = serde_json::to_string(global_fields).map_err(|e| DataApiError::RequestBuild(e.to_string()))?;
        options.insert("globalFields".to_string(), Value::String(text));

        let path = format!("{}/globals", self.session.database_path());
        self.send(HttpMethod::Patch, &path, self.authorized().json(options), false)
    }

    // -- metadata --

    pub fn get_product_info(&self) -> Result<Value> {
        let path = format!("/{}/productInfo", self.session.version());
        self.send(HttpMethod::Get, &path, self.authorized(), false)
    }

    /// List hosted databases. Authenticates with the login credentials
    /// rather than the session token.
    pub fn get_database_names(&self) -> Result<Value> {
        if !self.session.has_credentials() {
            return Err(DataApiError::Configuration(
                "not available without credentials".to_string(),
            ));
        }
        let path = format!("/{}/databases", self.session.version());
        self.send(HttpMethod::Get, &path, RequestOptions::with_headers(self.session.header_auth()), false)
    }

    pub fn get_layout_names(&self) -> Result<Value> {
        let path = format!("{}/layouts", self.session.database_path());
        self.send(HttpMethod::Get, &path, self.authorized(), false)
    }

    pub fn get_script_names(&self) -> Result<Value> {
        let path = format!("{}/scripts", self.session.database_path());
        self.send(HttpMethod::Get, &path, self.authorized(), false)
    }

    /// Field and portal metadata of a layout. With a record id, the layout
    /// is described in the context of that record.
    pub fn get_layout_metadata(&self, layout: &str, record_id: Option<&str>) -> Result<Value> {
        let base = format!("{}/layouts/{layout}", self.session.database_path());
        match record_id.filter(|id| !id.is_empty()) {
            Some(id) => {
                let mut options = JsonOptions::new();
                options.insert("recordId".to_string(), Value::from(id));
                self.send(HttpMethod::Get, &base, self.authorized().query(options), false)
            }
            None => {
                let path = format!("{base}/metadata");
                self.send(HttpMethod::Get, &path, self.authorized(), false)
            }
        }
    }

    // -- accessors --

    pub fn api_token(&self) -> &str {
        self.session.token()
    }

    pub fn set_api_token(&mut self, token: impl Into<String>) {
        self.session.set_token(token);
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.session.set_version(version);
    }

    pub fn database(&self) -> &str {
        self.session.database()
    }

    pub fn version(&self) -> &str {
        self.session.version()
    }

    pub fn session(&self) -> &Session {
        self.session.session()
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn default_headers(&self) -> Vec<(String, String)> {
        self.session.default_headers()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn authorized(&self) -> RequestOptions {
        RequestOptions::with_headers(self.session.default_headers())
    }

    fn records_path(&self, layout: &str, record_id: Option<&str>) -> String {
        let base = format!("{}/layouts/{layout}/records", self.session.database_path());
        match record_id {
            Some(id) => format!("{base}/{id}"),
            None => base,
        }
    }

    fn send(&self, method: HttpMethod, path: &str, options: RequestOptions, full_response: bool) -> Result<Value> {
        self.dispatcher
            .request(&self.transport, method, path, options, full_response)
    }
}

fn has_entries(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Null => false,
        _ => true,
    }
}

fn into_id(value: Value, what: &str) -> Result<String> {
    match value {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(DataApiError::Deserialization(format!(
            "expected {what} in response, got {other}"
        ))),
    }
}
