//! Credentials and session token handling.
//!
//! # Design
//! `SessionManager` owns the credentials and the `{token, database,
//! version}` triple of one facade. It builds the login headers, opens and
//! closes server sessions through a `RequestDispatcher`, and hands out the
//! bearer header every other call needs. Nothing here is shared between
//! facades.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::DataApiConfig;
use crate::dispatch::{RequestDispatcher, RequestOptions};
use crate::error::{DataApiError, Result};
use crate::http::{HttpMethod, Transport};
use crate::options::JsonOptions;

pub const DEFAULT_VERSION: &str = "v1";

/// Where a session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticating,
    Authenticated,
}

/// Login material. Empty strings mean "not set".
#[derive(Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub oauth_request_id: String,
    pub oauth_identifier: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("oauth_request_id", &self.oauth_request_id)
            .field("oauth_identifier", &"***")
            .finish()
    }
}

impl Credentials {
    /// Username and password, or an OAuth request id and identifier.
    pub fn is_present(&self) -> bool {
        (!self.username.is_empty() && !self.password.is_empty())
            || (!self.oauth_request_id.is_empty() && !self.oauth_identifier.is_empty())
    }
}

/// Mutable session data: `{token, database, version}`.
#[derive(Clone)]
pub struct Session {
    pub token: String,
    pub database: String,
    pub version: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = if self.token.is_empty() { "" } else { "***" };
        f.debug_struct("Session")
            .field("token", &token)
            .field("database", &self.database)
            .field("version", &self.version)
            .finish()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self {
            token: String::new(),
            database: String::new(),
            version: DEFAULT_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionManager {
    credentials: Credentials,
    session: Session,
    authenticating: bool,
}

impl SessionManager {
    pub fn new(credentials: Credentials, session: Session) -> Self {
        Self {
            credentials,
            session,
            authenticating: false,
        }
    }

    /// Copy every option present in `config`; absent ones keep defaults.
    pub fn from_config(config: &DataApiConfig) -> Self {
        let mut credentials = Credentials::default();
        let mut session = Session::default();
        if let Some(login) = &config.login {
            credentials.username = login.clone();
        }
        if let Some(password) = &config.password {
            credentials.password = password.clone();
        }
        if let Some(id) = &config.o_auth_request_id {
            credentials.oauth_request_id = id.clone();
        }
        if let Some(identifier) = &config.o_auth_identifier {
            credentials.oauth_identifier = identifier.clone();
        }
        if let Some(token) = &config.token {
            session.token = token.clone();
        }
        if let Some(database) = &config.database_name {
            session.database = database.clone();
        }
        if let Some(version) = &config.version {
            session.version = version.clone();
        }
        Self::new(credentials, session)
    }

    pub fn state(&self) -> SessionState {
        if self.authenticating {
            SessionState::Authenticating
        } else if self.session.token.is_empty() {
            SessionState::Anonymous
        } else {
            SessionState::Authenticated
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_present()
    }

    pub fn token(&self) -> &str {
        &self.session.token
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.session.token = token.into();
    }

    pub fn database(&self) -> &str {
        &self.session.database
    }

    pub fn version(&self) -> &str {
        &self.session.version
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.session.version = version.into();
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// `/{version}/databases/{database}` prefix shared by most endpoints.
    pub fn database_path(&self) -> String {
        format!("/{}/databases/{}", self.session.version, self.session.database)
    }

    /// Open a server session and keep its token.
    pub fn login<T: Transport + ?Sized>(
        &mut self,
        dispatcher: &RequestDispatcher,
        transport: &T,
    ) -> Result<()> {
        if !self.has_credentials() {
            return Err(DataApiError::Configuration(
                "not available without credentials".to_string(),
            ));
        }

        self.authenticating = true;
        let path = format!("{}/sessions", self.database_path());
        let outcome = dispatcher.request(
            transport,
            HttpMethod::Post,
            &path,
            RequestOptions::with_headers(self.header_auth()).json(JsonOptions::new()),
            false,
        );
        self.authenticating = false;

        let response = outcome?;
        let token = response
            .get("token")
            .and_then(|token| token.as_str())
            .ok_or_else(|| DataApiError::Deserialization("session response has no token".to_string()))?;
        self.session.token = token.to_string();
        tracing::info!(database = %self.session.database, "session_opened");
        Ok(())
    }

    /// Close the server session. The token is cleared even when the server
    /// call fails; the failure is still returned.
    pub fn logout<T: Transport + ?Sized>(
        &mut self,
        dispatcher: &RequestDispatcher,
        transport: &T,
    ) -> Result<()> {
        let path = format!("{}/sessions/{}", self.database_path(), self.session.token);
        let outcome = dispatcher.request(
            transport,
            HttpMethod::Delete,
            &path,
            RequestOptions::default(),
            false,
        );
        self.session.token.clear();
        tracing::info!(database = %self.session.database, ok = outcome.is_ok(), "session_closed");
        outcome.map(|_| ())
    }

    /// Bearer header for authenticated calls.
    pub fn default_headers(&self) -> Vec<(String, String)> {
        vec![(
            "Authorization".to_string(),
            format!("Bearer {}", self.session.token),
        )]
    }

    /// Headers for the login call: basic auth when a username is set, else
    /// OAuth headers when a request id is set, else none.
    pub fn header_auth(&self) -> Vec<(String, String)> {
        if !self.credentials.username.is_empty() {
            self.header_basic_auth()
        } else if !self.credentials.oauth_request_id.is_empty() {
            self.header_oauth()
        } else {
            Vec::new()
        }
    }

    pub fn header_basic_auth(&self) -> Vec<(String, String)> {
        let raw = format!("{}:{}", self.credentials.username, self.credentials.password);
        vec![(
            "Authorization".to_string(),
            format!("Basic {}", STANDARD.encode(raw)),
        )]
    }

    pub fn header_oauth(&self) -> Vec<(String, String)> {
        vec![
            ("X-FM-Data-Login-Type".to_string(), "oauth".to_string()),
            (
                "X-FM-Data-OAuth-Request-Id".to_string(),
                self.credentials.oauth_request_id.clone(),
            ),
            (
                "X-FM-Data-OAuth-Identifier".to_string(),
                self.credentials.oauth_identifier.clone(),
            ),
        ]
    }
}
