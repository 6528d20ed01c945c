//! Construction options for `DataApi`.
//!
//! Every field is optional so that an omitted option and an option set to
//! an empty string stay distinguishable. Keys deserialize from the camelCase
//! names the Data API tooling uses (`databaseName`, `apiUrl`, ...).

use serde::{Deserialize, Serialize};

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataApiConfig {
    pub login: Option<String>,
    pub password: Option<String>,
    pub o_auth_request_id: Option<String>,
    pub o_auth_identifier: Option<String>,
    pub token: Option<String>,
    pub database_name: Option<String>,
    pub version: Option<String>,
    pub api_url: Option<String>,
}

impl std::fmt::Debug for DataApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |value: &Option<String>| value.as_ref().map(|_| "***");
        f.debug_struct("DataApiConfig")
            .field("login", &self.login)
            .field("password", &mask(&self.password))
            .field("o_auth_request_id", &self.o_auth_request_id)
            .field("o_auth_identifier", &mask(&self.o_auth_identifier))
            .field("token", &mask(&self.token))
            .field("database_name", &self.database_name)
            .field("version", &self.version)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl DataApiConfig {
    /// Read options from `FM_DATA_*` environment variables. Unset variables
    /// leave the option absent.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            login: lookup("FM_DATA_LOGIN"),
            password: lookup("FM_DATA_PASSWORD"),
            o_auth_request_id: lookup("FM_DATA_OAUTH_REQUEST_ID"),
            o_auth_identifier: lookup("FM_DATA_OAUTH_IDENTIFIER"),
            token: lookup("FM_DATA_TOKEN"),
            database_name: lookup("FM_DATA_DATABASE"),
            version: lookup("FM_DATA_VERSION"),
            api_url: lookup("FM_DATA_API_URL"),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database_name = Some(database.into());
        self
    }

    pub fn with_login(mut self, login: impl Into<String>, password: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_oauth(mut self, request_id: impl Into<String>, identifier: impl Into<String>) -> Self {
        self.o_auth_request_id = Some(request_id.into());
        self.o_auth_identifier = Some(identifier.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}
