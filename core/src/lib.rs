//! Blocking client for a database's REST-style Data API.
//!
//! # Overview
//! Translates record CRUD, find queries, script runs, container uploads,
//! globals and metadata calls into HTTP requests, and normalizes the
//! server's `{response, messages}` envelopes into plain return values.
//!
//! # Design
//! - `query` and `options` are pure encoders that fill a flat option map.
//! - `RequestDispatcher` turns method, path and options into an
//!   `HttpRequest`, and an `HttpResponse` back into a value or an error.
//! - The round-trip itself goes through the `Transport` trait, so the core
//!   stays deterministic in tests. `UreqTransport` (feature `ureq`, on by
//!   default) is the HTTP implementation.
//! - `SessionManager` owns credentials and the session token; `DataApi`
//!   is the facade that composes everything.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod options;
pub mod query;
pub mod session;
#[cfg(feature = "ureq")]
pub mod transport;
pub mod types;

pub use api::DataApi;
pub use config::DataApiConfig;
pub use dispatch::{Envelope, Message, RequestDispatcher, RequestOptions};
pub use error::{DataApiError, Result};
pub use http::{HttpBody, HttpMethod, HttpRequest, HttpResponse, Transport};
pub use options::JsonOptions;
pub use query::{FieldCondition, FindFields, FindQuery, FindRequest};
pub use session::{Credentials, Session, SessionManager, SessionState};
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
pub use types::{
    EditOptions, FileUpload, PortalSpec, RecordListOptions, RecordOptions, ScriptSpec, ScriptType,
    SortRule, SortSpec,
};
