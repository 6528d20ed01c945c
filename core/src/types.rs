//! Descriptors passed to facade operations.
//!
//! # Design
//! Script, portal and sort descriptors deserialize from the same JSON shapes
//! the Data API documents (`{"name", "param", "type"}` for scripts,
//! `{"fieldName", "sortOrder"}` for sort rules), so callers may build them in
//! code or load them from configuration. Script types stay free-form strings
//! on the wire: an unrecognized type is not an error, it simply contributes
//! no options.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// When a script hook runs relative to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptType {
    PreRequest,
    PreSort,
    PostRequest,
}

impl ScriptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptType::PreRequest => "prerequest",
            ScriptType::PreSort => "presort",
            ScriptType::PostRequest => "postrequest",
        }
    }
}

impl FromStr for ScriptType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prerequest" => Ok(ScriptType::PreRequest),
            "presort" => Ok(ScriptType::PreSort),
            "postrequest" => Ok(ScriptType::PostRequest),
            other => Err(format!("unknown script type: {other}")),
        }
    }
}

/// A server-side script hook: `{name, param, type}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSpec {
    pub name: String,
    #[serde(default)]
    pub param: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ScriptSpec {
    pub fn new(name: impl Into<String>, param: impl Into<String>, kind: ScriptType) -> Self {
        Self {
            name: name.into(),
            param: param.into(),
            kind: kind.as_str().to_string(),
        }
    }

    pub fn prerequest(name: impl Into<String>, param: impl Into<String>) -> Self {
        Self::new(name, param, ScriptType::PreRequest)
    }

    pub fn presort(name: impl Into<String>, param: impl Into<String>) -> Self {
        Self::new(name, param, ScriptType::PreSort)
    }

    pub fn postrequest(name: impl Into<String>, param: impl Into<String>) -> Self {
        Self::new(name, param, ScriptType::PostRequest)
    }

    /// The parsed hook type, `None` when the type is not recognized.
    pub fn script_type(&self) -> Option<ScriptType> {
        self.kind.parse().ok()
    }
}

/// A portal to include in a record response, with optional paging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl PortalSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            offset: None,
            limit: None,
        }
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One sort rule in the server's `{"fieldName", "sortOrder"}` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortRule {
    pub field_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<String>,
}

impl SortRule {
    pub fn ascend(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            sort_order: Some("ascend".to_string()),
        }
    }

    pub fn descend(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            sort_order: Some("descend".to_string()),
        }
    }
}

/// Sort order for list and find requests.
///
/// `Rules` is JSON-encoded into the option value; `Raw` is passed through
/// untouched for callers that already hold the encoded text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortSpec {
    Rules(Vec<SortRule>),
    Raw(String),
}

impl SortSpec {
    pub fn is_empty(&self) -> bool {
        match self {
            SortSpec::Rules(rules) => rules.is_empty(),
            SortSpec::Raw(text) => text.is_empty(),
        }
    }
}

/// A file to send to a container field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content_type: "application/octet-stream".to_string(),
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

/// Optional arguments of `get_records` and `find_records`.
#[derive(Debug, Clone, Default)]
pub struct RecordListOptions {
    pub sort: Option<SortSpec>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
    pub portals: Vec<PortalSpec>,
    pub scripts: Vec<ScriptSpec>,
    /// Return the whole `response` object (with `dataInfo`) instead of
    /// just the `data` array.
    pub data_info: bool,
    pub response_layout: Option<String>,
}

/// Optional arguments of `get_record`.
#[derive(Debug, Clone, Default)]
pub struct RecordOptions {
    pub portals: Vec<PortalSpec>,
    pub scripts: Vec<ScriptSpec>,
    pub response_layout: Option<String>,
}

/// Optional arguments of `edit_record`.
#[derive(Debug, Clone, Default)]
pub struct EditOptions {
    /// Last modification id known to the caller; the server rejects the
    /// edit when the record changed since.
    pub mod_id: Option<String>,
    pub portal_data: Option<Value>,
    pub scripts: Vec<ScriptSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_spec_deserializes_wire_shape() {
        let spec: ScriptSpec =
            serde_json::from_str(r#"{"name":"Log","param":"x","type":"presort"}"#).unwrap();
        assert_eq!(spec.script_type(), Some(ScriptType::PreSort));
        assert_eq!(spec.param, "x");
    }

    #[test]
    fn unknown_script_type_parses_to_none() {
        let spec: ScriptSpec = serde_json::from_str(r#"{"name":"Log","type":"later"}"#).unwrap();
        assert_eq!(spec.script_type(), None);
        assert_eq!(spec.param, "");
    }

    #[test]
    fn sort_spec_accepts_rules_or_text() {
        let rules: SortSpec =
            serde_json::from_str(r#"[{"fieldName":"id","sortOrder":"descend"}]"#).unwrap();
        assert_eq!(rules, SortSpec::Rules(vec![SortRule::descend("id")]));
        let raw: SortSpec = serde_json::from_str(r#""id""#).unwrap();
        assert_eq!(raw, SortSpec::Raw("id".to_string()));
    }

    #[test]
    fn portal_spec_builder_sets_paging() {
        let portal = PortalSpec::new("Orders").with_offset(2).with_limit(5);
        assert_eq!(portal.offset, Some(2));
        assert_eq!(portal.limit, Some(5));
    }
}
