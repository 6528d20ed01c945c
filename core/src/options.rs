//! Option encoders.
//!
//! Each encoder merges its keys into a shared options map and leaves
//! unrelated keys alone. The map later becomes either the query string of a
//! GET request or the JSON body of any other request.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{DataApiError, Result};
use crate::http::clean_token;
use crate::types::{PortalSpec, ScriptSpec, ScriptType, SortSpec};

/// Flat option map sent as query parameters or as a JSON body.
pub type JsonOptions = Map<String, Value>;

/// Add sort, paging and response-layout options.
///
/// With `underscore_prefix` the keys become `_sort`, `_limit` and
/// `_offset`, which is the form list requests use; find requests use bare
/// keys. An offset of zero is left out.
pub fn prepare_json_option(
    options: &mut JsonOptions,
    offset: Option<u32>,
    limit: Option<u32>,
    sort: Option<&SortSpec>,
    response_layout: Option<&str>,
    underscore_prefix: bool,
) -> Result<()> {
    let prefix = if underscore_prefix { "_" } else { "" };

    if let Some(sort) = sort.filter(|sort| !sort.is_empty()) {
        let value = match sort {
            SortSpec::Rules(rules) => to_json_text(rules)?,
            SortSpec::Raw(text) => text.clone(),
        };
        options.insert(format!("{prefix}sort"), Value::String(value));
    }

    if let Some(limit) = limit {
        options.insert(format!("{prefix}limit"), Value::from(limit));
    }

    if let Some(offset) = offset.filter(|offset| *offset > 0) {
        options.insert(format!("{prefix}offset"), Value::from(offset));
    }

    if let Some(layout) = response_layout.filter(|layout| !layout.is_empty()) {
        options.insert("layout.response".to_string(), Value::from(layout));
    }

    Ok(())
}

/// Add `script[.type]` and `script[.type].param` keys for each hook.
///
/// Post-request scripts use the bare `script` key; pre-request and pre-sort
/// scripts are suffixed with their type. Scripts of an unknown type are
/// skipped.
pub fn prepare_script_options(scripts: &[ScriptSpec], options: &mut JsonOptions) {
    for script in scripts {
        let Some(kind) = script.script_type() else {
            tracing::debug!(script = %script.name, kind = %script.kind, "script_type_ignored");
            continue;
        };

        let key = match kind {
            ScriptType::PostRequest => "script".to_string(),
            other => format!("script.{}", other.as_str()),
        };
        options.insert(format!("{key}.param"), Value::from(script.param.as_str()));
        options.insert(key, Value::from(script.name.as_str()));
    }
}

/// Add the `portal` name list and per-portal `_offset.<name>` /
/// `_limit.<name>` keys. An empty portal list adds nothing.
pub fn prepare_portals_options(portals: &[PortalSpec], options: &mut JsonOptions) -> Result<()> {
    if portals.is_empty() {
        return Ok(());
    }

    let mut names = Vec::with_capacity(portals.len());
    for portal in portals {
        names.push(portal.name.as_str());
        if let Some(offset) = portal.offset {
            options.insert(clean_token(&format!("_offset.{}", portal.name)), Value::from(offset));
        }
        if let Some(limit) = portal.limit {
            options.insert(clean_token(&format!("_limit.{}", portal.name)), Value::from(limit));
        }
    }

    options.insert("portal".to_string(), Value::String(to_json_text(&names)?));
    Ok(())
}

/// Wrap record field data as `{"fieldData": "<json text>"}`.
pub fn encode_field_data<T: Serialize + ?Sized>(data: &T) -> Result<JsonOptions> {
    let mut options = JsonOptions::new();
    options.insert("fieldData".to_string(), Value::String(to_json_text(data)?));
    Ok(options)
}

/// JSON text of portal data, without a wrapper key.
pub fn encode_portal_data<T: Serialize + ?Sized>(portal: &T) -> Result<String> {
    to_json_text(portal)
}

fn to_json_text<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| DataApiError::RequestBuild(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SortRule;
    use serde_json::json;

    #[test]
    fn list_options_use_underscore_keys() {
        let mut options = JsonOptions::new();
        let sort = SortSpec::Rules(vec![SortRule::ascend("name")]);
        prepare_json_option(&mut options, Some(10), Some(5), Some(&sort), Some("Detail"), true)
            .unwrap();

        assert_eq!(options["_offset"], 10);
        assert_eq!(options["_limit"], 5);
        assert_eq!(options["_sort"], r#"[{"fieldName":"name","sortOrder":"ascend"}]"#);
        assert_eq!(options["layout.response"], "Detail");
    }

    #[test]
    fn zero_offset_is_omitted() {
        let mut options = JsonOptions::new();
        let sort = SortSpec::Raw("name".to_string());
        prepare_json_option(&mut options, Some(0), Some(20), Some(&sort), None, false).unwrap();

        assert!(!options.contains_key("offset"));
        assert_eq!(options["limit"], 20);
        assert_eq!(options["sort"], "name");
        assert!(!options.contains_key("layout.response"));
    }

    #[test]
    fn absent_inputs_add_nothing_and_keep_existing_keys() {
        let mut options = JsonOptions::new();
        options.insert("query".to_string(), json!("[]"));
        prepare_json_option(&mut options, None, None, None, Some(""), false).unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options["query"], "[]");
    }

    #[test]
    fn postrequest_scripts_use_bare_keys() {
        let mut options = JsonOptions::new();
        prepare_script_options(
            &[
                ScriptSpec::postrequest("After", "1"),
                ScriptSpec::prerequest("Before", "2"),
                ScriptSpec::presort("Sorting", "3"),
            ],
            &mut options,
        );

        assert_eq!(options["script"], "After");
        assert_eq!(options["script.param"], "1");
        assert_eq!(options["script.prerequest"], "Before");
        assert_eq!(options["script.prerequest.param"], "2");
        assert_eq!(options["script.presort"], "Sorting");
        assert_eq!(options["script.presort.param"], "3");
    }

    #[test]
    fn unknown_script_types_contribute_nothing() {
        let mut options = JsonOptions::new();
        let script = ScriptSpec {
            name: "Nope".to_string(),
            param: String::new(),
            kind: "whenever".to_string(),
        };
        prepare_script_options(&[script], &mut options);
        assert!(options.is_empty());
    }

    #[test]
    fn portals_list_names_in_order_with_paging() {
        let mut options = JsonOptions::new();
        prepare_portals_options(
            &[
                PortalSpec::new("Orders").with_offset(1).with_limit(10),
                PortalSpec::new("Invoices"),
            ],
            &mut options,
        )
        .unwrap();

        let names: Vec<String> = serde_json::from_str(options["portal"].as_str().unwrap()).unwrap();
        assert_eq!(names, vec!["Orders", "Invoices"]);
        assert_eq!(options["_offset.Orders"], 1);
        assert_eq!(options["_limit.Orders"], 10);
        assert!(!options.contains_key("_offset.Invoices"));
    }

    #[test]
    fn empty_portal_list_adds_no_keys() {
        let mut options = JsonOptions::new();
        prepare_portals_options(&[], &mut options).unwrap();
        assert!(options.is_empty());
    }

    #[test]
    fn field_data_wraps_json_text() {
        let options = encode_field_data(&json!({"a": 1})).unwrap();
        let decoded: Value = serde_json::from_str(options["fieldData"].as_str().unwrap()).unwrap();
        assert_eq!(decoded, json!({"a": 1}));
    }

    #[test]
    fn portal_data_is_bare_json_text() {
        let text = encode_portal_data(&json!({"Orders": [{"Orders::qty": 2}]})).unwrap();
        assert_eq!(text, r#"{"Orders":[{"Orders::qty":2}]}"#);
    }
}
