//! Find-query builder.
//!
//! Turns structured find requests into the server's `query` syntax: an
//! array of flat `{field: value}` objects, where each object is an
//! alternative ("or") and an object tagged `"omit": "true"` removes its
//! matches from the found set.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::http::clean_token;

/// One `fieldname = fieldvalue` criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
    pub fieldname: String,
    pub fieldvalue: Value,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub omit: bool,
}

impl FieldCondition {
    pub fn new(fieldname: impl Into<String>, fieldvalue: impl Into<Value>) -> Self {
        Self {
            fieldname: fieldname.into(),
            fieldvalue: fieldvalue.into(),
            omit: false,
        }
    }

    pub fn omit(fieldname: impl Into<String>, fieldvalue: impl Into<Value>) -> Self {
        Self {
            omit: true,
            ..Self::new(fieldname, fieldvalue)
        }
    }

    fn key(&self) -> String {
        clean_token(&self.fieldname)
    }
}

/// The `fields` of a find request: one criterion or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FindFields {
    Many(Vec<FieldCondition>),
    Single(FieldCondition),
}

/// A single find request.
///
/// A request without `fields` ends query building: it and every request
/// after it are left out of the query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FindRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<FindFields>,
}

impl FindRequest {
    pub fn single(condition: FieldCondition) -> Self {
        Self {
            fields: Some(FindFields::Single(condition)),
        }
    }

    pub fn many(conditions: Vec<FieldCondition>) -> Self {
        Self {
            fields: Some(FindFields::Many(conditions)),
        }
    }
}

/// Query argument of `find_records`.
#[derive(Debug, Clone, PartialEq)]
pub enum FindQuery {
    /// Structured requests, run through `prepare_query_options`.
    Requests(Vec<FindRequest>),
    /// One ready-made query object, sent as a one-element array.
    Raw(Map<String, Value>),
}

impl FindQuery {
    /// The `query` array the server expects.
    pub fn to_value(&self) -> Value {
        match self {
            FindQuery::Requests(requests) => Value::Array(
                prepare_query_options(requests)
                    .into_iter()
                    .map(Value::Object)
                    .collect(),
            ),
            FindQuery::Raw(object) => Value::Array(vec![Value::Object(object.clone())]),
        }
    }
}

impl From<Vec<FindRequest>> for FindQuery {
    fn from(requests: Vec<FindRequest>) -> Self {
        FindQuery::Requests(requests)
    }
}

/// Flatten find requests into query objects.
///
/// Within one request, non-omit criteria go into one object and omit
/// criteria into a second one tagged `"omit": "true"`. Each object is
/// emitted only when non-empty, the omit object always after its sibling.
pub fn prepare_query_options(requests: &[FindRequest]) -> Vec<Map<String, Value>> {
    let mut items = Vec::new();

    for request in requests {
        let Some(fields) = &request.fields else {
            break;
        };

        match fields {
            FindFields::Single(condition) => {
                let mut object = Map::new();
                object.insert(condition.key(), condition.fieldvalue.clone());
                items.push(object);
            }
            FindFields::Many(conditions) => {
                let mut request_object = Map::new();
                let mut omit_object = Map::new();
                for condition in conditions {
                    if condition.omit {
                        omit_object.insert(condition.key(), condition.fieldvalue.clone());
                        omit_object.insert("omit".to_string(), Value::from("true"));
                    } else {
                        request_object.insert(condition.key(), condition.fieldvalue.clone());
                    }
                }
                if !request_object.is_empty() {
                    items.push(request_object);
                }
                if !omit_object.is_empty() {
                    items.push(omit_object);
                }
            }
        }
    }

    items
}
