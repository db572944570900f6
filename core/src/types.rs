//! Request and response types for the five API operations.
//!
//! Each operation takes a small owned request struct. Optional path segments
//! are `Option<String>`; query parameters are a sorted map of JSON scalars so
//! the rendered query string is deterministic.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::ElasticError;

/// Query parameters, rendered in key order.
pub type Params = BTreeMap<String, Value>;

/// A request body: either already encoded, or a JSON value to encode.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Raw(String),
    Json(Value),
}

impl Body {
    /// Empty strings, `null`, `{}` and `[]` count as no body at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Raw(s) => s.is_empty(),
            Body::Json(Value::Null) => true,
            Body::Json(Value::Object(map)) => map.is_empty(),
            Body::Json(Value::Array(items)) => items.is_empty(),
            Body::Json(_) => false,
        }
    }

    pub(crate) fn encode(&self) -> Result<Option<String>, ElasticError> {
        if self.is_empty() {
            return Ok(None);
        }
        match self {
            Body::Raw(s) => Ok(Some(s.clone())),
            Body::Json(value) => serde_json::to_string(value)
                .map(Some)
                .map_err(|e| ElasticError::Serialization(e.to_string())),
        }
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Raw(s)
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Body::Raw(s.to_string())
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

/// Body of a bulk request: NDJSON lines to join, or a ready payload.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkBody {
    Lines(Vec<String>),
    Payload(Body),
}

impl BulkBody {
    pub(crate) fn into_body(self) -> Body {
        match self {
            BulkBody::Lines(lines) => Body::Raw(lines.join("\n")),
            BulkBody::Payload(body) => body,
        }
    }
}

impl From<Vec<String>> for BulkBody {
    fn from(lines: Vec<String>) -> Self {
        BulkBody::Lines(lines)
    }
}

impl From<Vec<&str>> for BulkBody {
    fn from(lines: Vec<&str>) -> Self {
        BulkBody::Lines(lines.into_iter().map(str::to_string).collect())
    }
}

impl From<Body> for BulkBody {
    fn from(body: Body) -> Self {
        BulkBody::Payload(body)
    }
}

impl From<String> for BulkBody {
    fn from(s: String) -> Self {
        BulkBody::Payload(Body::Raw(s))
    }
}

impl From<&str> for BulkBody {
    fn from(s: &str) -> Self {
        BulkBody::Payload(Body::Raw(s.to_string()))
    }
}

impl From<Value> for BulkBody {
    fn from(value: Value) -> Self {
        BulkBody::Payload(Body::Json(value))
    }
}

/// Store one document. With an `id` the document is PUT at that id,
/// otherwise POSTed and the engine picks the id.
#[derive(Debug, Clone)]
pub struct IndexDocument {
    pub index: String,
    pub body: Body,
    pub doc_type: Option<String>,
    pub id: Option<String>,
    pub params: Params,
}

impl IndexDocument {
    pub fn new(index: impl Into<String>, body: impl Into<Body>) -> Self {
        Self {
            index: index.into(),
            body: body.into(),
            doc_type: None,
            id: None,
            params: Params::new(),
        }
    }

    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// A search request.
///
/// `extra` holds loose keyword arguments: `size` is lifted into the query
/// string, everything else is merged into the top level of the body.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub index: Option<String>,
    pub doc_type: Option<String>,
    pub body: Option<Body>,
    pub params: Params,
    pub extra: Map<String, Value>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Shorthand for the `size` keyword, which wins over a `size` param.
    pub fn size(self, size: u64) -> Self {
        self.extra("size", size)
    }
}

/// A bulk request against `_bulk`.
#[derive(Debug, Clone)]
pub struct BulkRequest {
    pub body: BulkBody,
    pub index: Option<String>,
    pub doc_type: Option<String>,
    pub params: Params,
    pub refresh: Option<Value>,
}

impl BulkRequest {
    pub fn new(body: impl Into<BulkBody>) -> Self {
        Self {
            body: body.into(),
            index: None,
            doc_type: None,
            params: Params::new(),
            refresh: None,
        }
    }

    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn refresh(mut self, refresh: impl Into<Value>) -> Self {
        self.refresh = Some(refresh.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct CountQuery {
    pub body: Option<Body>,
    pub index: Option<String>,
    pub doc_type: Option<String>,
    pub params: Params,
}

impl CountQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Delete a document (or, without an id, whatever the path names).
#[derive(Debug, Clone)]
pub struct DeleteDocument {
    pub index: String,
    pub doc_type: Option<String>,
    pub id: Option<String>,
    pub params: Params,
}

impl DeleteDocument {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            doc_type: None,
            id: None,
            params: Params::new(),
        }
    }

    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Result of a dispatched request that did not fail outright.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The engine answered; this is its decoded JSON body, whatever the status.
    Completed(Value),
    /// The transport gave up waiting.
    TimedOut,
}

impl Outcome {
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Outcome::TimedOut)
    }

    pub fn json(&self) -> Option<&Value> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::TimedOut => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::TimedOut => None,
        }
    }
}
