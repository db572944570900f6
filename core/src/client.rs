//! The search engine client.
//!
//! # Design
//! `Client` holds its configuration and a boxed `Transport`, and carries no
//! mutable state between calls. Every operation has a `build_*` method that
//! shapes an `HttpRequest` without I/O, and a same-named method that builds
//! and then dispatches through `perform`. All five operations funnel into the
//! same URL builder and the same dispatch routine.

use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::{info, warn};
use url::form_urlencoded;

use crate::config::ClientConfig;
use crate::error::ElasticError;
use crate::http::{
    HttpMethod, HttpRequest, Transport, TransportError, UreqTransport, CONTENT_TYPE, JSON_MIME,
};
use crate::types::{
    Body, BulkRequest, CountQuery, DeleteDocument, IndexDocument, Outcome, Params, SearchQuery,
};

/// Target of failure log records.
pub const LOG_TARGET: &str = "elasticsearch";

const DEFAULT_FROM: u64 = 0;
const DEFAULT_SIZE: u64 = 20;

/// Path segments of a request, in the order they appear in the URL.
/// Absent or empty segments are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathTarget {
    pub index: Option<String>,
    pub doc_type: Option<String>,
    pub id: Option<String>,
    pub operation: Option<String>,
}

impl PathTarget {
    fn segments(&self) -> impl Iterator<Item = &str> {
        [&self.index, &self.doc_type, &self.id, &self.operation]
            .into_iter()
            .filter_map(present)
    }
}

/// Blocking client for the search engine's HTTP API.
pub struct Client {
    config: ClientConfig,
    transport: Box<dyn Transport>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Client over the default `ureq` transport, bounded by `config.timeout`.
    pub fn new(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(Some(config.timeout));
        Self::with_transport(config, Box::new(transport))
    }

    pub fn with_transport(config: ClientConfig, transport: Box<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Base URL followed by the present segments joined with `/`, then the
    /// url-encoded query string if there are parameters.
    pub fn build_url(&self, target: &PathTarget, params: &Params) -> String {
        let mut url = self.config.host.base_url();
        let path = target.segments().collect::<Vec<_>>().join("/");
        url.push_str(&path);
        if !params.is_empty() {
            url.push('?');
            url.push_str(&encode_params(params));
        }
        url
    }

    /// Shape a request from its parts. The content-type header is always set.
    pub fn build_request(
        &self,
        method: HttpMethod,
        target: &PathTarget,
        params: &Params,
        body: Option<&Body>,
    ) -> Result<HttpRequest, ElasticError> {
        let body = match body {
            Some(body) => body.encode()?,
            None => None,
        };
        Ok(HttpRequest {
            method,
            url: self.build_url(target, params),
            headers: vec![(CONTENT_TYPE.to_string(), JSON_MIME.to_string())],
            body,
        })
    }

    /// Dispatch by verb name. Names outside GET/POST/PUT/DELETE fail before
    /// any I/O.
    pub fn request(
        &self,
        method: &str,
        target: &PathTarget,
        params: &Params,
        body: Option<&Body>,
    ) -> Result<Outcome, ElasticError> {
        let method: HttpMethod = method.parse()?;
        let request = self.build_request(method, target, params, body)?;
        self.perform(&request)
    }

    /// Send a built request and decode the response.
    ///
    /// Every status above 200 is logged as a failure, and the body is decoded
    /// and returned regardless. A transport timeout is logged and reported as
    /// `Outcome::TimedOut`; other transport errors propagate.
    pub fn perform(&self, request: &HttpRequest) -> Result<Outcome, ElasticError> {
        let start = Instant::now();
        match self.transport.send(request) {
            Ok(response) => {
                let duration = start.elapsed();
                if is_flagged_status(response.status) {
                    log_request_fail(request, duration, &response.status.to_string());
                }
                let value = serde_json::from_str(&response.body)
                    .map_err(|e| ElasticError::Deserialization(e.to_string()))?;
                Ok(Outcome::Completed(value))
            }
            Err(TransportError::Timeout) => {
                let duration = start.elapsed();
                println!("url: {} reached the timeout limit", request.url);
                log_request_fail(request, duration, "timeout");
                Ok(Outcome::TimedOut)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn build_index(&self, doc: IndexDocument) -> Result<HttpRequest, ElasticError> {
        let method = if present(&doc.id).is_some() {
            HttpMethod::Put
        } else {
            HttpMethod::Post
        };
        let target = PathTarget {
            index: Some(doc.index),
            doc_type: doc.doc_type,
            id: doc.id,
            operation: None,
        };
        self.build_request(method, &target, &doc.params, Some(&doc.body))
    }

    /// Store a document: PUT when an id is given, POST otherwise.
    pub fn index(&self, doc: IndexDocument) -> Result<Outcome, ElasticError> {
        let request = self.build_index(doc)?;
        self.perform(&request)
    }

    pub fn build_search(&self, query: SearchQuery) -> Result<HttpRequest, ElasticError> {
        let SearchQuery {
            mut index,
            doc_type,
            body,
            mut params,
            mut extra,
        } = query;

        match params.remove("from_") {
            Some(from) => {
                params.insert("from".to_string(), from);
            }
            None => {
                params
                    .entry("from".to_string())
                    .or_insert(Value::from(DEFAULT_FROM));
            }
        }
        params
            .entry("ignore_unavailable".to_string())
            .or_insert(Value::Bool(true));
        match extra.remove("size") {
            Some(size) => {
                params.insert("size".to_string(), size);
            }
            None => {
                params
                    .entry("size".to_string())
                    .or_insert(Value::from(DEFAULT_SIZE));
            }
        }

        if present(&doc_type).is_some() && present(&index).is_none() {
            index = Some("_all".to_string());
        }

        let body = search_body(body, extra)?;
        let target = PathTarget {
            index,
            doc_type,
            id: None,
            operation: Some("_search".to_string()),
        };
        self.build_request(HttpMethod::Get, &target, &params, Some(&body))
    }

    /// Search with `from`, `size` and `ignore_unavailable` defaulted.
    pub fn search(&self, query: SearchQuery) -> Result<Outcome, ElasticError> {
        let request = self.build_search(query)?;
        self.perform(&request)
    }

    pub fn build_bulk(&self, bulk: BulkRequest) -> Result<HttpRequest, ElasticError> {
        let BulkRequest {
            body,
            index,
            doc_type,
            mut params,
            refresh,
        } = bulk;
        if let Some(refresh) = refresh {
            params.insert("refresh".to_string(), refresh);
        }
        let target = PathTarget {
            index,
            doc_type,
            id: None,
            operation: Some("_bulk".to_string()),
        };
        self.build_request(HttpMethod::Post, &target, &params, Some(&body.into_body()))
    }

    pub fn bulk(&self, bulk: BulkRequest) -> Result<Outcome, ElasticError> {
        let request = self.build_bulk(bulk)?;
        self.perform(&request)
    }

    pub fn build_count(&self, query: CountQuery) -> Result<HttpRequest, ElasticError> {
        let target = PathTarget {
            index: query.index,
            doc_type: query.doc_type,
            id: None,
            operation: Some("_count".to_string()),
        };
        self.build_request(HttpMethod::Post, &target, &query.params, query.body.as_ref())
    }

    pub fn count(&self, query: CountQuery) -> Result<Outcome, ElasticError> {
        let request = self.build_count(query)?;
        self.perform(&request)
    }

    pub fn build_delete(&self, doc: DeleteDocument) -> Result<HttpRequest, ElasticError> {
        let target = PathTarget {
            index: Some(doc.index),
            doc_type: doc.doc_type,
            id: doc.id,
            operation: None,
        };
        self.build_request(HttpMethod::Delete, &target, &doc.params, None)
    }

    pub fn delete(&self, doc: DeleteDocument) -> Result<Outcome, ElasticError> {
        let request = self.build_delete(doc)?;
        self.perform(&request)
    }
}

fn present(segment: &Option<String>) -> Option<&str> {
    segment.as_deref().filter(|s| !s.is_empty())
}

/// Decode a string body, then merge `extra` into the top-level object.
fn search_body(body: Option<Body>, extra: Map<String, Value>) -> Result<Body, ElasticError> {
    let mut value = match body {
        Some(body) if !body.is_empty() => match body {
            Body::Raw(raw) => serde_json::from_str(&raw)
                .map_err(|e| ElasticError::InvalidBody(format!("search body is not JSON: {e}")))?,
            Body::Json(value) => value,
        },
        _ => Value::Object(Map::new()),
    };
    if !extra.is_empty() {
        match &mut value {
            Value::Object(map) => map.extend(extra),
            _ => {
                return Err(ElasticError::InvalidBody(
                    "search body must be a JSON object to merge extra fields".to_string(),
                ))
            }
        }
    }
    Ok(Body::Json(value))
}

fn encode_params(params: &Params) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key, &param_value(value));
    }
    serializer.finish()
}

fn param_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// 200 itself (and anything below) passes; every other status, 2xx and 3xx
/// included, is logged as a failure.
fn is_flagged_status(status: u16) -> bool {
    status > 200
}

fn log_request_fail(request: &HttpRequest, duration: Duration, status: &str) {
    warn!(
        target: LOG_TARGET,
        "{} {} [status:{} request time:{:.3}s]",
        request.method.as_str().to_ascii_lowercase(),
        request.url,
        status,
        duration.as_secs_f64()
    );
    if let Some(body) = &request.body {
        info!(target: LOG_TARGET, "> {}", body);
    }
}
