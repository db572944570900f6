use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};

use axum::{
    extract::{DefaultBodyLimit, Query, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_TYPE: &str = "_doc";
const DEFAULT_SIZE: usize = 10;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StoredDoc {
    pub doc_type: String,
    pub source: Value,
}

/// index name -> document id -> document
pub type Db = Arc<RwLock<BTreeMap<String, BTreeMap<String, StoredDoc>>>>;

#[derive(Clone, Default)]
pub struct Engine {
    db: Db,
    latency: Duration,
}

pub fn app() -> Router {
    app_with_latency(Duration::ZERO)
}

/// Every request sleeps for `latency` before it is handled.
pub fn app_with_latency(latency: Duration) -> Router {
    let engine = Engine {
        db: Db::default(),
        latency,
    };
    Router::new()
        .fallback(dispatch)
        .layer(DefaultBodyLimit::disable())
        .with_state(engine)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_latency(listener: TcpListener, latency: Duration) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_latency(latency)).await
}

async fn dispatch(
    State(engine): State<Engine>,
    method: Method,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> Response {
    if !engine.latency.is_zero() {
        tokio::time::sleep(engine.latency).await;
    }
    debug!(%method, %uri, "handling request");

    let segments: Vec<&str> = uri.path().split('/').filter(|s| !s.is_empty()).collect();
    let (last, scope) = match segments.split_last() {
        Some((last, scope)) => (*last, scope),
        None => ("", &segments[..]),
    };

    match (last, &method) {
        ("_search", &Method::GET | &Method::POST) => search(&engine, scope, &params).await,
        ("_count", &Method::GET | &Method::POST) => count(&engine, scope, &params).await,
        ("_bulk", &Method::POST | &Method::PUT) => bulk(&engine, scope, &body).await,
        _ => match (&method, segments.as_slice()) {
            (&Method::PUT, [index, id]) => put_doc(&engine, index, None, id, &body).await,
            (&Method::PUT, [index, doc_type, id]) => {
                put_doc(&engine, index, Some(*doc_type), id, &body).await
            }
            (&Method::POST, [index]) => post_doc(&engine, index, None, &body).await,
            (&Method::POST, [index, doc_type]) => post_doc(&engine, index, Some(*doc_type), &body).await,
            (&Method::GET, [index, id]) | (&Method::GET, [index, _, id]) => {
                get_doc(&engine, index, id).await
            }
            (&Method::DELETE, [index, id]) | (&Method::DELETE, [index, _, id]) => {
                delete_doc(&engine, index, id).await
            }
            _ => error_response(
                StatusCode::BAD_REQUEST,
                "illegal_argument_exception",
                format!("no handler for [{method}] {}", uri.path()),
            ),
        },
    }
}

fn error_response(status: StatusCode, kind: &str, reason: impl Into<String>) -> Response {
    let body = json!({
        "error": { "type": kind, "reason": reason.into() },
        "status": status.as_u16(),
    });
    (status, Json(body)).into_response()
}

fn parse_source(body: &str) -> Result<Value, Response> {
    serde_json::from_str(body).map_err(|e| {
        error_response(
            StatusCode::BAD_REQUEST,
            "parse_exception",
            format!("failed to parse document: {e}"),
        )
    })
}

async fn put_doc(engine: &Engine, index: &str, doc_type: Option<&str>, id: &str, body: &str) -> Response {
    let source = match parse_source(body) {
        Ok(source) => source,
        Err(resp) => return resp,
    };
    let doc_type = doc_type.unwrap_or(DEFAULT_TYPE).to_string();
    let mut db = engine.db.write().await;
    let previous = db.entry(index.to_string()).or_default().insert(
        id.to_string(),
        StoredDoc {
            doc_type: doc_type.clone(),
            source,
        },
    );
    let (status, result) = match previous {
        Some(_) => (StatusCode::OK, "updated"),
        None => (StatusCode::CREATED, "created"),
    };
    (
        status,
        Json(json!({ "_index": index, "_type": doc_type, "_id": id, "result": result })),
    )
        .into_response()
}

async fn post_doc(engine: &Engine, index: &str, doc_type: Option<&str>, body: &str) -> Response {
    let id = Uuid::new_v4().to_string();
    put_doc(engine, index, doc_type, &id, body).await
}

async fn get_doc(engine: &Engine, index: &str, id: &str) -> Response {
    let db = engine.db.read().await;
    let Some(docs) = db.get(index) else {
        return error_response(
            StatusCode::NOT_FOUND,
            "index_not_found_exception",
            format!("no such index [{index}]"),
        );
    };
    match docs.get(id) {
        Some(doc) => Json(json!({
            "_index": index,
            "_type": doc.doc_type,
            "_id": id,
            "found": true,
            "_source": doc.source,
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "_index": index, "_id": id, "found": false })),
        )
            .into_response(),
    }
}

async fn delete_doc(engine: &Engine, index: &str, id: &str) -> Response {
    let mut db = engine.db.write().await;
    let removed = db.get_mut(index).and_then(|docs| docs.remove(id));
    let (status, result) = match removed {
        Some(_) => (StatusCode::OK, "deleted"),
        None => (StatusCode::NOT_FOUND, "not_found"),
    };
    (
        status,
        Json(json!({ "_index": index, "_id": id, "result": result })),
    )
        .into_response()
}

/// Indices and optional type named by the path before `_search`/`_count`.
struct Scope<'a> {
    indices: Option<Vec<&'a str>>,
    doc_type: Option<&'a str>,
}

fn scope<'a>(segments: &[&'a str]) -> Scope<'a> {
    let indices = match segments.first() {
        None | Some(&"_all") => None,
        Some(&names) => Some(names.split(',').collect()),
    };
    Scope {
        indices,
        doc_type: segments.get(1).copied(),
    }
}

type Hit = (String, String, StoredDoc);

/// Collect matching documents in index/id order, or a 404 response when a
/// named index is missing and unavailable indices are not tolerated.
async fn matching_docs(
    engine: &Engine,
    segments: &[&str],
    params: &HashMap<String, String>,
) -> Result<(Vec<Hit>, usize), Response> {
    let scope = scope(segments);
    let ignore_unavailable = params.get("ignore_unavailable").map(String::as_str) == Some("true");
    let db = engine.db.read().await;

    let names: Vec<String> = match &scope.indices {
        Some(names) => {
            let mut found = Vec::new();
            for name in names {
                if db.contains_key(*name) {
                    found.push(name.to_string());
                } else if !ignore_unavailable {
                    return Err(error_response(
                        StatusCode::NOT_FOUND,
                        "index_not_found_exception",
                        format!("no such index [{name}]"),
                    ));
                }
            }
            found
        }
        None => db.keys().cloned().collect(),
    };

    let mut hits = Vec::new();
    for name in &names {
        if let Some(docs) = db.get(name) {
            for (id, doc) in docs {
                if scope.doc_type.map_or(true, |t| t == doc.doc_type) {
                    hits.push((name.clone(), id.clone(), doc.clone()));
                }
            }
        }
    }
    Ok((hits, names.len()))
}

fn shards(total: usize) -> Value {
    json!({ "total": total, "successful": total, "skipped": 0, "failed": 0 })
}

fn usize_param(params: &HashMap<String, String>, key: &str, default: usize) -> Result<usize, Response> {
    match params.get(key) {
        Some(raw) => raw.parse().map_err(|_| {
            error_response(
                StatusCode::BAD_REQUEST,
                "illegal_argument_exception",
                format!("failed to parse [{key}] value [{raw}]"),
            )
        }),
        None => Ok(default),
    }
}

async fn search(engine: &Engine, segments: &[&str], params: &HashMap<String, String>) -> Response {
    let result = async {
        let from = usize_param(params, "from", 0)?;
        let size = usize_param(params, "size", DEFAULT_SIZE)?;
        let (hits, shard_count) = matching_docs(engine, segments, params).await?;
        Ok::<_, Response>((from, size, hits, shard_count))
    }
    .await;
    let (from, size, hits, shard_count) = match result {
        Ok(parts) => parts,
        Err(resp) => return resp,
    };

    let total = hits.len();
    let max_score = if total > 0 { json!(1.0) } else { Value::Null };
    let page: Vec<Value> = hits
        .into_iter()
        .skip(from)
        .take(size)
        .map(|(index, id, doc)| {
            json!({
                "_index": index,
                "_type": doc.doc_type,
                "_id": id,
                "_score": 1.0,
                "_source": doc.source,
            })
        })
        .collect();

    Json(json!({
        "took": 0,
        "timed_out": false,
        "_shards": shards(shard_count),
        "hits": {
            "total": { "value": total, "relation": "eq" },
            "max_score": max_score,
            "hits": page,
        },
    }))
    .into_response()
}

async fn count(engine: &Engine, segments: &[&str], params: &HashMap<String, String>) -> Response {
    match matching_docs(engine, segments, params).await {
        Ok((hits, shard_count)) => Json(json!({
            "count": hits.len(),
            "_shards": shards(shard_count),
        }))
        .into_response(),
        Err(resp) => resp,
    }
}

#[derive(Debug, Deserialize, Default)]
struct ActionMeta {
    #[serde(rename = "_index")]
    index: Option<String>,
    #[serde(rename = "_type")]
    doc_type: Option<String>,
    #[serde(rename = "_id")]
    id: Option<String>,
}

async fn bulk(engine: &Engine, segments: &[&str], body: &str) -> Response {
    let default_index = segments.first().copied();
    let default_type = segments.get(1).copied().unwrap_or(DEFAULT_TYPE);

    let mut lines = body.lines().filter(|l| !l.trim().is_empty());
    let mut items = Vec::new();
    let mut db = engine.db.write().await;

    while let Some(line) = lines.next() {
        let action: HashMap<String, ActionMeta> = match serde_json::from_str(line) {
            Ok(action) => action,
            Err(e) => return bad_bulk(format!("malformed action line: {e}")),
        };
        let Some((op, meta)) = action.into_iter().next() else {
            return bad_bulk("empty action line");
        };
        let Some(index) = meta.index.as_deref().or(default_index) else {
            return bad_bulk(format!("index is missing for [{op}]"));
        };
        let doc_type = meta.doc_type.as_deref().unwrap_or(default_type);

        let (id, status, result) = match op.as_str() {
            "index" | "create" => {
                let source = match lines.next().map(|l| serde_json::from_str::<Value>(l)) {
                    Some(Ok(source)) => source,
                    _ => return bad_bulk(format!("missing or malformed source for [{op}]")),
                };
                let id = meta.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
                let docs = db.entry(index.to_string()).or_default();
                if op == "create" && docs.contains_key(&id) {
                    (id, StatusCode::CONFLICT, "version_conflict_engine_exception")
                } else {
                    let stored = StoredDoc {
                        doc_type: doc_type.to_string(),
                        source,
                    };
                    match docs.insert(id.clone(), stored) {
                        Some(_) => (id, StatusCode::OK, "updated"),
                        None => (id, StatusCode::CREATED, "created"),
                    }
                }
            }
            "delete" => {
                let id = meta.id.clone().unwrap_or_default();
                match db.get_mut(index).and_then(|docs| docs.remove(&id)) {
                    Some(_) => (id, StatusCode::OK, "deleted"),
                    None => (id, StatusCode::NOT_FOUND, "not_found"),
                }
            }
            other => return bad_bulk(format!("unsupported bulk action [{other}]")),
        };
        items.push(bulk_item(&op, index, doc_type, &id, status, result));
    }

    let errors = items
        .iter()
        .filter_map(|item| item.as_object()?.values().next()?.get("status")?.as_u64())
        .any(|status| status == u64::from(StatusCode::CONFLICT.as_u16()));
    Json(json!({ "took": 0, "errors": errors, "items": items })).into_response()
}

fn bad_bulk(reason: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, "illegal_argument_exception", reason)
}

fn bulk_item(op: &str, index: &str, doc_type: &str, id: &str, status: StatusCode, result: &str) -> Value {
    json!({ op: {
        "_index": index,
        "_type": doc_type,
        "_id": id,
        "result": result,
        "status": status.as_u16(),
    }})
}
