use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mock_server::app;
use serde_json::Value;
use tower::{Service, ServiceExt};

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    json_request(method, uri, "")
}

/// Send one request through a long-lived router so state carries over.
async fn call(app: &mut axum::routing::RouterIntoService<String>, req: Request<String>) -> (StatusCode, Value) {
    let resp = ServiceExt::ready(app).await.unwrap().call(req).await.unwrap();
    let status = resp.status();
    (status, body_json(resp).await)
}

fn service() -> axum::routing::RouterIntoService<String> {
    let router: Router = app();
    router.into_service()
}

// --- documents ---

#[tokio::test]
async fn put_creates_then_updates() {
    let mut app = service();

    let (status, body) = call(&mut app, json_request("PUT", "/places/7", r#"{"name":"a"}"#)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["result"], "created");
    assert_eq!(body["_type"], "_doc");

    let (status, body) = call(&mut app, json_request("PUT", "/places/7", r#"{"name":"b"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "updated");

    let (status, body) = call(&mut app, empty_request("GET", "/places/7")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["_source"]["name"], "b");
}

#[tokio::test]
async fn put_with_doc_type_records_type() {
    let mut app = service();
    let (status, body) = call(&mut app, json_request("PUT", "/places/poi/1", r#"{"a":1}"#)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["_type"], "poi");
    assert_eq!(body["_id"], "1");
}

#[tokio::test]
async fn post_generates_an_id() {
    let mut app = service();
    let (status, body) = call(&mut app, json_request("POST", "/places", r#"{"a":1}"#)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["_id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());

    let (status, body) = call(&mut app, empty_request("GET", &format!("/places/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["_source"]["a"], 1);
}

#[tokio::test]
async fn malformed_document_returns_400() {
    let app = app();
    let resp = app
        .oneshot(json_request("PUT", "/places/1", "{not json"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["type"], "parse_exception");
}

#[tokio::test]
async fn get_missing_index_returns_404() {
    let app = app();
    let resp = app.oneshot(empty_request("GET", "/nope/1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_missing_document_returns_404() {
    let app = app();
    let resp = app.oneshot(empty_request("DELETE", "/places/1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["result"], "not_found");
}

#[tokio::test]
async fn unknown_route_returns_400() {
    let app = app();
    let resp = app.oneshot(empty_request("PATCH", "/places/1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- search / count ---

#[tokio::test]
async fn search_missing_index_respects_ignore_unavailable() {
    let mut app = service();

    let (status, body) = call(&mut app, empty_request("GET", "/nope/_search")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "index_not_found_exception");

    let (status, body) = call(
        &mut app,
        empty_request("GET", "/nope/_search?ignore_unavailable=true"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hits"]["total"]["value"], 0);
}

#[tokio::test]
async fn search_windows_with_from_and_size() {
    let mut app = service();
    for id in 0..5 {
        call(&mut app, json_request("PUT", &format!("/i/{id}"), r#"{"n":1}"#)).await;
    }

    let (status, body) = call(&mut app, empty_request("GET", "/i/_search?from=1&size=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hits"]["total"]["value"], 5);
    let ids: Vec<&str> = body["hits"]["hits"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["1", "2"]);
}

#[tokio::test]
async fn search_all_filters_by_type() {
    let mut app = service();
    call(&mut app, json_request("PUT", "/a/poi/1", r#"{}"#)).await;
    call(&mut app, json_request("PUT", "/b/poi/2", r#"{}"#)).await;
    call(&mut app, json_request("PUT", "/b/addr/3", r#"{}"#)).await;

    let (_, body) = call(&mut app, empty_request("GET", "/_all/poi/_search")).await;
    assert_eq!(body["hits"]["total"]["value"], 2);

    let (_, body) = call(&mut app, empty_request("GET", "/_search")).await;
    assert_eq!(body["hits"]["total"]["value"], 3);
}

#[tokio::test]
async fn bad_size_returns_400() {
    let app = app();
    let resp = app
        .oneshot(empty_request("GET", "/_search?size=many"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn count_counts_documents() {
    let mut app = service();
    call(&mut app, json_request("PUT", "/i/1", r#"{}"#)).await;
    call(&mut app, json_request("PUT", "/i/2", r#"{}"#)).await;

    let (status, body) = call(&mut app, json_request("POST", "/i/_count", r#"{}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
}

// --- bulk ---

#[tokio::test]
async fn bulk_indexes_and_deletes() {
    let mut app = service();
    let ndjson = [
        r#"{"index":{"_id":"1"}}"#,
        r#"{"name":"one"}"#,
        r#"{"create":{"_index":"other","_id":"2"}}"#,
        r#"{"name":"two"}"#,
        r#"{"delete":{"_id":"1"}}"#,
    ]
    .join("\n");

    let (status, body) = call(&mut app, json_request("POST", "/i/_bulk", &ndjson)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["errors"], false);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["index"]["status"], 201);
    assert_eq!(items[1]["create"]["_index"], "other");
    assert_eq!(items[2]["delete"]["result"], "deleted");

    let (_, body) = call(&mut app, empty_request("GET", "/_count")).await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn bulk_create_conflict_sets_errors() {
    let mut app = service();
    let ndjson = [
        r#"{"create":{"_index":"i","_id":"1"}}"#,
        r#"{}"#,
        r#"{"create":{"_index":"i","_id":"1"}}"#,
        r#"{}"#,
    ]
    .join("\n");

    let (_, body) = call(&mut app, json_request("POST", "/_bulk", &ndjson)).await;
    assert_eq!(body["errors"], true);
    assert_eq!(body["items"][1]["create"]["status"], 409);
}

#[tokio::test]
async fn bulk_accepts_payloads_past_two_mebibytes() {
    let app = app();
    let source = format!(r#"{{"blob":"{}"}}"#, "z".repeat(3 * 1024 * 1024));
    let ndjson = format!("{{\"index\":{{\"_id\":\"1\"}}}}\n{source}\n");
    let resp = app
        .oneshot(json_request("POST", "/big/_bulk", &ndjson))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["items"][0]["index"]["status"], 201);
}

#[tokio::test]
async fn bulk_without_index_is_rejected() {
    let app = app();
    let resp = app
        .oneshot(json_request("POST", "/_bulk", "{\"index\":{}}\n{}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
