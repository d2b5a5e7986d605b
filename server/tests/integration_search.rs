use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bsbi_core::{BsbiIndex, IndexConfig};
use http_body_util::BodyExt;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use tower::ServiceExt;

fn build_tiny_index(dir: &Path) {
    let data = dir.join("collection");
    fs::create_dir_all(data.join("0")).unwrap();
    fs::create_dir_all(data.join("1")).unwrap();
    fs::write(data.join("0/1.txt"), "Rust is great. Rust systems programming.").unwrap();
    fs::write(data.join("0/2.txt"), "Learning rust.").unwrap();
    fs::write(data.join("1/3.txt"), "Gardening in spring.").unwrap();
    BsbiIndex::new(IndexConfig::new(&data, dir.join("index"))).index().unwrap();
}

fn app(dir: &Path) -> Router {
    server::build_app(dir.join("index"), dir.join("collection"), "main_index").unwrap()
}

async fn call(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, body) = call(app(dir.path()), "/search?q=rust&k=2&mode=tfidf").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["mode"], "tfidf");
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["doc_key"], "0/1.txt");
    assert_eq!(arr[1]["doc_key"], "0/2.txt");
    assert!(arr[0]["score"].as_f64().unwrap() >= arr[1]["score"].as_f64().unwrap());
    assert_eq!(arr[1]["preview"], "Learning rust.");
}

#[tokio::test]
async fn search_paginates() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, body) = call(app(dir.path()), "/search?q=rust&page=2&page_size=1").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 2);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["rank"], 2);
}

#[tokio::test]
async fn page_far_past_the_end_is_empty() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let uri = format!("/search?q=rust&page={}&page_size=100", usize::MAX);
    let (status, body) = call(app(dir.path()), &uri).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 2);
    assert!(json["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_query_is_empty_not_an_error() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, body) = call(app(dir.path()), "/search?q=zzzz%20the").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 0);
}

#[tokio::test]
async fn doc_endpoint_serves_and_guards_content() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());

    let (status, body) = call(app(dir.path()), "/doc?key=1/3.txt").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["text"], "Gardening in spring.");

    let (status, _) = call(app(dir.path()), "/doc?key=1/404.txt").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(app(dir.path()), "/doc?key=../index/terms.dict").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
