use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::watch;
use tower::ServiceExt;

use cat_harvest::images::ImageDir;
use cat_harvest::ingest::Ingestor;
use cat_harvest::query::CatQuery;
use cat_harvest::server::{build_router, AppState};
use cat_harvest::upstream::{ImageSource, UpstreamError};
use cat_harvest_core::models::{Breed, Candidate, NewCat, NewTag};
use cat_harvest_core::store::memory::InMemoryStore;
use cat_harvest_core::store::Store;

struct OneCat;

#[async_trait]
impl ImageSource for OneCat {
    async fn search(&self) -> Result<Vec<Candidate>, UpstreamError> {
        Ok(vec![Candidate {
            id: "fresh".into(),
            url: "http://cdn.invalid/images/fresh.jpg".into(),
            width: 100,
            height: 120,
            breeds: vec![Breed {
                name: Some("Bengal".into()),
                temperament: "Alert, Agile".into(),
            }],
        }])
    }

    async fn download(&self, _url: &str) -> Result<Vec<u8>, UpstreamError> {
        Ok(b"jpeg".to_vec())
    }
}

struct Harness {
    _tmp: TempDir,
    _shutdown: watch::Sender<bool>,
    store: Arc<InMemoryStore>,
    app: Router,
}

/// Router over an in-memory store seeded with 12 cats; every third cat is
/// tagged "Playful".
async fn harness() -> Harness {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(InMemoryStore::new());
    let playful = store
        .insert_tag(&NewTag::new("Playful", Utc::now()))
        .await
        .unwrap()
        .into_tag();
    for i in 0..12 {
        let tags = if i % 3 == 0 { vec![playful.id] } else { vec![] };
        let cat = NewCat {
            cat_id: format!("seed-{}", i),
            width: 10,
            height: 10,
            image_path: String::new(),
            created: Utc::now(),
        };
        store.insert_cat(&cat, &tags).await.unwrap();
    }

    let ingestor = Ingestor::new(
        store.clone(),
        Arc::new(OneCat),
        ImageDir::new(tmp.path().join("CatImages")),
    );
    let (tx, rx) = watch::channel(false);
    let app = build_router(AppState {
        ingestor,
        query: CatQuery::new(store.clone()),
        shutdown: rx,
    });

    Harness {
        _tmp: tmp,
        _shutdown: tx,
        store,
        app,
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn test_health() {
    let h = harness().await;
    let (status, body) = get(&h.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_get_cat_found() {
    let h = harness().await;
    let (status, body) = get(&h.app, "/api/cats/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 1);
    assert_eq!(body["catId"], "seed-0");
    assert_eq!(body["imagePath"], "");
    assert_eq!(body["tags"][0]["name"], "Playful");
    assert!(body["created"].is_string());
}

#[tokio::test]
async fn test_get_cat_not_found() {
    let h = harness().await;
    let (status, body) = get(&h.app, "/api/cats/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_get_cat_bad_ids() {
    let h = harness().await;
    for uri in ["/api/cats/0", "/api/cats/-4", "/api/cats/abc"] {
        let (status, body) = get(&h.app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"]["code"], "bad_request");
    }
}

#[tokio::test]
async fn test_list_defaults() {
    let h = harness().await;
    let (status, body) = get(&h.app, "/api/cats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalCount"], 12);
    assert_eq!(body["cats"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn test_list_paging_and_tag() {
    let h = harness().await;
    let (_, body) = get(&h.app, "/api/cats?page=2&pageSize=5").await;
    let cats = body["cats"].as_array().unwrap();
    assert_eq!(cats.len(), 5);
    assert_eq!(cats[0]["catId"], "seed-5");

    let (_, body) = get(&h.app, "/api/cats?page=3&pageSize=5").await;
    assert_eq!(body["cats"].as_array().unwrap().len(), 2);

    let (_, body) = get(&h.app, "/api/cats?page=9&pageSize=5").await;
    assert_eq!(body["totalCount"], 12);
    assert!(body["cats"].as_array().unwrap().is_empty());

    let (status, body) = get(&h.app, "/api/cats?tag=Playful").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalCount"], 4);
    for cat in body["cats"].as_array().unwrap() {
        assert_eq!(cat["tags"][0]["name"], "Playful");
    }

    let (_, body) = get(&h.app, "/api/cats?tag=").await;
    assert_eq!(body["totalCount"], 12);
}

#[tokio::test]
async fn test_list_rejects_non_positive() {
    let h = harness().await;
    for uri in [
        "/api/cats?page=0",
        "/api/cats?pageSize=0",
        "/api/cats?page=-1",
        "/api/cats?pageSize=ten",
    ] {
        let (status, body) = get(&h.app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"]["code"], "bad_request");
    }
}

#[tokio::test]
async fn test_fetch_runs_ingestion() {
    let h = harness().await;
    let req = Request::post("/api/cats/fetch").body(Body::empty()).unwrap();
    let (status, body) = send(&h.app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Fetched and stored new cats.");
    assert_eq!(body["report"]["inserted"], 1);
    assert_eq!(body["report"]["tagsCreated"], 2);
    assert!(body.get("error").is_none());
    assert!(h.store.cat_exists("fresh").await.unwrap());

    let req = Request::post("/api/cats/fetch").body(Body::empty()).unwrap();
    let (status, body) = send(&h.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["skippedExisting"], 1);
}

#[tokio::test]
async fn test_openapi_document_lists_cat_routes() {
    let h = harness().await;
    let (status, body) = get(&h.app, "/swagger/v1/swagger.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["openapi"].as_str().unwrap().starts_with("3."));

    let paths = &body["paths"];
    assert!(paths["/api/cats/fetch"]["post"].is_object());
    assert!(paths["/api/cats/{id}"]["get"].is_object());
    assert!(paths["/api/cats"]["get"].is_object());
    assert!(paths["/health"]["get"].is_object());

    let schemas = &body["components"]["schemas"];
    for name in ["Cat", "Tag", "CatPage", "FetchResponse"] {
        assert!(schemas[name].is_object(), "{}", name);
    }
    assert!(schemas["Cat"]["properties"]["catId"].is_object());
}
