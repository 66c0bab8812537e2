//! HTTP API tests, in-process and over a real socket
//!
//! Run with: cargo test --test api_tests

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use lokalisointi::api::router;
use lokalisointi::error::Result;
use lokalisointi::integrations::{DisabledImporter, KeyImporter};
use lokalisointi::storage::{MemoryObjectStore, OverrideStore};
use lokalisointi::sync::{read_archive, HttpPeerClient, PeerClient};
use lokalisointi::types::*;
use lokalisointi::LokalisointiService;

/// Importer recording what it was asked to import
#[derive(Default)]
struct RecordingImporter {
    accept: bool,
    imported: Mutex<Vec<Localisation>>,
}

#[async_trait]
impl KeyImporter for RecordingImporter {
    async fn import_key(&self, localisation: &Localisation) -> Result<bool> {
        self.imported.lock().push(localisation.clone());
        Ok(self.accept)
    }
}

fn config(env: Environment, slug: &str, urls: EnvironmentUrls) -> ServiceConfig {
    ServiceConfig {
        env_name: env,
        base_store: BaseStoreConfig::new(slug),
        environment_urls: urls,
        public_cache_max_age_minutes: 5,
    }
}

fn service_with(
    env: Environment,
    store: Arc<MemoryObjectStore>,
    peer: Arc<dyn PeerClient>,
    importer: Arc<dyn KeyImporter>,
    urls: EnvironmentUrls,
) -> Arc<LokalisointiService> {
    Arc::new(LokalisointiService::new(
        config(env, "abc123", urls),
        store,
        OverrideStore::open_in_memory().unwrap(),
        peer,
        importer,
    ))
}

fn app(env: Environment) -> (Arc<MemoryObjectStore>, Router) {
    let store = Arc::new(MemoryObjectStore::new());
    store.insert("t-lokalisointi/abc123/example/fi.json", r#"{"greet":"Hei"}"#);
    store.insert("t-lokalisointi/abc123/sv.json", r#"{"root":"Rot"}"#);
    let service = service_with(
        env,
        store.clone(),
        Arc::new(HttpPeerClient::new(EnvironmentUrls::default()).unwrap()),
        Arc::new(DisabledImporter),
        EnvironmentUrls::default(),
    );
    (store, router(service))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-user", "alice")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let (_, app) = app(Environment::Untuva);
    let (status, _, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["environment"], "untuva");
}

#[tokio::test]
async fn test_query_sets_cache_control() {
    let (_, app) = app(Environment::Untuva);

    let (status, headers, body) = send(
        &app,
        get("/lokalisointi/api/v1/localisation?namespace=example&locale=fi"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=300");
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        body,
        json!([{"namespace": "example", "category": "example", "key": "greet", "locale": "fi", "value": "Hei"}])
    );

    let (_, headers, _) = send(&app, get("/lokalisointi/api/v1/localisation?cache=false")).await;
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
}

#[tokio::test]
async fn test_conflicting_filters_are_bad_request() {
    let (_, app) = app(Environment::Untuva);
    let (status, _, body) = send(
        &app,
        get("/lokalisointi/api/v1/localisation?namespace=a&category=b"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        body["error"]["message"],
        "category and namespace are both defined and but do not match"
    );
}

#[tokio::test]
async fn test_override_crud() {
    let (_, app) = app(Environment::Untuva);

    let (status, _, body) = send(
        &app,
        json_request(
            Method::POST,
            "/lokalisointi/api/v1/override",
            json!({"namespace": "example", "key": "greet", "locale": "fi", "value": "Moi"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let created: LocalisationOverride = serde_json::from_slice(&body).unwrap();
    assert_eq!(created.created_by, "alice");

    let (_, _, body) = send(
        &app,
        get("/lokalisointi/api/v1/localisation?namespace=example&locale=fi"),
    )
    .await;
    let result: Vec<Localisation> = serde_json::from_slice(&body).unwrap();
    assert_eq!(result[0].value, "Moi");
    assert_eq!(result[0].id, Some(created.id));

    let (status, _, body) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/lokalisointi/api/v1/override/{}", created.id),
            json!({"namespace": "example", "key": "greet", "locale": "fi", "value": "Terve"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let updated: LocalisationOverride = serde_json::from_slice(&body).unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.value, "Terve");

    let (_, _, body) = send(&app, get("/lokalisointi/api/v1/override")).await;
    let all: Vec<LocalisationOverride> = serde_json::from_slice(&body).unwrap();
    assert_eq!(all.len(), 1);

    let (status, _, body) = send(
        &app,
        Request::builder()
            .method(Method::DELETE)
            .uri(format!("/lokalisointi/api/v1/override/{}", created.id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Status>(&body).unwrap(), Status::ok());

    let (_, _, body) = send(&app, get("/lokalisointi/api/v1/override")).await;
    assert_eq!(body, b"[]".to_vec());
}

#[tokio::test]
async fn test_override_accepts_category_field() {
    let (_, app) = app(Environment::Untuva);

    let (status, _, body) = send(
        &app,
        json_request(
            Method::POST,
            "/lokalisointi/api/v1/override",
            json!({"category": "example", "key": "greet", "locale": "fi", "value": "Moi"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let created: LocalisationOverride = serde_json::from_slice(&body).unwrap();
    assert_eq!(created.namespace.as_deref(), Some("example"));
}

#[tokio::test]
async fn test_override_namespaces_union() {
    let (_, app) = app(Environment::Untuva);
    send(
        &app,
        json_request(
            Method::POST,
            "/lokalisointi/api/v1/override",
            json!({"namespace": "only-override", "key": "k", "locale": "fi", "value": "v"}),
        ),
    )
    .await;

    let (_, _, body) = send(&app, get("/lokalisointi/api/v1/override/available-namespaces")).await;
    let namespaces: Vec<String> = serde_json::from_slice(&body).unwrap();
    assert_eq!(namespaces, vec!["example".to_string(), "only-override".to_string()]);
}

#[tokio::test]
async fn test_mass_update_outside_test_environment() {
    let store = Arc::new(MemoryObjectStore::new());
    let importer = Arc::new(RecordingImporter::default());
    let service = service_with(
        Environment::Sade,
        store,
        Arc::new(HttpPeerClient::new(EnvironmentUrls::default()).unwrap()),
        importer.clone(),
        EnvironmentUrls::default(),
    );
    let existing = service
        .resolution()
        .save_override(&Localisation::base(Some("a".into()), "same", "fi", "v"), "u")
        .unwrap();
    let changed = service
        .resolution()
        .save_override(&Localisation::base(Some("a".into()), "changed", "fi", "old"), "u")
        .unwrap();

    let batch = vec![
        existing.to_localisation(),
        Localisation {
            value: "new".into(),
            ..changed.to_localisation()
        },
        Localisation {
            id: Some(9999),
            ..Localisation::base(Some("a".into()), "gone", "fi", "v")
        },
        Localisation::base(Some("a".into()), "fresh", "fi", "v"),
    ];
    let result = service.update_localisations(&batch, "bob").await.unwrap();

    assert_eq!(
        result,
        MassUpdateResult {
            not_modified: 1,
            created: 2,
            updated: 1,
            status: "OK".into(),
        }
    );
    assert!(importer.imported.lock().is_empty());
    assert_eq!(service.resolution().find_overrides().unwrap().len(), 4);
}

#[tokio::test]
async fn test_mass_update_in_test_environment_imports_new_keys() {
    let importer = Arc::new(RecordingImporter {
        accept: true,
        ..Default::default()
    });
    let service = service_with(
        Environment::Pallero,
        Arc::new(MemoryObjectStore::new()),
        Arc::new(HttpPeerClient::new(EnvironmentUrls::default()).unwrap()),
        importer.clone(),
        EnvironmentUrls::default(),
    );
    let app = router(service.clone());

    let (status, _, body) = send(
        &app,
        json_request(
            Method::POST,
            "/lokalisointi/api/v1/localisation/update",
            json!([{"namespace": "a", "key": "new", "locale": "fi", "value": "uusi"}]),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let result: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        result,
        json!({"notModified": 0, "created": 1, "updated": 0, "status": "OK"})
    );
    assert_eq!(importer.imported.lock().len(), 1);
    assert!(service.resolution().find_overrides().unwrap().is_empty());
}

#[tokio::test]
async fn test_tolgee_file_conditional_requests() {
    let (_, app) = app(Environment::Untuva);

    let (status, headers, body) = send(&app, get("/lokalisointi/tolgee/abc123/example/fi.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, br#"{"greet":"Hei"}"#.to_vec());
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=300");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=fi.json"
    );
    let etag = headers[header::ETAG].clone();
    let last_modified = headers[header::LAST_MODIFIED].clone();

    let (status, headers, body) = send(
        &app,
        Request::builder()
            .uri("/lokalisointi/tolgee/abc123/example/fi.json")
            .header(header::IF_NONE_MATCH, etag.clone())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_MODIFIED);
    assert!(body.is_empty());
    assert_eq!(headers[header::ETAG], etag);
    assert_eq!(headers[header::LAST_MODIFIED], last_modified);
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=300");

    let (status, _, _) = send(
        &app,
        Request::builder()
            .uri("/lokalisointi/tolgee/abc123/example/fi.json")
            .header(header::IF_NONE_MATCH, "\"mismatch\"")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = send(&app, get("/lokalisointi/tolgee/abc123/sv.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, br#"{"root":"Rot"}"#.to_vec());

    let (status, _, _) = send(&app, get("/lokalisointi/tolgee/abc123/example/en.json")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tolgee_file_store_failure_is_500() {
    let (store, app) = app(Environment::Untuva);
    store.inject_failure(lokalisointi::error::StoreError::Fatal("denied".into()));

    let (status, _, _) = send(&app, get("/lokalisointi/tolgee/abc123/example/fi.json")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_ui_config() {
    let (_, app) = app(Environment::Hahtuva);
    let (_, _, body) = send(&app, get("/lokalisointi/api/v1/ui-config")).await;

    let config: UiConfig = serde_json::from_slice(&body).unwrap();
    assert_eq!(config.current_environment, Environment::Hahtuva);
    assert_eq!(
        config.source_environments,
        vec![Environment::Pallero, Environment::Untuva, Environment::Sade]
    );
}

#[tokio::test]
async fn test_export_endpoint() {
    let (_, app) = app(Environment::Untuva);

    let (status, headers, body) = send(
        &app,
        get("/lokalisointi/api/v1/copy/localisation-files?namespaces=example"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=localisations.zip"
    );
    let entries = read_archive(&body).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path(), "example/fi.json");

    let (_, _, body) = send(&app, get("/lokalisointi/api/v1/copy/localisation-files")).await;
    assert_eq!(read_archive(&body).unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_source_environment_is_bad_request() {
    let (_, app) = app(Environment::Untuva);
    let (status, _, _) = send(
        &app,
        get("/lokalisointi/api/v1/copy/available-namespaces?source=prod"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Two environments talking over real sockets
#[tokio::test]
async fn test_copy_between_environments_over_http() {
    let source_store = Arc::new(MemoryObjectStore::new());
    source_store.insert("t-lokalisointi/abc123/a/fi.json", r#"{"k":"a"}"#);
    source_store.insert("t-lokalisointi/abc123/b/fi.json", r#"{"k":"b"}"#);
    let source = service_with(
        Environment::Untuva,
        source_store,
        Arc::new(HttpPeerClient::new(EnvironmentUrls::default()).unwrap()),
        Arc::new(DisabledImporter),
        EnvironmentUrls::default(),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let source_app = router(source);
    let server = tokio::spawn(async move { axum::serve(listener, source_app).await });

    let urls = EnvironmentUrls {
        untuva: Some(format!("http://{}/", addr)),
        ..Default::default()
    };
    let target_store = Arc::new(MemoryObjectStore::new());
    target_store.insert("t-lokalisointi/abc123/stale/fi.json", "{}");
    let target = service_with(
        Environment::Hahtuva,
        target_store.clone(),
        Arc::new(HttpPeerClient::new(urls.clone()).unwrap()),
        Arc::new(DisabledImporter),
        urls,
    );
    let target_app = router(target);

    let (_, _, body) = send(
        &target_app,
        get("/lokalisointi/api/v1/copy/available-namespaces?source=untuva"),
    )
    .await;
    let namespaces: BTreeSet<String> = serde_json::from_slice(&body).unwrap();
    assert_eq!(namespaces, BTreeSet::from(["a".to_string(), "b".to_string()]));

    let (status, _, body) = send(
        &target_app,
        json_request(
            Method::POST,
            "/lokalisointi/api/v1/copy",
            json!({"source": "untuva", "namespaces": ["a"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Status>(&body).unwrap(), Status::ok());
    assert_eq!(
        target_store.keys(),
        vec![
            "t-lokalisointi/abc123/a/fi.json".to_string(),
            "t-lokalisointi/abc123/stale/fi.json".to_string(),
        ]
    );

    let (status, _, _) = send(
        &target_app,
        json_request(Method::POST, "/lokalisointi/api/v1/copy", json!({"source": "untuva"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        target_store.keys(),
        vec![
            "t-lokalisointi/abc123/a/fi.json".to_string(),
            "t-lokalisointi/abc123/b/fi.json".to_string(),
        ]
    );

    let (status, _, body) = send(
        &target_app,
        json_request(Method::POST, "/lokalisointi/api/v1/copy", json!({"source": "sade"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(serde_json::from_slice::<Status>(&body).unwrap(), Status::failed());

    server.abort();
}
