use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use cds_auth::{AuthConfig, Environment};
use cds_model::{Model, PageConfig};
use cqn::DataValue;
use odata_core::SkipToken;
use odata_service::{
    build_router, ActionCall, ActionError, ActionRegistry, AppState, MemoryStore, ServiceSettings,
};
use serde_json::{json, Value};
use tower::ServiceExt;

const CSN: &str = r#"{
  "definitions": {
    "CatalogService": { "kind": "service" },
    "CatalogService.Books": {
      "kind": "entity",
      "elements": {
        "ID": { "type": "cds.Integer", "key": true },
        "title": { "type": "cds.String" },
        "stock": { "type": "cds.Integer" },
        "cover": { "type": "cds.Binary" },
        "author": { "type": "cds.Association", "target": "CatalogService.Authors" }
      }
    },
    "CatalogService.Authors": {
      "kind": "entity",
      "elements": {
        "ID": { "type": "cds.Integer", "key": true },
        "name": { "type": "cds.String" }
      }
    },
    "AdminService": { "kind": "service", "@requires": "admin" },
    "AdminService.Books": {
      "kind": "entity",
      "elements": {
        "ID": { "type": "cds.Integer", "key": true },
        "title": { "type": "cds.String" }
      }
    }
  }
}"#;

fn books() -> Vec<DataValue> {
    vec![
        json!({"ID": 201, "title": "Wuthering Heights", "stock": 12}).into(),
        json!({"ID": 207, "title": "Jane Eyre", "stock": 11}).into(),
        json!({"ID": 251, "title": "The Raven", "stock": 333}).into(),
        json!({"ID": 252, "title": "Eleonora", "stock": 555}).into(),
        json!({"ID": 271, "title": "Catweazle", "stock": 22}).into(),
    ]
}

fn restock(call: ActionCall<'_>) -> Result<DataValue, ActionError> {
    let qty = call
        .params
        .get("qty")
        .map(DataValue::to_json)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| ActionError::new("qty is required"))?;
    if qty <= 0 {
        return Err(ActionError::new("qty must be positive"));
    }
    let book = call.instances.first().map(DataValue::to_json).unwrap_or(Value::Null);
    let stock = book.get("stock").and_then(Value::as_i64).unwrap_or(0);
    Ok(json!({ "ID": book["ID"], "stock": stock + qty }).into())
}

fn app_with(settings: ServiceSettings) -> Router {
    let model = Arc::new(Model::from_json_str(CSN).unwrap());
    let store = Arc::new(MemoryStore::new(model.clone()));
    store.seed("CatalogService.Books", books()).unwrap();
    store
        .seed(
            "AdminService.Books",
            vec![json!({"ID": 1, "title": "Ledger"}).into()],
        )
        .unwrap();

    let actions = ActionRegistry::new().register("CatalogService.Books", "restock", restock);
    let state = AppState::new(model, settings, store)
        .with_auth(&AuthConfig::default(), Environment::default(), None)
        .unwrap()
        .with_actions(actions);
    build_router(Arc::new(state))
}

fn app() -> Router {
    app_with(ServiceSettings::default())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn send_json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn basic(user: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:secret", user)))
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

async fn call_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = call(app, req).await;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

fn titles(page: &Value) -> Vec<&str> {
    page["value"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["title"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn health_carries_request_ids() {
    let app = app();

    let (status, headers, body) = call(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    let generated = headers.get("x-request-id").unwrap().to_str().unwrap();
    assert_eq!(generated.len(), 32);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "healthy");

    let req = Request::builder()
        .uri("/health")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = call(&app, req).await;
    assert_eq!(headers.get("x-request-id").unwrap(), "abc-123");
}

#[tokio::test]
async fn index_lists_services_and_sets() {
    let (status, headers, body) = call(&app(), get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));

    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Welcome to the CDS OData server"));
    assert!(html.contains("<h2>CatalogService</h2>"));
    assert!(html.contains("href=\"/odata/v4/CatalogService/Books\""));
    assert!(html.contains("href=\"/v2/AdminService/\""));
    assert!(html.contains("requires <code>admin</code>"));
}

#[tokio::test]
async fn service_document_lists_entity_sets() {
    let (status, doc) = call_json(&app(), get("/odata/v4/CatalogService/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["@odata.context"], "/odata/v4/CatalogService/$metadata");
    let names: Vec<&str> = doc["value"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"Books"));
    assert!(names.contains(&"Authors"));
}

#[tokio::test]
async fn query_options_shape_the_collection() {
    let uri = "/odata/v4/CatalogService/Books?$filter=stock%20gt%2020&$orderby=stock%20desc&$select=title&$top=2";
    let (status, page) = call_json(&app(), get(uri)).await;
    assert_eq!(status, StatusCode::OK, "{page}");
    assert_eq!(page["@odata.context"], "/odata/v4/CatalogService/$metadata#Books");
    assert_eq!(titles(&page), vec!["Eleonora", "The Raven"]);

    let first = page["value"][0].as_object().unwrap();
    assert!(first.contains_key("ID"));
    assert!(!first.contains_key("stock"));
    assert!(page.get("@odata.nextLink").is_none());
}

#[tokio::test]
async fn server_driven_paging_follows_next_links() {
    let settings = ServiceSettings::default().with_page_defaults(PageConfig::new(Some(2), None));
    let app = app_with(settings);

    let mut uri = "/odata/v4/CatalogService/Books".to_string();
    let mut sizes = Vec::new();
    let mut seen = Vec::new();
    loop {
        let (status, page) = call_json(&app, get(&uri)).await;
        assert_eq!(status, StatusCode::OK, "{page}");
        sizes.push(page["value"].as_array().unwrap().len());
        seen.extend(titles(&page).into_iter().map(String::from));
        match page.get("@odata.nextLink").and_then(Value::as_str) {
            Some(next) => uri = next.to_string(),
            None => break,
        }
    }
    assert_eq!(sizes, vec![2, 2, 1]);
    assert_eq!(seen.len(), 5);
    assert!(seen.contains(&"Catweazle".to_string()));
}

#[tokio::test]
async fn huge_skip_with_cursor_yields_an_empty_page() {
    let settings = ServiceSettings::default().with_page_defaults(PageConfig::new(Some(2), None));
    let app = app_with(settings);

    let token = SkipToken::new(1).encode();
    let uri = format!(
        "/odata/v4/CatalogService/Books?$skip={}&$skiptoken={token}",
        u64::MAX
    );
    let (status, page) = call_json(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK, "{page}");
    assert_eq!(page["value"], json!([]));
    assert!(page.get("@odata.nextLink").is_none());
}

#[tokio::test]
async fn counts_inline_and_as_segment() {
    let app = app();

    let (status, page) = call_json(&app, get("/odata/v4/CatalogService/Books?$count=true&$top=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["@odata.count"], 5);
    assert_eq!(page["value"].as_array().unwrap().len(), 1);

    let (status, headers, body) = call(&app, get("/odata/v4/CatalogService/Books/$count")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(body, b"5");
}

#[tokio::test]
async fn single_entity_and_missing_key() {
    let app = app();

    let (status, book) = call_json(&app, get("/odata/v4/CatalogService/Books(207)")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["title"], "Jane Eyre");
    assert_eq!(
        book["@odata.context"],
        "/odata/v4/CatalogService/$metadata#Books/$entity"
    );

    let (status, problem) = call_json(&app, get("/odata/v4/CatalogService/Books(999)")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(problem["code"], "ENTITY_NOT_FOUND");
    assert_eq!(problem["instance"], "/odata/v4/CatalogService/Books(999)");
}

#[tokio::test]
async fn create_decodes_binaries_and_drops_unknown_fields() {
    let app = app();
    let payload = json!({
        "ID": 300,
        "title": "Dracula",
        "cover": "aGVsbG8=",
        "bogus": true,
        "author": { "ID": 1 }
    });

    let (status, headers, body) = call(&app, send_json("POST", "/odata/v4/CatalogService/Books", payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        headers.get(header::LOCATION).unwrap(),
        "/odata/v4/CatalogService/Books(300)"
    );
    let created: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(created["cover"], "aGVsbG8=");
    assert!(created.get("bogus").is_none());
    assert!(created.get("author").is_none());

    let (status, book) = call_json(&app, get("/odata/v4/CatalogService/Books(300)")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["cover"], "aGVsbG8=");

    let (status, problem) = call_json(&app, send_json("POST", "/odata/v4/CatalogService/Books", payload)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(problem["code"], "ENTITY_CONFLICT");

    let broken = json!({ "ID": 301, "cover": "!!!" });
    let (status, problem) = call_json(&app, send_json("POST", "/odata/v4/CatalogService/Books", broken)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(problem["code"], "ODATA_INVALID_PAYLOAD");
}

#[tokio::test]
async fn update_and_delete_by_key() {
    let app = app();

    let (status, book) = call_json(
        &app,
        send_json("PATCH", "/odata/v4/CatalogService/Books(201)", json!({ "stock": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{book}");
    assert_eq!(book["stock"], 7);
    assert_eq!(book["title"], "Wuthering Heights");

    let (status, problem) = call_json(
        &app,
        send_json("PATCH", "/odata/v4/CatalogService/Books(201)", json!({ "ID": 999 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(problem["code"], "ODATA_INVALID_KEY");

    let delete = Request::builder()
        .method("DELETE")
        .uri("/odata/v4/CatalogService/Books(201)")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = call(&app, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());

    let (status, _) = call_json(&app, get("/odata/v4/CatalogService/Books(201)")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_select_property_is_rejected() {
    let (status, problem) = call_json(&app(), get("/odata/v4/CatalogService/Books?$select=price")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(problem["code"], "ODATA_UNKNOWN_PROPERTY");
}

#[tokio::test]
async fn restricted_service_requires_role() {
    let app = app();

    let (status, headers, _) = call(&app, get("/odata/v4/AdminService/Books")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        headers.get(header::WWW_AUTHENTICATE).unwrap(),
        "Basic realm=\"Users\""
    );

    let req = Request::builder()
        .uri("/odata/v4/AdminService/Books")
        .header(header::AUTHORIZATION, basic("alice"))
        .body(Body::empty())
        .unwrap();
    let (status, page) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&page), vec!["Ledger"]);

    let req = Request::builder()
        .uri("/odata/v4/AdminService/Books")
        .header(header::AUTHORIZATION, basic("carol"))
        .body(Body::empty())
        .unwrap();
    let (status, problem) = call_json(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(problem["code"], "FORBIDDEN");
}

#[tokio::test]
async fn v2_mount_uses_the_verbose_envelope() {
    let app = app();

    let (status, doc) = call_json(&app, get("/v2/CatalogService/Books?$inlinecount=allpages&$top=2")).await;
    assert_eq!(status, StatusCode::OK, "{doc}");
    assert_eq!(doc["d"]["results"].as_array().unwrap().len(), 2);
    assert_eq!(doc["d"]["__count"], "5");

    let (status, doc) = call_json(&app, get("/v2/CatalogService/Books(251)")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["d"]["title"], "The Raven");

    let (status, doc) = call_json(&app, get("/v2/CatalogService/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["d"]["EntitySets"]
        .as_array()
        .unwrap()
        .contains(&json!("Books")));

    let (status, problem) = call_json(&app, get("/v2/CatalogService/Books?$inlinecount=maybe")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(problem["code"], "ODATA_INVALID_QUERY");
}

#[tokio::test]
async fn bound_actions_run_registered_handlers() {
    let app = app();

    let (status, out) = call_json(
        &app,
        send_json(
            "POST",
            "/odata/v4/CatalogService/Books(201)/CatalogService.restock",
            json!({ "qty": 5 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{out}");
    assert_eq!(out["ID"], 201);
    assert_eq!(out["stock"], 17);

    let (status, problem) = call_json(
        &app,
        send_json(
            "POST",
            "/odata/v4/CatalogService/Books(201)/CatalogService.burn",
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(problem["code"], "ACTION_NOT_FOUND");

    let (status, problem) = call_json(
        &app,
        send_json(
            "POST",
            "/odata/v4/CatalogService/Books(201)/CatalogService.restock",
            json!({ "qty": -1 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(problem["code"], "ACTION_FAILED");

    let (status, _) = call_json(
        &app,
        send_json(
            "POST",
            "/odata/v4/CatalogService/Books(999)/CatalogService.restock",
            json!({ "qty": 1 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_service_and_entity_set() {
    let app = app();

    let (status, problem) = call_json(&app, get("/odata/v4/NopeService/Books")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(problem["code"], "SERVICE_NOT_FOUND");

    let (status, problem) = call_json(&app, get("/odata/v4/CatalogService/Nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(problem["code"], "ENTITY_SET_NOT_FOUND");
}

#[tokio::test]
async fn static_assets_fall_back_to_not_found() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("app.js"), "console.log('hi');").unwrap();

    let settings = ServiceSettings::default().with_static_dir(Some(dir.path().to_path_buf()));
    let app = app_with(settings);

    let (status, _, body) = call(&app, get("/app.js")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"console.log('hi');");

    let (status, _, _) = call(&app, get("/missing.css")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call_json(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
}
