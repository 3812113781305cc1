//! Integration tests for the rumor API endpoints.
//!
//! Tests drive the Axum `Router` directly via `tower::ServiceExt` without
//! starting a TCP server.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use hearsay_api::{AppState, WorldFeed, build_router};
use hearsay_core::RumorService;
use hearsay_rumor::{
    InMemoryPositions, InMemoryWorldEvents, KnowledgeAccuracyEngine, KnowledgeConfig,
    LocalGarbler, NoopNotifier, PropagationConfig, PropagationEngine,
};
use hearsay_store::RumorStore;
use hearsay_types::{EntityId, Position, RumorId, WorldEvent, WorldEventId, WorldEventKind};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde_json::{Value, json};
use tower::ServiceExt;

fn make_service() -> Arc<RumorService<LocalGarbler>> {
    let store = Arc::new(RumorStore::new());
    let engine = PropagationEngine::with_rng(
        Arc::clone(&store),
        LocalGarbler,
        PropagationConfig::default(),
        SmallRng::seed_from_u64(7),
    );
    Arc::new(RumorService::new(store, engine, Arc::new(NoopNotifier)))
}

fn make_router() -> Router {
    build_router(Arc::new(AppState::new(make_service())))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn put_json(uri: &str, body: &Value) -> Request<Body> {
    Request::put(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn create(router: &Router, originator: EntityId, content: &str, severity: &str) -> String {
    let (status, json) = send(
        router,
        post_json(
            "/rumors",
            &json!({
                "originatorId": originator,
                "content": content,
                "categories": ["political", "gossip"],
                "severity": severity,
                "truthValue": 0.3,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["rumorId"].as_str().unwrap().to_owned()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_health() {
    let response = make_router().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["rumors"], 0);
}

#[tokio::test]
async fn test_create_and_get_rumor() {
    let router = make_router();
    let originator = EntityId::new();
    let id = create(&router, originator, "The mayor sold the well", "major").await;

    let (status, json) = send(&router, get(&format!("/rumors/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["rumor"]["id"], id.as_str());
    assert_eq!(json["rumor"]["severity"], "major");
    assert_eq!(json["rumor"]["lifecycle_state"], "active");
    assert_eq!(json["variants"].as_array().unwrap().len(), 1);
    assert_eq!(json["variants"][0]["content"], "The mayor sold the well");
    assert_eq!(json["spreads"][0]["believability"], 1.0);
}

#[tokio::test]
async fn test_create_rejects_bad_input() {
    let router = make_router();
    let originator = EntityId::new();

    let bad_severity = json!({
        "originatorId": originator,
        "content": "x",
        "categories": ["social"],
        "severity": "catastrophic",
        "truthValue": 0.5,
    });
    let (status, json) = send(&router, post_json("/rumors", &bad_severity)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);
    assert!(json["error"].as_str().unwrap().contains("catastrophic"));

    let bad_truth = json!({
        "originatorId": originator,
        "content": "x",
        "categories": ["social"],
        "severity": "minor",
        "truthValue": 1.5,
    });
    let (status, _) = send(&router, post_json("/rumors", &bad_truth)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let no_categories = json!({
        "originatorId": originator,
        "content": "x",
        "categories": [],
        "severity": "minor",
        "truthValue": 0.5,
    });
    let (status, _) = send(&router, post_json("/rumors", &no_categories)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let bad_id = json!({
        "originatorId": "nobody",
        "content": "x",
        "categories": ["social"],
        "severity": "minor",
        "truthValue": 0.5,
    });
    let (status, _) = send(&router, post_json("/rumors", &bad_id)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_unknown_rumor_is_404() {
    let router = make_router();
    let (status, json) = send(&router, get(&format!("/rumors/{}", EntityId::new()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], 404);

    let (status, _) = send(&router, get("/rumors/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_spread_and_entity_listing() {
    let router = make_router();
    let teller = EntityId::new();
    let listener = EntityId::new();
    let id = create(&router, teller, "The mayor sold the well", "moderate").await;

    let (status, json) = send(
        &router,
        post_json(
            "/rumors/spread",
            &json!({
                "rumorId": id,
                "fromEntityId": teller,
                "toEntityId": listener,
                "mutationChance": 0.0,
                "relationshipFactor": 0.8,
                "believabilityModifier": 0.0,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["mutated"], false);
    assert_eq!(json["mutationSource"], "none");

    let (status, json) = send(&router, get(&format!("/rumors/entity/{listener}"))).await;
    assert_eq!(status, StatusCode::OK);
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["rumorId"], id.as_str());
    assert_eq!(rows[0]["content"], "The mayor sold the well");
    assert!((rows[0]["believability"].as_f64().unwrap() - 0.8).abs() < 1e-12);

    let (status, json) = send(
        &router,
        get(&format!("/rumors/entity/{listener}?min_believability=0.9")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.as_array().unwrap().is_empty());

    let (status, json) = send(&router, get(&format!("/rumors/{id}/history"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);
    assert_eq!(json["history"][0]["mutation"], "none");
}

#[tokio::test]
async fn test_spread_errors() {
    let router = make_router();
    let teller = EntityId::new();
    let id = create(&router, teller, "Wolves in the east wood", "minor").await;

    // Self-spread.
    let (status, _) = send(
        &router,
        post_json(
            "/rumors/spread",
            &json!({
                "rumorId": id,
                "fromEntityId": teller,
                "toEntityId": teller,
                "relationshipFactor": 0.5,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Teller who never heard it.
    let (status, _) = send(
        &router,
        post_json(
            "/rumors/spread",
            &json!({
                "rumorId": id,
                "fromEntityId": EntityId::new(),
                "toEntityId": EntityId::new(),
                "relationshipFactor": 0.5,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_filters_by_category() {
    let router = make_router();
    let originator = EntityId::new();
    create(&router, originator, "The mayor sold the well", "major").await;
    let (status, _) = send(
        &router,
        post_json(
            "/rumors",
            &json!({
                "originatorId": originator,
                "content": "A dragon over the hills",
                "categories": ["religious"],
                "severity": "minor",
                "truthValue": 0.1,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = send(&router, get("/rumors")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);

    let (_, json) = send(&router, get("/rumors?category=religious")).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["rumors"][0]["root_content"], "A dragon over the hills");

    let (_, json) = send(&router, get("/rumors?category=political,religious")).await;
    assert_eq!(json["count"], 2);

    let (status, _) = send(&router, get("/rumors?category=astrology")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_decay_endpoint() {
    let router = make_router();
    create(&router, EntityId::new(), "Fresh news", "minor").await;

    let (status, json) = send(
        &router,
        post_json("/rumors/decay", &json!({ "daysSinceActive": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["decayedCount"], 0);
}

#[tokio::test]
async fn test_believability_statistics_impact_and_delete() {
    let router = make_router();
    let originator = EntityId::new();
    let id = create(&router, originator, "The mayor sold the well", "critical").await;

    let (status, json) = send(
        &router,
        post_json(
            &format!("/rumors/{id}/believability"),
            &json!({ "entityId": originator, "delta": -0.25 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!((json["believability"].as_f64().unwrap() - 0.75).abs() < 1e-12);

    let (status, json) = send(&router, get("/rumors/statistics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_rumors"], 1);
    assert_eq!(json["by_severity"]["critical"], 1);

    let (status, json) = send(&router, get(&format!("/rumors/{id}/impact"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["severity"], "critical");
    assert_eq!(json["spread_count"], 1);

    let delete = Request::delete(format!("/rumors/{id}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&router, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&router, get(&format!("/rumors/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_knowledge_endpoint() {
    let observer = EntityId::new();
    let positions = Arc::new(InMemoryPositions::new());
    positions.set(observer, Position::new(0.0, 0.0));
    let events = Arc::new(InMemoryWorldEvents::new());
    let event = WorldEvent {
        id: WorldEventId::new(),
        location: Position::new(3.0, 4.0),
        involved_entities: vec![EntityId::new()],
        kind: WorldEventKind::Trade {
            goods: String::from("salt"),
        },
        description: String::from("Salt traded for iron"),
    };
    events.insert(event.clone());
    let engine = KnowledgeAccuracyEngine::with_rng(
        positions,
        &KnowledgeConfig::default(),
        SmallRng::seed_from_u64(3),
    )
    .with_event_source(events);
    let state = AppState::new(make_service()).with_knowledge(Arc::new(engine));
    let router = build_router(Arc::new(state));

    let (status, json) = send(&router, get(&format!("/knowledge/{observer}/{}", event.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["distance"], 5.0);
    assert_eq!(json["per_detail_knowledge"].as_object().unwrap().len(), 3);

    let (status, _) = send(&router, get(&format!("/knowledge/{observer}/{}", WorldEventId::new()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Without an attached engine the route reports 404.
    let (status, _) = send(&make_router(), get(&format!("/knowledge/{observer}/{}", event.id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn make_world_router() -> Router {
    let world = WorldFeed {
        positions: Arc::new(InMemoryPositions::new()),
        events: Arc::new(InMemoryWorldEvents::new()),
    };
    let engine = KnowledgeAccuracyEngine::with_rng(
        Arc::<InMemoryPositions>::clone(&world.positions),
        &KnowledgeConfig::default(),
        SmallRng::seed_from_u64(5),
    )
    .with_event_source(Arc::<InMemoryWorldEvents>::clone(&world.events));
    let state = AppState::new(make_service())
        .with_knowledge(Arc::new(engine))
        .with_world_feed(world);
    build_router(Arc::new(state))
}

#[tokio::test]
async fn test_world_feed_drives_knowledge() {
    let router = make_world_router();
    let observer = EntityId::new();
    let witness = EntityId::new();

    let (status, json) = send(
        &router,
        put_json(&format!("/knowledge/positions/{observer}"), &json!({"x": 0.0, "y": 0.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["invalidated"], 0);

    let (status, json) = send(
        &router,
        post_json(
            "/knowledge/events",
            &json!({
                "location": {"x": 6.0, "y": 8.0},
                "involvedEntities": [witness],
                "kind": "death",
                "cause": "fever",
                "description": "The smith died in the night",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let event_id = json["worldEventId"].as_str().unwrap().to_owned();

    let uri = format!("/knowledge/{observer}/{event_id}");
    let (status, first) = send(&router, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["distance"], 10.0);
    assert_eq!(first["per_detail_knowledge"].as_object().unwrap().len(), 3);

    // A cached answer is repeated until the observer moves.
    let (_, again) = send(&router, get(&uri)).await;
    assert_eq!(first, again);

    let (status, json) = send(
        &router,
        put_json(&format!("/knowledge/positions/{observer}"), &json!({"x": 6.0, "y": 8.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["invalidated"], 1);
    let (_, moved) = send(&router, get(&uri)).await;
    assert_eq!(moved["distance"], 0.0);

    let (status, _) = send(
        &router,
        Request::delete(format!("/knowledge/positions/{observer}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&router, get(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_world_feed_rejects_bad_input() {
    let router = make_world_router();

    let (status, _) = send(
        &router,
        put_json("/knowledge/positions/not-a-uuid", &json!({"x": 0.0, "y": 0.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &router,
        post_json(
            "/knowledge/events",
            &json!({
                "location": {"x": 0.0, "y": 0.0},
                "involvedEntities": ["nobody"],
                "kind": "other",
                "label": "omen",
                "description": "A two-headed calf",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Without a feed the write routes are absent.
    let (status, _) = send(
        &make_router(),
        put_json(&format!("/knowledge/positions/{}", EntityId::new()), &json!({"x": 1.0, "y": 1.0})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_rumor() {
    let router = make_router();
    let id = create(&router, EntityId::new(), "The granary is empty", "minor").await;

    let (status, json) = send(
        &router,
        put_json(
            &format!("/rumors/{id}"),
            &json!({"categories": ["economic"], "severity": "critical"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["severity"], "critical");
    assert_eq!(json["categories"], json!(["economic"]));
    assert_eq!(json["truth_value"], 0.3);

    let (_, json) = send(&router, get(&format!("/rumors/{id}"))).await;
    assert_eq!(json["variants"][0]["content"], "The granary is empty");

    let (status, _) = send(
        &router,
        put_json(&format!("/rumors/{id}"), &json!({"severity": "apocalyptic"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&router, put_json(&format!("/rumors/{id}"), &json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(
        &router,
        put_json(&format!("/rumors/{}", RumorId::new()), &json!({"severity": "major"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
