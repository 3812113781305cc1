//! REST endpoint handlers for the rumor API.
//!
//! Every handler is a thin translation between JSON and a
//! [`RumorService`](hearsay_core::RumorService) call. Request bodies use
//! `camelCase` keys; enum values (categories, severity, lifecycle state) are
//! `snake_case` strings and are parsed here so a bad value is a 400.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness and rumor count |
//! | `POST` | `/rumors` | Create a rumor |
//! | `GET` | `/rumors` | Query rumors (`?category=`, `?q=`, ...) |
//! | `GET` | `/rumors/statistics` | Aggregate counters |
//! | `POST` | `/rumors/spread` | Pass a rumor on |
//! | `POST` | `/rumors/decay` | Run a decay sweep now |
//! | `GET` | `/rumors/entity/{entityId}` | Rumors an entity knows |
//! | `GET` | `/rumors/{id}` | Rumor detail with variants and spreads |
//! | `PUT` | `/rumors/{id}` | Edit categories or severity |
//! | `DELETE` | `/rumors/{id}` | Hard-delete a rumor |
//! | `GET` | `/rumors/{id}/history` | Spread audit log |
//! | `GET` | `/rumors/{id}/impact` | Impact score |
//! | `POST` | `/rumors/{id}/believability` | Reinforce or contradict a belief |
//! | `GET` | `/knowledge/{entityId}/{worldEventId}` | What an entity knows of an event |
//! | `PUT` | `/knowledge/positions/{entityId}` | Place or move an entity |
//! | `DELETE` | `/knowledge/positions/{entityId}` | Forget an entity's position |
//! | `POST` | `/knowledge/events` | Record a world event |

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use hearsay_core::{EntityRumorFilter, NewRumor, RumorQuery, RumorUpdate};
use hearsay_rumor::{ContentMutationService, SpreadRequest};
use hearsay_types::{
    EntityId, LifecycleState, MutationSource, Position, RumorCategory, RumorId, Severity,
    VariantId, WorldEvent, WorldEventId, WorldEventKind,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::{AppState, WorldFeed};

// ---------------------------------------------------------------------------
// Request and response bodies
// ---------------------------------------------------------------------------

/// Body of `POST /rumors`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRumorRequest {
    /// Who starts the rumor.
    pub originator_id: String,
    /// Root content.
    pub content: String,
    /// Category names, e.g. `["political", "gossip"]`.
    pub categories: Vec<String>,
    /// Severity name: `minor`, `moderate`, `major` or `critical`.
    pub severity: String,
    /// Ground truth in `[0, 1]`.
    pub truth_value: f64,
}

/// Reply to `POST /rumors`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRumorResponse {
    /// The new rumor's ID.
    pub rumor_id: RumorId,
}

/// Body of `POST /rumors/spread`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadRumorRequest {
    /// The rumor to pass on.
    pub rumor_id: String,
    /// The teller.
    pub from_entity_id: String,
    /// The listener.
    pub to_entity_id: String,
    /// Base mutation chance; the configured default when omitted.
    pub mutation_chance: Option<f64>,
    /// Closeness of teller and listener in `[0, 1]`.
    pub relationship_factor: f64,
    /// Added to the listener's believability (default 0).
    #[serde(default)]
    pub believability_modifier: f64,
}

/// Reply to `POST /rumors/spread`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadRumorResponse {
    /// Always `true`; failures are reported as error responses.
    pub success: bool,
    /// The variant the listener now holds.
    pub variant_id: VariantId,
    /// The listener's believability.
    pub believability: f64,
    /// Whether the spread created a new variant.
    pub mutated: bool,
    /// Where the new variant's content came from.
    pub mutation_source: MutationSource,
}

/// Body of `POST /rumors/decay`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecayRequest {
    /// Idle days before a rumor decays one step.
    pub days_since_active: u32,
}

/// Reply to `POST /rumors/decay`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecayResponse {
    /// How many rumors changed.
    pub decayed_count: usize,
}

/// Body of `POST /rumors/{id}/believability`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BelievabilityRequest {
    /// Whose belief to adjust.
    pub entity_id: String,
    /// Positive to reinforce, negative to contradict.
    pub delta: f64,
}

/// Reply to `POST /rumors/{id}/believability`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BelievabilityResponse {
    /// The rumor.
    pub rumor_id: RumorId,
    /// The entity.
    pub entity_id: EntityId,
    /// The clamped believability after the adjustment.
    pub believability: f64,
}

/// One row of `GET /rumors/entity/{entityId}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRumorResponse {
    /// The rumor.
    pub rumor_id: RumorId,
    /// The variant the entity holds.
    pub variant_id: VariantId,
    /// That variant's content.
    pub content: String,
    /// How strongly the entity believes it.
    pub believability: f64,
    /// The rumor's current severity.
    pub severity: Severity,
    /// The rumor's lifecycle state.
    pub lifecycle_state: LifecycleState,
}

/// Body of `PUT /rumors/{id}`. Omitted fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateRumorRequest {
    /// Replacement category names.
    pub categories: Option<Vec<String>>,
    /// Replacement severity name.
    pub severity: Option<String>,
}

/// Body of `PUT /knowledge/positions/{entityId}`.
#[derive(Debug, Deserialize)]
pub struct SetPositionRequest {
    /// East-west coordinate.
    pub x: f64,
    /// North-south coordinate.
    pub y: f64,
}

/// Response of `PUT /knowledge/positions/{entityId}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPositionResponse {
    /// The entity.
    pub entity_id: EntityId,
    /// Cached knowledge results dropped by the move.
    pub invalidated: usize,
}

/// Body of `POST /knowledge/events`.
///
/// The event kind is inlined: `{"kind": "trade", "goods": "salt", ...}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordWorldEventRequest {
    /// Existing event ID to replace; a new one is assigned when absent.
    pub id: Option<String>,
    /// Where it happened.
    pub location: Position,
    /// Entity IDs involved.
    #[serde(default)]
    pub involved_entities: Vec<String>,
    /// What happened.
    #[serde(flatten)]
    pub kind: WorldEventKind,
    /// Free-text description.
    pub description: String,
}

/// Response of `POST /knowledge/events`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordWorldEventResponse {
    /// The recorded event.
    pub world_event_id: WorldEventId,
    /// Cached knowledge results dropped because the event was replaced.
    pub invalidated: usize,
}

/// Query parameters for `GET /rumors`.
#[derive(Debug, Default, Deserialize)]
pub struct ListRumorsQuery {
    /// Comma-separated categories; matches any.
    pub category: Option<String>,
    /// Case-insensitive text search in the root content.
    pub q: Option<String>,
    /// Minimum severity name.
    pub min_severity: Option<String>,
    /// Minimum truth value.
    pub min_truth_value: Option<f64>,
    /// Exact lifecycle state name.
    pub state: Option<String>,
    /// Only rumors this entity knows.
    pub known_by: Option<String>,
    /// Maximum results (default 50).
    pub limit: Option<usize>,
}

/// Query parameters for `GET /rumors/entity/{entityId}`.
#[derive(Debug, Default, Deserialize)]
pub struct EntityRumorsQuery {
    /// Minimum believability.
    pub min_believability: Option<f64>,
    /// Comma-separated categories; matches any.
    pub category: Option<String>,
    /// Maximum results (default 50 once any filter is given).
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Liveness probe.
pub async fn health<M: ContentMutationService>(
    State(state): State<Arc<AppState<M>>>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "rumors": state.service.store().len().await,
        "knowledge": state.knowledge.is_some(),
    }))
}

// ---------------------------------------------------------------------------
// Rumor writes
// ---------------------------------------------------------------------------

/// `POST /rumors` -- create a rumor.
pub async fn create_rumor<M: ContentMutationService>(
    State(state): State<Arc<AppState<M>>>,
    Json(body): Json<CreateRumorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new = NewRumor {
        originator_id: parse_id(&body.originator_id)?,
        content: body.content,
        categories: parse_categories(body.categories.iter().map(String::as_str))?,
        severity: parse_enum(&body.severity)?,
        truth_value: body.truth_value,
    };
    let rumor_id = state.service.create_rumor(new).await?;
    Ok((StatusCode::CREATED, Json(CreateRumorResponse { rumor_id })))
}

/// `POST /rumors/spread` -- pass a rumor from one entity to another.
pub async fn spread_rumor<M: ContentMutationService>(
    State(state): State<Arc<AppState<M>>>,
    Json(body): Json<SpreadRumorRequest>,
) -> Result<Json<SpreadRumorResponse>, ApiError> {
    let request = SpreadRequest {
        rumor_id: parse_id(&body.rumor_id)?,
        from_entity_id: parse_id(&body.from_entity_id)?,
        to_entity_id: parse_id(&body.to_entity_id)?,
        mutation_chance: body
            .mutation_chance
            .unwrap_or_else(|| state.service.default_mutation_chance()),
        relationship_factor: body.relationship_factor,
        believability_modifier: body.believability_modifier,
    };
    let outcome = state.service.spread_rumor(&request).await?;
    Ok(Json(SpreadRumorResponse {
        success: true,
        variant_id: outcome.entry.variant_id,
        believability: outcome.entry.believability,
        mutated: outcome.new_variant.is_some(),
        mutation_source: outcome.entry.mutation,
    }))
}

/// `POST /rumors/decay` -- run a decay sweep now.
pub async fn decay_rumors<M: ContentMutationService>(
    State(state): State<Arc<AppState<M>>>,
    Json(body): Json<DecayRequest>,
) -> Json<DecayResponse> {
    let decayed_count = state.service.decay_rumors(body.days_since_active).await;
    Json(DecayResponse { decayed_count })
}

/// `DELETE /rumors/{id}`.
pub async fn delete_rumor<M: ContentMutationService>(
    State(state): State<Arc<AppState<M>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_rumor(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /rumors/{id}` -- edit a rumor's categories or severity.
pub async fn update_rumor<M: ContentMutationService>(
    State(state): State<Arc<AppState<M>>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateRumorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rumor_id = parse_id(&id)?;
    let update = RumorUpdate {
        categories: body
            .categories
            .as_ref()
            .map(|names| parse_categories(names.iter().map(String::as_str)))
            .transpose()?,
        severity: body.severity.as_deref().map(parse_enum).transpose()?,
    };
    Ok(Json(state.service.update_rumor(rumor_id, update).await?))
}

/// `POST /rumors/{id}/believability`.
pub async fn adjust_believability<M: ContentMutationService>(
    State(state): State<Arc<AppState<M>>>,
    Path(id): Path<String>,
    Json(body): Json<BelievabilityRequest>,
) -> Result<Json<BelievabilityResponse>, ApiError> {
    let rumor_id = parse_id(&id)?;
    let entity_id = parse_id(&body.entity_id)?;
    let believability = state
        .service
        .adjust_believability(rumor_id, entity_id, body.delta)
        .await?;
    Ok(Json(BelievabilityResponse {
        rumor_id,
        entity_id,
        believability,
    }))
}

// ---------------------------------------------------------------------------
// Rumor reads
// ---------------------------------------------------------------------------

/// `GET /rumors` -- query rumors, newest first.
pub async fn list_rumors<M: ContentMutationService>(
    State(state): State<Arc<AppState<M>>>,
    Query(params): Query<ListRumorsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let query = RumorQuery {
        text: params.q,
        categories: parse_category_list(params.category.as_deref())?,
        min_severity: params.min_severity.as_deref().map(parse_enum).transpose()?,
        min_truth_value: params.min_truth_value,
        lifecycle_state: params.state.as_deref().map(parse_enum).transpose()?,
        known_by: params.known_by.as_deref().map(parse_id).transpose()?,
        limit: params.limit,
    };
    let rumors = state.service.query_rumors(&query).await;
    Ok(Json(serde_json::json!({
        "count": rumors.len(),
        "rumors": rumors,
    })))
}

/// `GET /rumors/statistics`.
pub async fn statistics<M: ContentMutationService>(
    State(state): State<Arc<AppState<M>>>,
) -> impl IntoResponse {
    Json(state.service.statistics().await)
}

/// `GET /rumors/{id}` -- rumor with its variant tree and spreads.
pub async fn get_rumor<M: ContentMutationService>(
    State(state): State<Arc<AppState<M>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.service.get_rumor(parse_id(&id)?).await?;
    let spreads: Vec<_> = record.spreads.values().collect();
    Ok(Json(serde_json::json!({
        "rumor": record.rumor,
        "variants": record.variants,
        "spreads": spreads,
    })))
}

/// `GET /rumors/{id}/history`.
pub async fn spread_history<M: ContentMutationService>(
    State(state): State<Arc<AppState<M>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let history = state.service.spread_history(parse_id(&id)?).await?;
    Ok(Json(serde_json::json!({
        "count": history.len(),
        "history": history,
    })))
}

/// `GET /rumors/{id}/impact`.
pub async fn impact<M: ContentMutationService>(
    State(state): State<Arc<AppState<M>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.impact(parse_id(&id)?).await?))
}

/// `GET /rumors/entity/{entityId}` -- what an entity has heard, strongest
/// belief first.
pub async fn rumors_by_entity<M: ContentMutationService>(
    State(state): State<Arc<AppState<M>>>,
    Path(entity): Path<String>,
    Query(params): Query<EntityRumorsQuery>,
) -> Result<Json<Vec<EntityRumorResponse>>, ApiError> {
    let entity_id: EntityId = parse_id(&entity)?;
    let categories = parse_category_list(params.category.as_deref())?;
    let unfiltered =
        params.min_believability.is_none() && categories.is_empty() && params.limit.is_none();
    let views = if unfiltered {
        state.service.get_rumors_by_entity(entity_id).await
    } else {
        let filter = EntityRumorFilter {
            min_believability: params.min_believability,
            categories,
            limit: params.limit,
        };
        state
            .service
            .get_rumors_by_entity_filtered(entity_id, &filter)
            .await
    };
    Ok(Json(
        views
            .into_iter()
            .map(|v| EntityRumorResponse {
                rumor_id: v.rumor_id,
                variant_id: v.variant_id,
                content: v.content,
                believability: v.believability,
                severity: v.severity,
                lifecycle_state: v.lifecycle_state,
            })
            .collect(),
    ))
}

// ---------------------------------------------------------------------------
// GET /knowledge/{entityId}/{worldEventId}
// ---------------------------------------------------------------------------

/// What an entity knows about a world event.
pub async fn knowledge<M: ContentMutationService>(
    State(state): State<Arc<AppState<M>>>,
    Path((entity, event)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = state
        .knowledge
        .as_ref()
        .ok_or_else(|| ApiError::NotFound(String::from("no knowledge engine is attached")))?;
    let entity_id: EntityId = parse_id(&entity)?;
    let event_id: WorldEventId = parse_id(&event)?;
    Ok(Json(engine.get_knowledge_for(entity_id, event_id).await?))
}

// ---------------------------------------------------------------------------
// PUT/DELETE /knowledge/positions/{entityId}
// ---------------------------------------------------------------------------

/// Place or move an entity, dropping its cached knowledge.
pub async fn set_position<M: ContentMutationService>(
    State(state): State<Arc<AppState<M>>>,
    Path(entity): Path<String>,
    Json(body): Json<SetPositionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let world = world_feed(state.world.as_ref())?;
    let entity_id: EntityId = parse_id(&entity)?;
    let position = finite_position(body.x, body.y)?;
    world.positions.set(entity_id, position);
    let invalidated = match &state.knowledge {
        Some(engine) => engine.invalidate_entity(entity_id).await,
        None => 0,
    };
    Ok(Json(SetPositionResponse {
        entity_id,
        invalidated,
    }))
}

/// Forget an entity's position.
pub async fn remove_position<M: ContentMutationService>(
    State(state): State<Arc<AppState<M>>>,
    Path(entity): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let world = world_feed(state.world.as_ref())?;
    let entity_id: EntityId = parse_id(&entity)?;
    world.positions.remove(entity_id);
    if let Some(engine) = &state.knowledge {
        engine.invalidate_entity(entity_id).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// POST /knowledge/events
// ---------------------------------------------------------------------------

/// Record (or replace) a world event.
pub async fn record_world_event<M: ContentMutationService>(
    State(state): State<Arc<AppState<M>>>,
    Json(body): Json<RecordWorldEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let world = world_feed(state.world.as_ref())?;
    let id = match body.id.as_deref() {
        Some(id) => parse_id(id)?,
        None => WorldEventId::new(),
    };
    let location = finite_position(body.location.x, body.location.y)?;
    let involved_entities = body
        .involved_entities
        .iter()
        .map(|e| parse_id(e.as_str()))
        .collect::<Result<Vec<EntityId>, _>>()?;
    world.events.insert(WorldEvent {
        id,
        location,
        involved_entities,
        kind: body.kind,
        description: body.description,
    });
    let invalidated = match &state.knowledge {
        Some(engine) => engine.invalidate_event(id).await,
        None => 0,
    };
    Ok((
        StatusCode::CREATED,
        Json(RecordWorldEventResponse {
            world_event_id: id,
            invalidated,
        }),
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn world_feed(world: Option<&WorldFeed>) -> Result<&WorldFeed, ApiError> {
    world.ok_or_else(|| ApiError::NotFound(String::from("no world feed is attached")))
}

fn finite_position(x: f64, y: f64) -> Result<Position, ApiError> {
    if x.is_finite() && y.is_finite() {
        Ok(Position::new(x, y))
    } else {
        Err(ApiError::BadRequest(String::from(
            "position coordinates must be finite",
        )))
    }
}

/// Parse a typed UUID identifier.
fn parse_id<T>(s: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    s.trim()
        .parse::<T>()
        .map_err(|e| ApiError::InvalidUuid(format!("{s}: {e}")))
}

/// Parse a `snake_case` enum name.
fn parse_enum<T>(s: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    s.parse::<T>().map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn parse_categories<'a>(
    names: impl Iterator<Item = &'a str>,
) -> Result<BTreeSet<RumorCategory>, ApiError> {
    names
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(parse_enum)
        .collect()
}

fn parse_category_list(list: Option<&str>) -> Result<BTreeSet<RumorCategory>, ApiError> {
    list.map_or_else(
        || Ok(BTreeSet::new()),
        |list| parse_categories(list.split(',')),
    )
}
