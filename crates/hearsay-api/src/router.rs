//! Axum router construction for the rumor API.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use hearsay_rumor::ContentMutationService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// Static segments (`/rumors/statistics`, `/rumors/spread`,
/// `/rumors/decay`, `/rumors/entity/...`) take precedence over
/// `/rumors/{id}`. CORS allows any origin.
pub fn build_router<M>(state: Arc<AppState<M>>) -> Router
where
    M: ContentMutationService + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health::<M>))
        // WebSocket
        .route("/ws/rumors", get(ws::ws_rumors::<M>))
        // Rumors
        .route(
            "/rumors",
            post(handlers::create_rumor::<M>).get(handlers::list_rumors::<M>),
        )
        .route("/rumors/statistics", get(handlers::statistics::<M>))
        .route("/rumors/spread", post(handlers::spread_rumor::<M>))
        .route("/rumors/decay", post(handlers::decay_rumors::<M>))
        .route(
            "/rumors/entity/{entity_id}",
            get(handlers::rumors_by_entity::<M>),
        )
        .route(
            "/rumors/{id}",
            get(handlers::get_rumor::<M>)
                .put(handlers::update_rumor::<M>)
                .delete(handlers::delete_rumor::<M>),
        )
        .route("/rumors/{id}/history", get(handlers::spread_history::<M>))
        .route("/rumors/{id}/impact", get(handlers::impact::<M>))
        .route(
            "/rumors/{id}/believability",
            post(handlers::adjust_believability::<M>),
        )
        // Spatial knowledge
        .route(
            "/knowledge/positions/{entity_id}",
            put(handlers::set_position::<M>).delete(handlers::remove_position::<M>),
        )
        .route("/knowledge/events", post(handlers::record_world_event::<M>))
        .route(
            "/knowledge/{entity_id}/{world_event_id}",
            get(handlers::knowledge::<M>),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
