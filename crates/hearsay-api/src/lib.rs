//! HTTP and `WebSocket` binding of the Hearsay rumor service.
//!
//! - **REST endpoints** for creating, spreading, decaying, deleting and
//!   querying rumors, plus spatial knowledge lookups.
//! - **`WebSocket` endpoint** (`/ws/rumors`) streaming every
//!   [`RumorEvent`](hearsay_types::RumorEvent).
//!
//! Handlers are generic over the content mutation service so the router
//! can be driven in tests with the local garbler.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, socket_addr, start_server};
pub use state::{AppState, WorldFeed};
