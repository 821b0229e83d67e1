use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::routes::{self, change_points, events, health, impact, metadata, prices, statistics};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    let api = Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/prices", prices::router())
        .nest("/events", events::router())
        .nest("/statistics", statistics::router())
        .merge(impact::router())
        .merge(metadata::router())
        .merge(change_points::router());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api)
        .fallback(routes::not_found)
        .layer(cors)
        .with_state(state)
}
