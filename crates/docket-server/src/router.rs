use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all Docket endpoints.
///
/// `/_health` shadows a collection of the same name.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/_health", get(handler::health_handler))
        .route(
            "/:coll",
            get(handler::get_collection)
                .post(handler::add_entry)
                .put(handler::replace_collection)
                .patch(handler::merge_collection)
                .delete(handler::clear_collection),
        )
        .route(
            "/:coll/:key",
            get(handler::get_entry)
                .put(handler::put_entry)
                .delete(handler::delete_entry),
        )
        .route("/:coll/search/:query", get(handler::search_collection))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
