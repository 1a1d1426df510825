mod docs;
pub mod health;
pub mod home;
pub mod images;

use aide::axum::{routing::get, ApiRouter};
use axum::middleware;

use crate::middleware::auth_middleware;

/// Creates the router with all handler routes
pub fn handler() -> ApiRouter {
    let public_routes = ApiRouter::new()
        .merge(docs::handler())
        .api_route("/health", get(health::handler));

    // Everything touching the bucket is scoped to the caller's prefix
    let scoped_routes = ApiRouter::new()
        .route("/", axum::routing::get(home::handler))
        .api_route("/get-images", get(images::list_images))
        .api_route("/delete-image", get(images::delete_image))
        .layer(middleware::from_fn(auth_middleware));

    public_routes.merge(scoped_routes)
}
