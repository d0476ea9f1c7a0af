pub mod api;
pub mod app_state;
pub mod config;
pub mod error;
pub mod image_fetch;
pub mod model_client;
pub mod types;

use rocket::{catchers, routes, Build, Rocket};

pub use app_state::AppState;

/// Mounts the HTTP surface over the given state.
pub fn build_rocket(state: AppState) -> Rocket<Build> {
    rocket::build()
        .manage(state)
        .mount(
            "/",
            routes![api::health, api::generate_text, api::image_to_text],
        )
        .register(
            "/",
            catchers![api::malformed_body, api::unexpected_shape, api::uncaught],
        )
}
