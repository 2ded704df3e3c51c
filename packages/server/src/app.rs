use crate::models::config::GameConfig;
use crate::routes;
use crate::state::AppState;
use axum::Router;

pub fn create_app() -> Router {
    create_app_with_config(GameConfig::default())
}

pub fn create_app_with_config(config: GameConfig) -> Router {
    let state = AppState::with_config(config);
    routes::create_routes(state)
}
