use std::sync::Arc;

use poem::{
    Endpoint, EndpointExt, Route,
    middleware::{AddData, Cors},
};
use poem_openapi::OpenApiService;

use crate::core::renderer::RenderingEngine;
use crate::middleware::rate_limit::RateLimit;
use crate::routes::chart::ApiChart;
use crate::settings::Config;

pub mod core;
pub mod middleware;
pub mod routes;
pub mod schemas;
pub mod settings;

pub struct AppState {
    pub engine: Arc<RenderingEngine>,
    pub rate_limit_per_sec: u32,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            engine: Arc::new(RenderingEngine::new(
                config.max_concurrent_renders,
                config.request_limits(),
            )),
            rate_limit_per_sec: config.rate_limit_per_sec,
        }
    }
}

pub fn init_openapi_route(app_state: Arc<AppState>, config: &Config) -> impl Endpoint + use<> {
    let prefix = config.prefix.clone().unwrap_or("/".to_string());
    let openapi_route =
        OpenApiService::new(ApiChart, "Chart Engine API", "1.0").server(prefix.clone());

    let openapi_json_endpoint = openapi_route.spec_endpoint();
    let ui = openapi_route.swagger_ui();
    Route::new()
        .nest(prefix, openapi_route)
        .nest("/docs", ui)
        .at("/openapi.json", openapi_json_endpoint)
        .with(AddData::new(app_state))
        .with(RateLimit::new(
            config.rate_limit_per_sec,
            config.rate_limit_burst,
        ))
        .with(Cors::new())
}
