use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

use hestia_common::{
    Clock, ControllerError, DisplayUnits, Publisher, Step, ThermostatController, ThermostatMode,
};

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub struct ApiState<C, P> {
    controller: Arc<ThermostatController<C, P>>,
}

impl<C, P> Clone for ApiState<C, P> {
    fn clone(&self) -> Self {
        Self {
            controller: Arc::clone(&self.controller),
        }
    }
}

pub fn router<C, P>(controller: Arc<ThermostatController<C, P>>) -> Router
where
    C: Clock + 'static,
    P: Publisher + 'static,
{
    Router::new()
        .route("/api/status", get(handle_get_status::<C, P>))
        .route("/api/target", post(handle_set_target::<C, P>))
        .route("/api/mode", post(handle_set_mode::<C, P>))
        .route("/api/units", post(handle_set_units::<C, P>))
        .with_state(ApiState { controller })
}

pub async fn serve<C, P>(
    controller: Arc<ThermostatController<C, P>>,
    port: u16,
) -> anyhow::Result<()>
where
    C: Clock + 'static,
    P: Publisher + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind api server at {addr}"))?;

    info!("api listening on http://{addr}");
    axum::serve(listener, router(controller))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

async fn handle_get_status<C: Clock, P: Publisher>(
    State(state): State<ApiState<C, P>>,
) -> Response {
    Json(state.controller.snapshot()).into_response()
}

async fn handle_set_target<C: Clock, P: Publisher>(
    State(state): State<ApiState<C, P>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Ok(target) = value.parse::<f32>() else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid temperature value");
    };

    respond(&state, state.controller.set_target(target))
}

async fn handle_set_mode<C: Clock, P: Publisher>(
    State(state): State<ApiState<C, P>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };

    let result = value
        .parse::<ThermostatMode>()
        .map(|mode| state.controller.set_mode(mode));
    respond(&state, result)
}

async fn handle_set_units<C: Clock, P: Publisher>(
    State(state): State<ApiState<C, P>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };

    let result = value
        .parse::<DisplayUnits>()
        .map(|units| state.controller.set_display_units(units));
    respond(&state, result)
}

fn respond<C: Clock, P: Publisher>(
    state: &ApiState<C, P>,
    result: Result<Step, ControllerError>,
) -> Response {
    match result {
        Ok(step) => {
            if !step.is_clean() {
                warn!(
                    "api update applied with {} failed publishes",
                    step.publish_failures.len()
                );
            }
            Json(state.controller.snapshot()).into_response()
        }
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
