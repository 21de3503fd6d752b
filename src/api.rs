use std::{str::FromStr, sync::Arc};

use alloy::primitives::Address;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::client::{Client, ClientError};
use crate::health::{HealthMonitor, HealthReport};
use crate::metrics::Metrics;
use crate::models::Balance;

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<Client>,
    pub health: Arc<HealthMonitor>,
    pub metrics: Arc<Metrics>,
}

/// Query string shared by `/getBalance` and `/getTotalSupply`
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    #[serde(rename = "accountAddress")]
    pub account_address: Option<String>,
    pub network: Option<String>,
    #[serde(rename = "contractAddress")]
    pub contract_address: Option<String>,
    pub height: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Client(err @ ClientError::UnknownNetwork(_)) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            ApiError::Client(err) => {
                // cause stays in the logs
                error!(error = %err, transient = err.is_transient(), "Error processing account request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error processing account request".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { "ERC20 worker running" }))
        .route("/getBalance", get(get_balance))
        .route("/getTotalSupply", get(get_total_supply))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn serve(addr: &str, state: AppState) -> eyre::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("API listening on http://{}", addr);

    axum::serve(listener, router(state).into_make_service()).await?;
    Ok(())
}

async fn get_balance(
    State(state): State<AppState>,
    Query(q): Query<TokenQuery>,
) -> Result<Json<Vec<Balance>>, ApiError> {
    let _timer = state.metrics.start_timer("getBalance");
    let height = parse_height(q.height.as_deref())?;

    let account = non_empty(q.account_address.as_deref())
        .ok_or_else(|| ApiError::BadRequest("AccountAddress must be set".into()))?;
    let account = parse_address(account, "accountAddress")?;

    let (network, contract) = contract_target(&q)?;

    let balances = state
        .client
        .erc20_account_balance(network, contract, account, height)
        .await?;
    Ok(Json(balances))
}

async fn get_total_supply(
    State(state): State<AppState>,
    Query(q): Query<TokenQuery>,
) -> Result<Json<Vec<Balance>>, ApiError> {
    let _timer = state.metrics.start_timer("getTotalSupply");
    let height = parse_height(q.height.as_deref())?;
    let (network, contract) = contract_target(&q)?;

    let supply = state
        .client
        .erc20_total_supply(network, contract, height)
        .await?;
    Ok(Json(supply))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.health.report();
    let status = if report.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!("metrics encoding failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ---------- query helpers ----------

fn non_empty(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_height(height: Option<&str>) -> Result<u64, ApiError> {
    match non_empty(height) {
        None => Ok(0),
        Some(h) => h
            .parse()
            .map_err(|e| ApiError::BadRequest(format!("Invalid height param: {e}"))),
    }
}

fn parse_address(value: &str, param: &str) -> Result<Address, ApiError> {
    Address::from_str(value)
        .map_err(|e| ApiError::BadRequest(format!("Invalid {param} param: {e}")))
}

fn contract_target(q: &TokenQuery) -> Result<(Option<&str>, Option<Address>), ApiError> {
    let network = non_empty(q.network.as_deref());
    let contract = non_empty(q.contract_address.as_deref())
        .map(|a| parse_address(a, "contractAddress"))
        .transpose()?;

    if network.is_none() && contract.is_none() {
        return Err(ApiError::BadRequest(
            "Either network or contractAddress must be set".into(),
        ));
    }
    Ok((network, contract))
}
