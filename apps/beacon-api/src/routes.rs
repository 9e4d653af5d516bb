use axum::{
	Json, Router,
	extract::{FromRequestParts, Path, State},
	http::{StatusCode, request::Parts},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;
use uuid::Uuid;

use beacon_service::{
	CallerContext, HeartbeatRequest, HeartbeatResponse, NearbyRequest, NearbyResponse, Role,
	SearchRequest, SearchResponse,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/presence/heartbeat", post(heartbeat))
		.route("/v1/presence/{provider_id}", get(presence_probe))
		.route("/v1/match/search", post(search))
		.route("/v1/match/nearby", post(nearby))
		.with_state(state)
}

async fn health() -> Json<serde_json::Value> {
	Json(serde_json::json!({ "status": "ok" }))
}

async fn heartbeat(
	State(state): State<AppState>,
	Caller(caller): Caller,
	Json(payload): Json<HeartbeatRequest>,
) -> Result<Json<HeartbeatResponse>, ApiError> {
	let response = state.service.heartbeat(&caller, payload).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct PresenceProbeResponse {
	provider_id: Uuid,
	online: bool,
}

async fn presence_probe(
	State(state): State<AppState>,
	_caller: Caller,
	Path(provider_id): Path<Uuid>,
) -> Result<Json<PresenceProbeResponse>, ApiError> {
	let online = state.service.is_online(provider_id).await?;

	Ok(Json(PresenceProbeResponse { provider_id, online }))
}

async fn search(
	State(state): State<AppState>,
	Caller(caller): Caller,
	Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let response = state.service.search(&caller, payload).await?;

	Ok(Json(response))
}

async fn nearby(
	State(state): State<AppState>,
	Caller(caller): Caller,
	Json(payload): Json<NearbyRequest>,
) -> Result<Json<NearbyResponse>, ApiError> {
	let response = state.service.nearby(&caller, payload).await?;

	Ok(Json(response))
}

/// Caller identity lifted from the `X-Caller-Id` and `X-Caller-Role` headers.
/// Authentication happens at the gateway; a request arriving without a usable
/// pair is rejected as unauthenticated before any handler runs.
pub struct Caller(pub CallerContext);

impl<S> FromRequestParts<S> for Caller
where
	S: Send + Sync,
{
	type Rejection = ApiError;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		let raw_id = required_header(parts, "X-Caller-Id")?;
		let caller_id = Uuid::parse_str(&raw_id)
			.map_err(|_| unauthenticated("X-Caller-Id must be a UUID."))?;
		let raw_role = required_header(parts, "X-Caller-Role")?;
		let role = raw_role
			.parse::<Role>()
			.map_err(|_| unauthenticated("X-Caller-Role must be \"requester\" or \"provider\"."))?;

		Ok(Self(CallerContext { caller_id, role }))
	}
}

fn required_header(parts: &Parts, name: &str) -> Result<String, ApiError> {
	parts
		.headers
		.get(name)
		.and_then(|value| value.to_str().ok())
		.map(str::to_string)
		.ok_or_else(|| unauthenticated(format!("Missing {name} header.")))
}

fn unauthenticated(message: impl Into<String>) -> ApiError {
	json_error(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", message, None)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}

impl From<beacon_service::Error> for ApiError {
	fn from(err: beacon_service::Error) -> Self {
		use beacon_service::Error;

		let (status, code, message) = match err {
			Error::InvalidArgument { message } =>
				(StatusCode::UNPROCESSABLE_ENTITY, "INVALID_ARGUMENT", message),
			Error::Forbidden { message } => (StatusCode::FORBIDDEN, "FORBIDDEN", message),
			Error::NotFound { message } => (StatusCode::NOT_FOUND, "NOT_FOUND", message),
			Error::StoreUnavailable { message } =>
				(StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE", message),
			Error::IndexUnavailable { message } =>
				(StatusCode::SERVICE_UNAVAILABLE, "INDEX_UNAVAILABLE", message),
			Error::EmbeddingFailure { message } =>
				(StatusCode::SERVICE_UNAVAILABLE, "EMBEDDING_FAILURE", message),
			Error::DeadlineExceeded { message } =>
				(StatusCode::SERVICE_UNAVAILABLE, "DEADLINE_EXCEEDED", message),
		};

		json_error(status, code, message, None)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody {
			error_code: self.error_code,
			message: self.message,
			fields: self.fields,
		};

		(self.status, Json(body)).into_response()
	}
}
