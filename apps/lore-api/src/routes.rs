use axum::{
	Json, Router,
	extract::State,
	http::{HeaderName, HeaderValue, StatusCode},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{auth, state::AppState};
use lore_service::{Error as ServiceError, Query, QueryMetadata};

#[derive(Debug, Deserialize)]
pub struct NoteQueryRequest {
	pub query: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
	status: &'static str,
	version: &'static str,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/api/v1/notes/health", get(health))
		.route("/api/v1/notes/query", post(query_notes))
		.with_state(state)
}

async fn health() -> Json<HealthResponse> {
	Json(HealthResponse { status: "healthy", version: env!("CARGO_PKG_VERSION") })
}

/// The query endpoint. Authentication runs before body validation, so a
/// missing bearer is a 401 even when the body is malformed.
async fn query_notes(
	State(state): State<AppState>,
	headers: axum::http::HeaderMap,
	body: String,
) -> Result<Response, ApiError> {
	let api_token = auth::bearer_token(&headers)?;
	let payload: NoteQueryRequest = serde_json::from_str(&body)
		.map_err(|_| ApiError::validation("Request body must be a JSON object with a query field"))?;
	let query_text = payload.query.trim().to_string();

	if query_text.is_empty() {
		return Err(ApiError::validation("Query must be a non-empty string"));
	}

	let max_query_chars = state.service.deps.cfg.limits.max_query_chars;

	if query_text.chars().count() > max_query_chars {
		return Err(ApiError::validation(format!(
			"Query exceeds the maximum length of {max_query_chars} characters"
		)));
	}

	let request_id = Uuid::new_v4().to_string();

	tracing::info!(%request_id, "Accepted note query.");

	match state.service.query_notes(Query { query_text, request_id, api_token }).await {
		Ok(outcome) => {
			let mut response = (StatusCode::OK, Json(outcome.response)).into_response();

			apply_metadata_headers(&mut response, &outcome.metadata);

			Ok(response)
		},
		Err(failure) => Err(ApiError::upstream(failure.request_id, &failure.error, failure.metadata)),
	}
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
	detail: String,
}

#[derive(Debug, Serialize)]
struct UpstreamErrorBody {
	request_id: String,
	error: &'static str,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	body: serde_json::Value,
	metadata: Option<QueryMetadata>,
}
impl ApiError {
	pub fn unauthorized(detail: impl Into<String>) -> Self {
		Self {
			status: StatusCode::UNAUTHORIZED,
			body: serde_json::to_value(ErrorDetail { detail: detail.into() })
				.unwrap_or_default(),
			metadata: None,
		}
	}

	pub fn validation(detail: impl Into<String>) -> Self {
		Self {
			status: StatusCode::UNPROCESSABLE_ENTITY,
			body: serde_json::to_value(ErrorDetail { detail: detail.into() })
				.unwrap_or_default(),
			metadata: None,
		}
	}

	pub fn upstream(request_id: String, error: &ServiceError, metadata: QueryMetadata) -> Self {
		Self {
			status: StatusCode::SERVICE_UNAVAILABLE,
			body: serde_json::to_value(UpstreamErrorBody {
				request_id,
				error: error.kind(),
				message: error.to_string(),
			})
			.unwrap_or_default(),
			metadata: Some(metadata),
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let mut response = (self.status, Json(self.body)).into_response();

		if self.status == StatusCode::UNAUTHORIZED {
			response
				.headers_mut()
				.insert("WWW-Authenticate", HeaderValue::from_static("Bearer"));
		}
		if let Some(metadata) = &self.metadata {
			apply_metadata_headers(&mut response, metadata);
		}

		response
	}
}

fn apply_metadata_headers(response: &mut Response, metadata: &QueryMetadata) {
	for (name, value) in metadata.headers() {
		let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
			continue;
		};
		let Ok(value) = HeaderValue::from_str(&value) else {
			tracing::warn!(header = %name, "Skipping header with a non-ASCII value.");

			continue;
		};

		response.headers_mut().insert(name, value);
	}
}
