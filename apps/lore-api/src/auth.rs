//! Bearer-token extraction for the query endpoint.

use axum::http::HeaderMap;

use crate::routes::ApiError;

/// Extract the bearer credential from the `Authorization` header. The token
/// is forwarded to the LLM proxy; the proxy owns its verification.
pub fn bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
	let Some(raw) = headers.get(axum::http::header::AUTHORIZATION) else {
		return Err(ApiError::unauthorized("Authorization header is required"));
	};
	let Ok(raw) = raw.to_str() else {
		return Err(ApiError::unauthorized("Invalid authorization header format"));
	};
	let mut parts = raw.split_whitespace();
	let scheme = parts.next().unwrap_or_default();
	let token = parts.next().unwrap_or_default();

	if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() || parts.next().is_some() {
		return Err(ApiError::unauthorized("Invalid authorization header format"));
	}

	Ok(token.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::http::{HeaderValue, header::AUTHORIZATION};

	fn headers_with(value: &str) -> HeaderMap {
		let mut headers = HeaderMap::new();

		headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());

		headers
	}

	#[test]
	fn extracts_bearer_token() {
		let token = bearer_token(&headers_with("Bearer sk-test-valid")).expect("Token expected.");

		assert_eq!(token, "sk-test-valid");
	}

	#[test]
	fn missing_header_is_unauthorized() {
		assert!(bearer_token(&HeaderMap::new()).is_err());
	}

	#[test]
	fn non_bearer_scheme_is_unauthorized() {
		assert!(bearer_token(&headers_with("Basic dXNlcjpwYXNz")).is_err());
	}

	#[test]
	fn empty_token_is_unauthorized() {
		assert!(bearer_token(&headers_with("Bearer ")).is_err());
	}
}
