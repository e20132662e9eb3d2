use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result, UpstreamErrorKind, auth_headers};
use lore_config::{Embedding, Proxy};

/// Client for the proxy's `/v1/embeddings` endpoint.
///
/// Built once at startup; the inner `reqwest::Client` owns the connection
/// pool shared across requests.
pub struct EmbeddingClient {
	http: Client,
	url: String,
	model: String,
	dimension: u32,
}
impl EmbeddingClient {
	pub fn new(proxy: &Proxy, cfg: &Embedding, dimension: u32) -> Result<Self> {
		let http = Client::builder()
			.timeout(Duration::from_secs(cfg.timeout_secs))
			.build()
			.map_err(|err| Error::Embedding {
				kind: UpstreamErrorKind::Other,
				message: format!("Failed to build HTTP client: {err}."),
			})?;

		Ok(Self {
			http,
			url: format!("{}/embeddings", proxy.base_url()),
			model: cfg.model.clone(),
			dimension,
		})
	}

	pub fn dimension(&self) -> u32 {
		self.dimension
	}

	/// Embed a query string into a vector of the configured dimension.
	pub async fn embed(&self, api_token: &str, text: &str) -> Result<Vec<f32>> {
		let body = serde_json::json!({
			"model": self.model,
			"input": [text],
		});
		// A malformed bearer is an embedding-stage failure here.
		let headers = auth_headers(api_token).map_err(|err| Error::Embedding {
			kind: UpstreamErrorKind::Auth,
			message: err.to_string(),
		})?;
		let response = self
			.http
			.post(&self.url)
			.headers(headers)
			.json(&body)
			.send()
			.await
			.map_err(|err| Error::Embedding {
				kind: UpstreamErrorKind::from_reqwest(&err),
				message: format!("{err}."),
			})?;
		let status = response.status();

		if !status.is_success() {
			return Err(Error::Embedding {
				kind: UpstreamErrorKind::from_status(status),
				message: format!("Embeddings endpoint returned {status}."),
			});
		}

		let json: Value = response.json().await.map_err(|err| Error::Embedding {
			kind: UpstreamErrorKind::from_reqwest(&err),
			message: format!("{err}."),
		})?;
		let vector = parse_embedding_response(json)?;

		if vector.len() != self.dimension as usize {
			return Err(Error::EmbeddingDimension {
				expected: self.dimension,
				actual: vector.len(),
			});
		}

		Ok(vector)
	}
}

fn parse_embedding_response(json: Value) -> Result<Vec<f32>> {
	let item = json
		.get("data")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Embedding response is missing data array.".to_string(),
		})?;
	let embedding =
		item.get("embedding").and_then(|v| v.as_array()).ok_or_else(|| Error::InvalidResponse {
			message: "Embedding item is missing embedding array.".to_string(),
		})?;
	let mut vector = Vec::with_capacity(embedding.len());

	for value in embedding {
		let number = value.as_f64().ok_or_else(|| Error::InvalidResponse {
			message: "Embedding value must be numeric.".to_string(),
		})?;

		vector.push(number as f32);
	}

	Ok(vector)
}
