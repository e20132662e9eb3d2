//! Outbound clients: proxy embeddings, proxy chat completions, and the MCP
//! x-callback tool service.

pub mod embedding;
pub mod llm;
pub mod mcp;

mod error;

pub use embedding::EmbeddingClient;
pub use error::{Error, Result, UpstreamErrorKind};
pub use llm::{ApiKind, Conversation, LlmClient, ModelTurn, ToolCall, ToolSpec, parse_usage};
pub use mcp::{McpClient, XCALLBACK_TOOL_NAME};

use reqwest::header::{AUTHORIZATION, HeaderMap};

/// Bearer headers for a proxy call. The token is the one forwarded by the
/// inbound request, so it is built per call rather than baked into a client.
pub fn auth_headers(api_token: &str) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();
	let value = format!("Bearer {api_token}").parse().map_err(
		|err: reqwest::header::InvalidHeaderValue| Error::InvalidHeader {
			message: format!("{err}."),
		},
	)?;

	headers.insert(AUTHORIZATION, value);

	Ok(headers)
}
