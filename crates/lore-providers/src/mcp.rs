use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};
use lore_config::Mcp;

pub const XCALLBACK_TOOL_NAME: &str = "derive_xcallback_url_from_noteplan_file";

/// Client for the external MCP tool service that converts a NotePlan file
/// path into an x-callback-url. Failures here are never fatal to a query;
/// callers drop the link and continue.
pub struct McpClient {
	http: Client,
	url: String,
}
impl McpClient {
	pub fn new(cfg: &Mcp) -> Result<Self> {
		let http = Client::builder()
			.timeout(Duration::from_secs(cfg.timeout_secs))
			.build()
			.map_err(|err| Error::Mcp { message: format!("Failed to build HTTP client: {err}.") })?;

		Ok(Self { http, url: format!("{}/tools/{XCALLBACK_TOOL_NAME}", cfg.url.trim_end_matches('/')) })
	}

	pub async fn derive_xcallback_url(
		&self,
		file_path: &str,
		heading: Option<&str>,
	) -> Result<String> {
		let mut body = serde_json::json!({ "file_path": file_path });

		if let Some(heading) = heading {
			body["heading"] = Value::String(heading.to_string());
		}

		let response = self
			.http
			.post(&self.url)
			.json(&body)
			.send()
			.await
			.map_err(|err| Error::Mcp { message: format!("{err}.") })?;
		let status = response.status();

		if !status.is_success() {
			return Err(Error::Mcp { message: format!("MCP service returned {status}.") });
		}

		let json: Value = response
			.json()
			.await
			.map_err(|err| Error::Mcp { message: format!("{err}.") })?;

		parse_xcallback_response(json)
	}
}

fn parse_xcallback_response(json: Value) -> Result<String> {
	let url = json
		.get("url")
		.and_then(|v| v.as_str())
		.map(str::trim)
		.filter(|url| !url.is_empty())
		.ok_or_else(|| Error::Mcp { message: "MCP response is missing url.".to_string() })?;

	Ok(url.to_string())
}
