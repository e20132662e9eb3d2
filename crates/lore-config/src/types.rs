use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub proxy: Proxy,
	pub embedding: Embedding,
	pub completion: Completion,
	pub retrieval: Retrieval,
	pub mcp: Mcp,
	#[serde(default)]
	pub security: Security,
	#[serde(default)]
	pub limits: Limits,
	#[serde(default = "default_usage_reporting")]
	pub usage_reporting: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
	#[serde(default = "default_request_timeout_secs")]
	pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Proxy {
	pub host: String,
	pub port: u16,
}
impl Proxy {
	/// Base URL of the OpenAI-compatible proxy, including the `/v1` prefix.
	pub fn base_url(&self) -> String {
		format!("http://{}:{}/v1", self.host, self.port)
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Embedding {
	pub model: String,
	/// Model name to vector dimension. Merged over the built-in table during
	/// normalization, so a config only lists models the defaults miss.
	#[serde(default)]
	pub dimensions: HashMap<String, u32>,
	#[serde(default = "default_embedding_timeout_secs")]
	pub timeout_secs: u64,
}
impl Embedding {
	pub fn dimension(&self) -> Option<u32> {
		self.dimensions.get(&self.model).copied()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiSelector {
	Auto,
	ChatCompletions,
	Responses,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Completion {
	pub model: String,
	#[serde(default = "default_api_selector")]
	pub api: ApiSelector,
	/// Substrings that mark a model as requiring the responses path when the
	/// selector is `auto`.
	#[serde(default = "default_responses_model_patterns")]
	pub responses_model_patterns: Vec<String>,
	#[serde(default = "default_temperature")]
	pub temperature: f32,
	#[serde(default = "default_max_tokens")]
	pub max_tokens: u32,
	#[serde(default = "default_completion_timeout_secs")]
	pub timeout_secs: u64,
	#[serde(default = "default_tool_budget")]
	pub tool_budget: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Retrieval {
	pub url: String,
	pub collection: String,
	#[serde(default = "default_top_n")]
	pub top_n: u32,
	pub similarity_floor: Option<f32>,
	#[serde(default = "default_search_timeout_secs")]
	pub search_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Mcp {
	pub url: String,
	#[serde(default = "default_mcp_timeout_secs")]
	pub timeout_secs: u64,
	#[serde(default = "default_assembly_concurrency")]
	pub assembly_concurrency: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Security {
	/// Fallback proxy API token for callers that do not forward one. Filled
	/// from the secrets chain when absent from the file.
	pub proxy_api_token: Option<String>,
	#[serde(default)]
	pub allow_dev_token: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Limits {
	pub max_query_chars: usize,
}
impl Default for Limits {
	fn default() -> Self {
		Self { max_query_chars: 2_000 }
	}
}

pub(crate) fn builtin_embedding_dimensions() -> HashMap<String, u32> {
	[
		("text-embedding-3-small", 1_536),
		("text-embedding-3-large", 3_072),
		("text-embedding-ada-002", 1_536),
		("text-embedding-qwen3-embedding-8b", 4_096),
		("text-embedding-nomic-embed-text-v1.5", 768),
	]
	.into_iter()
	.map(|(model, dim)| (model.to_string(), dim))
	.collect()
}

fn default_usage_reporting() -> bool {
	true
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_request_timeout_secs() -> u64 {
	180
}

fn default_embedding_timeout_secs() -> u64 {
	30
}

fn default_api_selector() -> ApiSelector {
	ApiSelector::Auto
}

fn default_responses_model_patterns() -> Vec<String> {
	vec!["gpt-oss".to_string()]
}

fn default_temperature() -> f32 {
	0.1
}

fn default_max_tokens() -> u32 {
	1_000
}

fn default_completion_timeout_secs() -> u64 {
	120
}

fn default_tool_budget() -> u32 {
	8
}

fn default_top_n() -> u32 {
	5
}

fn default_search_timeout_secs() -> u64 {
	15
}

fn default_mcp_timeout_secs() -> u64 {
	10
}

fn default_assembly_concurrency() -> u32 {
	4
}
