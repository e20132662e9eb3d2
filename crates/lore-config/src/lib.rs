//! Configuration for the lore note-query service.
//!
//! A config is loaded from a TOML file, then environment overrides are
//! applied, then the secrets chain fills the fallback proxy token, then the
//! whole value is validated. After [`load`] returns, the config is immutable.

mod secrets;
mod types;

mod error;

pub use error::{Error, Result};
pub use secrets::{DEV_FALLBACK_TOKEN, load_secret};
pub use types::{
	ApiSelector, Completion, Config, Embedding, Limits, Mcp, Proxy, Retrieval, Security, Service,
};

use std::{env, fs, path::Path, str::FromStr};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|source| Error::ReadConfig { path: path.to_path_buf(), source })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|source| Error::ParseConfig { path: path.to_path_buf(), source })?;

	apply_env_overrides(&mut cfg)?;
	normalize(&mut cfg);
	resolve_secrets(&mut cfg)?;
	validate(&cfg)?;

	Ok(cfg)
}

fn apply_env_overrides(cfg: &mut Config) -> Result<()> {
	override_string("LORE_HTTP_BIND", &mut cfg.service.http_bind);
	override_string("LORE_LOG_LEVEL", &mut cfg.service.log_level);
	override_parsed("LORE_REQUEST_TIMEOUT_SECS", &mut cfg.service.request_timeout_secs)?;
	override_string("LORE_PROXY_HOST", &mut cfg.proxy.host);
	override_parsed("LORE_PROXY_PORT", &mut cfg.proxy.port)?;
	override_string("LORE_EMBEDDING_MODEL", &mut cfg.embedding.model);
	override_parsed("LORE_EMBEDDING_TIMEOUT_SECS", &mut cfg.embedding.timeout_secs)?;
	override_string("LORE_COMPLETION_MODEL", &mut cfg.completion.model);
	override_parsed("LORE_COMPLETION_TIMEOUT_SECS", &mut cfg.completion.timeout_secs)?;
	override_string("LORE_QDRANT_URL", &mut cfg.retrieval.url);
	override_string("LORE_COLLECTION", &mut cfg.retrieval.collection);
	override_parsed("LORE_TOP_N", &mut cfg.retrieval.top_n)?;
	override_parsed("LORE_SEARCH_TIMEOUT_SECS", &mut cfg.retrieval.search_timeout_secs)?;
	override_string("LORE_MCP_URL", &mut cfg.mcp.url);
	override_parsed("LORE_MCP_TIMEOUT_SECS", &mut cfg.mcp.timeout_secs)?;
	override_parsed("LORE_USAGE_REPORTING", &mut cfg.usage_reporting)?;
	override_parsed("LORE_ALLOW_DEV_TOKEN", &mut cfg.security.allow_dev_token)?;

	if let Ok(raw) = env::var("LORE_COMPLETION_API") {
		cfg.completion.api = match raw.trim() {
			"auto" => ApiSelector::Auto,
			"chat_completions" => ApiSelector::ChatCompletions,
			"responses" => ApiSelector::Responses,
			other => {
				return Err(Error::EnvOverride {
					var: "LORE_COMPLETION_API".to_string(),
					message: format!(
						"{other:?} is not one of auto, chat_completions, or responses."
					),
				});
			},
		};
	}

	Ok(())
}

fn override_string(var: &str, target: &mut String) {
	if let Ok(value) = env::var(var) {
		let value = value.trim();

		if !value.is_empty() {
			*target = value.to_string();
		}
	}
}

fn override_parsed<T>(var: &str, target: &mut T) -> Result<()>
where
	T: FromStr,
	T::Err: std::fmt::Display,
{
	if let Ok(value) = env::var(var) {
		let value = value.trim();

		if value.is_empty() {
			return Ok(());
		}

		*target = value
			.parse()
			.map_err(|err| Error::EnvOverride { var: var.to_string(), message: format!("{err}.") })?;
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let mut dimensions = types::builtin_embedding_dimensions();

	dimensions.extend(cfg.embedding.dimensions.drain());

	cfg.embedding.dimensions = dimensions;
}

fn resolve_secrets(cfg: &mut Config) -> Result<()> {
	if cfg.security.proxy_api_token.is_none() {
		cfg.security.proxy_api_token = load_secret(
			"proxy_api_token",
			"LORE_PROXY_API_TOKEN",
			false,
			cfg.security.allow_dev_token,
		)?;
	}

	Ok(())
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return validation_err("service.http_bind must be non-empty.");
	}
	if cfg.service.request_timeout_secs == 0 {
		return validation_err("service.request_timeout_secs must be greater than zero.");
	}
	if cfg.proxy.host.trim().is_empty() {
		return validation_err("proxy.host must be non-empty.");
	}
	if cfg.embedding.model.trim().is_empty() {
		return validation_err("embedding.model must be non-empty.");
	}
	if cfg.embedding.dimension().is_none() {
		return Err(Error::Validation {
			message: format!(
				"embedding.dimensions has no entry for model {:?}.",
				cfg.embedding.model
			),
		});
	}
	if cfg.embedding.timeout_secs == 0 {
		return validation_err("embedding.timeout_secs must be greater than zero.");
	}
	if cfg.completion.model.trim().is_empty() {
		return validation_err("completion.model must be non-empty.");
	}
	if !cfg.completion.temperature.is_finite() || cfg.completion.temperature < 0.0 {
		return validation_err("completion.temperature must be a non-negative finite number.");
	}
	if cfg.completion.max_tokens == 0 {
		return validation_err("completion.max_tokens must be greater than zero.");
	}
	if cfg.completion.timeout_secs == 0 {
		return validation_err("completion.timeout_secs must be greater than zero.");
	}
	if cfg.completion.tool_budget == 0 {
		return validation_err("completion.tool_budget must be greater than zero.");
	}
	if cfg.retrieval.url.trim().is_empty() {
		return validation_err("retrieval.url must be non-empty.");
	}
	if cfg.retrieval.collection.trim().is_empty() {
		return validation_err("retrieval.collection must be non-empty.");
	}
	if cfg.retrieval.top_n == 0 {
		return validation_err("retrieval.top_n must be greater than zero.");
	}
	if cfg.retrieval.search_timeout_secs == 0 {
		return validation_err("retrieval.search_timeout_secs must be greater than zero.");
	}
	if let Some(floor) = cfg.retrieval.similarity_floor {
		if !floor.is_finite() || !(0.0..=1.0).contains(&floor) {
			return validation_err("retrieval.similarity_floor must be in the range 0.0-1.0.");
		}
	}
	if cfg.mcp.url.trim().is_empty() {
		return validation_err("mcp.url must be non-empty.");
	}
	if cfg.mcp.timeout_secs == 0 {
		return validation_err("mcp.timeout_secs must be greater than zero.");
	}
	if cfg.mcp.assembly_concurrency == 0 {
		return validation_err("mcp.assembly_concurrency must be greater than zero.");
	}
	if cfg.limits.max_query_chars == 0 {
		return validation_err("limits.max_query_chars must be greater than zero.");
	}

	Ok(())
}

fn validation_err(message: &str) -> Result<()> {
	Err(Error::Validation { message: message.to_string() })
}
