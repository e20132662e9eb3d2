//! Secret loading with a single explicit source priority list.
//!
//! Every secret is resolved here; no other module reads secret files or
//! secret-bearing environment variables directly.

use std::{env, fs, path::PathBuf};

use crate::{Error, Result};

/// Development-only fallback, valid only behind `security.allow_dev_token`.
pub const DEV_FALLBACK_TOKEN: &str = "sk-lore-dev-token";

/// Resolve a secret by name, checking in priority order:
///
/// 1. the mounted secret file `/run/secrets/<name>`,
/// 2. the project-local file `secrets/<name>.txt`,
/// 3. the environment variable `<env_var>`,
/// 4. the built-in development fallback, only when `allow_dev_fallback`.
///
/// Empty and whitespace-only values are treated as absent.
pub fn load_secret(
	name: &str,
	env_var: &str,
	required: bool,
	allow_dev_fallback: bool,
) -> Result<Option<String>> {
	for path in secret_paths(name) {
		if let Some(value) = read_secret_file(&path) {
			return Ok(Some(value));
		}
	}

	if let Ok(value) = env::var(env_var) {
		let value = value.trim();

		if !value.is_empty() {
			return Ok(Some(value.to_string()));
		}
	}

	if allow_dev_fallback {
		return Ok(Some(DEV_FALLBACK_TOKEN.to_string()));
	}

	if required {
		let checked = secret_paths(name)
			.iter()
			.map(|path| path.display().to_string())
			.chain([format!("${env_var}")])
			.collect::<Vec<_>>()
			.join(", ");

		return Err(Error::MissingSecret { name: name.to_string(), checked });
	}

	Ok(None)
}

fn secret_paths(name: &str) -> [PathBuf; 2] {
	[PathBuf::from(format!("/run/secrets/{name}")), PathBuf::from(format!("secrets/{name}.txt"))]
}

fn read_secret_file(path: &PathBuf) -> Option<String> {
	let raw = fs::read_to_string(path).ok()?;
	let trimmed = raw.trim();

	if trimmed.is_empty() {
		return None;
	}

	Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_required_secret_reports_sources() {
		let err = load_secret("lore_test_no_such_secret", "LORE_TEST_NO_SUCH_SECRET", true, false)
			.unwrap_err();
		let message = err.to_string();

		assert!(message.contains("lore_test_no_such_secret"));
		assert!(message.contains("$LORE_TEST_NO_SUCH_SECRET"));
	}

	#[test]
	fn optional_missing_secret_is_none() {
		let secret =
			load_secret("lore_test_no_such_secret", "LORE_TEST_NO_SUCH_SECRET", false, false)
				.unwrap();

		assert!(secret.is_none());
	}

	#[test]
	fn dev_fallback_applies_when_permitted() {
		let secret =
			load_secret("lore_test_no_such_secret", "LORE_TEST_NO_SUCH_SECRET", false, true)
				.unwrap();

		assert_eq!(secret.as_deref(), Some(DEV_FALLBACK_TOKEN));
	}
}
