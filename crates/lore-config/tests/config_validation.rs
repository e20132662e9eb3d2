use std::{
	env, fs,
	path::PathBuf,
	time::{SystemTime, UNIX_EPOCH},
};

fn sample_toml(extra: &str) -> String {
	format!(
		r#"[service]
http_bind = "127.0.0.1:8080"

[proxy]
host = "127.0.0.1"
port = 4000

[embedding]
model = "text-embedding-qwen3-embedding-8b"

[completion]
model = "qwen3-coder-30b"

[retrieval]
url = "http://127.0.0.1:6334"
collection = "note_files_v1"

[mcp]
url = "http://127.0.0.1:8600"
{extra}"#
	)
}

fn write_temp_config(contents: &str) -> PathBuf {
	let nanos = SystemTime::now().duration_since(UNIX_EPOCH).expect("Clock went backwards.").as_nanos();
	let path = env::temp_dir().join(format!("lore_config_test_{nanos}.toml"));

	fs::write(&path, contents).expect("Failed to write temp config.");

	path
}

#[test]
fn loads_with_defaults() {
	let path = write_temp_config(&sample_toml(""));
	let cfg = lore_config::load(&path).expect("Config should load.");

	assert_eq!(cfg.retrieval.top_n, 5);
	assert_eq!(cfg.completion.tool_budget, 8);
	assert_eq!(cfg.completion.max_tokens, 1_000);
	assert_eq!(cfg.service.request_timeout_secs, 180);
	assert_eq!(cfg.mcp.timeout_secs, 10);
	assert_eq!(cfg.mcp.assembly_concurrency, 4);
	assert!(cfg.usage_reporting);
	assert_eq!(cfg.embedding.dimension(), Some(4_096));
	assert_eq!(cfg.proxy.base_url(), "http://127.0.0.1:4000/v1");

	fs::remove_file(path).ok();
}

#[test]
fn merges_configured_dimensions_over_builtins() {
	let extra = r#"
[embedding.dimensions]
"custom-embedder" = 256
"#;
	let mut contents = sample_toml(extra);

	contents = contents.replace(
		"model = \"text-embedding-qwen3-embedding-8b\"",
		"model = \"custom-embedder\"",
	);

	let path = write_temp_config(&contents);
	let cfg = lore_config::load(&path).expect("Config should load.");

	assert_eq!(cfg.embedding.dimension(), Some(256));
	// Built-in entries survive the merge.
	assert_eq!(cfg.embedding.dimensions.get("text-embedding-3-small"), Some(&1_536));

	fs::remove_file(path).ok();
}

#[test]
fn rejects_unknown_embedding_model() {
	let contents = sample_toml("").replace(
		"model = \"text-embedding-qwen3-embedding-8b\"",
		"model = \"no-such-embedder\"",
	);
	let path = write_temp_config(&contents);
	let err = lore_config::load(&path).expect_err("Unknown embedding model should fail.");

	assert!(err.to_string().contains("no-such-embedder"));

	fs::remove_file(path).ok();
}

#[test]
fn rejects_zero_top_n() {
	let contents = sample_toml("").replace(
		"collection = \"note_files_v1\"",
		"collection = \"note_files_v1\"\ntop_n = 0",
	);
	let path = write_temp_config(&contents);
	let err = lore_config::load(&path).expect_err("Zero top_n should fail.");

	assert!(err.to_string().contains("retrieval.top_n"));

	fs::remove_file(path).ok();
}

#[test]
fn rejects_similarity_floor_out_of_range() {
	let contents = sample_toml("").replace(
		"collection = \"note_files_v1\"",
		"collection = \"note_files_v1\"\nsimilarity_floor = 1.5",
	);
	let path = write_temp_config(&contents);
	let err = lore_config::load(&path).expect_err("Out-of-range floor should fail.");

	assert!(err.to_string().contains("similarity_floor"));

	fs::remove_file(path).ok();
}

#[test]
fn env_override_applies_to_search_timeout() {
	// SAFETY: Test-only process-wide env mutation; no other test asserts on
	// this variable's target field.
	unsafe {
		env::set_var("LORE_SEARCH_TIMEOUT_SECS", "9");
	}

	let path = write_temp_config(&sample_toml(""));
	let cfg = lore_config::load(&path).expect("Config should load.");

	assert_eq!(cfg.retrieval.search_timeout_secs, 9);

	unsafe {
		env::remove_var("LORE_SEARCH_TIMEOUT_SECS");
	}
	fs::remove_file(path).ok();
}
