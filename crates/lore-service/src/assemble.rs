//! Response assembly: join cited paths back to retrieval records, attach
//! x-callback links best-effort, and build the header metadata.

use std::{sync::Arc, time::Duration};

use serde_json::Value;
use tokio::sync::Semaphore;

use crate::Dependencies;
use lore_domain::{
	AgentAnswer, NoteReference, RetrievalResult, UsageReport, canonicalize_references,
};
use lore_providers::parse_usage;

/// Metadata merged into the response headers.
#[derive(Clone, Debug)]
pub struct QueryMetadata {
	pub request_id: String,
	pub model_name: String,
	pub api_type: &'static str,
	pub generation_time_secs: f64,
	pub usage: UsageReport,
	pub usage_reporting: bool,
}
impl QueryMetadata {
	/// Header pairs for the HTTP layer. The identity and timing headers are
	/// always present; token headers appear only when usage reporting is
	/// enabled and the counter is known.
	pub fn headers(&self) -> Vec<(&'static str, String)> {
		let mut headers = vec![
			("X-Request-Id", self.request_id.clone()),
			("X-Model-Name", self.model_name.clone()),
			("X-API-Type", self.api_type.to_string()),
			("X-Generation-Time-Seconds", format!("{:.3}", self.generation_time_secs)),
		];

		if self.usage_reporting {
			if let Some(input_tokens) = self.usage.input_tokens {
				headers.push(("X-Input-Tokens", input_tokens.to_string()));
			}
			if let Some(output_tokens) = self.usage.output_tokens {
				headers.push(("X-Output-Tokens", output_tokens.to_string()));
			}
			if let Some(total_tokens) = self.usage.total_tokens {
				headers.push(("X-Total-Tokens", total_tokens.to_string()));
			}
		}

		headers
	}
}

/// Join the agent's citations back to their retrieval records. Citations
/// that fail the join are dropped with a warning; the canonical ordering is
/// re-established on the survivors.
pub(crate) fn join_citations(
	answer: &AgentAnswer,
	retrieval: &RetrievalResult,
) -> Vec<NoteReference> {
	let mut joined = Vec::new();

	for path in answer.distinct_citations() {
		match retrieval.find(&path) {
			Some(reference) => joined.push(reference.clone()),
			None => {
				tracing::warn!(file_path = %path, "Cited file not found among candidates; dropping.");
			},
		}
	}

	canonicalize_references(joined, None)
}

/// Attach x-callback links to the joined references, concurrently and
/// best-effort. Order is preserved; a failed fetch leaves that reference's
/// link absent and has no other observable consequence.
pub(crate) async fn attach_xcallback_urls(
	deps: &Dependencies,
	mut references: Vec<NoteReference>,
) -> Vec<NoteReference> {
	if references.is_empty() {
		return references;
	}

	let semaphore = Arc::new(Semaphore::new(deps.cfg.mcp.assembly_concurrency as usize));
	let timeout = Duration::from_secs(deps.cfg.mcp.timeout_secs);
	let fetches = references.iter().map(|reference| {
		let semaphore = semaphore.clone();
		let file_path = reference.file_path.clone();

		async move {
			let _permit = semaphore.acquire().await.ok()?;
			let result =
				tokio::time::timeout(timeout, deps.providers.xcallback.derive(&file_path, None))
					.await;

			match result {
				Ok(Ok(url)) => Some(url),
				Ok(Err(err)) => {
					tracing::warn!(error = %err, file_path = %file_path, "x-callback fetch failed; omitting link.");

					None
				},
				Err(_) => {
					tracing::warn!(file_path = %file_path, "x-callback fetch timed out; omitting link.");

					None
				},
			}
		}
	});
	let urls = futures::future::join_all(fetches).await;

	for (reference, url) in references.iter_mut().zip(urls) {
		reference.xcallback_url = url;
	}

	references
}

/// Resolve the usage counters for the response headers: the aggregated
/// request-level counter first, then the last raw response's `usage` field,
/// then unknown. Each field falls back independently.
pub(crate) fn extract_usage(aggregated: UsageReport, last_raw: Option<&Value>) -> UsageReport {
	let raw_usage = last_raw.map(|raw| parse_usage(raw.get("usage"))).unwrap_or_default();

	aggregated.or(raw_usage)
}
