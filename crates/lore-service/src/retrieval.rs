//! Retrieval stage: query embedding, nearest-neighbour search, and candidate
//! canonicalization.

use std::time::Duration;

use crate::{Dependencies, Error, Result};
use lore_domain::{RetrievalResult, canonicalize_references};

const EMBED_RETRIES: u32 = 2;
const EMBED_BACKOFF_BASE_MS: u64 = 100;

/// Embed the query, search the configured collection, then deduplicate,
/// order, and floor the candidates. An empty result is a legal outcome and
/// flows through to synthesis.
pub(crate) async fn retrieve(
	deps: &Dependencies,
	api_token: &str,
	query_text: &str,
) -> Result<RetrievalResult> {
	let vector = embed_with_retry(deps, api_token, query_text).await?;
	let search = deps.providers.search.as_ref();
	let timeout = Duration::from_secs(deps.cfg.retrieval.search_timeout_secs);
	let references = match tokio::time::timeout(
		timeout,
		search.search(&vector, deps.cfg.retrieval.top_n),
	)
	.await
	{
		Ok(result) => result?,
		Err(_) =>
			return Err(Error::VectorStore {
				message: format!(
					"Vector search exceeded {} seconds.",
					deps.cfg.retrieval.search_timeout_secs
				),
			}),
	};
	let references = canonicalize_references(references, deps.cfg.retrieval.similarity_floor);

	tracing::debug!(
		candidates = references.len(),
		collection = %search.collection(),
		"Retrieval complete."
	);

	Ok(RetrievalResult {
		references,
		query_embedding_dim: vector.len() as u32,
		collection_name: search.collection().to_string(),
	})
}

/// Embedding call with a capped exponential retry schedule for transient
/// failures. Dimension mismatches and auth failures are not retried.
async fn embed_with_retry(
	deps: &Dependencies,
	api_token: &str,
	query_text: &str,
) -> Result<Vec<f32>> {
	let embedding = deps.providers.embedding.as_ref();
	let timeout = Duration::from_secs(deps.cfg.embedding.timeout_secs);
	let mut backoff = Duration::from_millis(EMBED_BACKOFF_BASE_MS);

	for attempt in 0..=EMBED_RETRIES {
		let result =
			match tokio::time::timeout(timeout, embedding.embed(api_token, query_text)).await {
				Ok(result) => result,
				Err(_) => Err(Error::Embedding {
					message: format!(
						"Embedding call exceeded {} seconds.",
						deps.cfg.embedding.timeout_secs
					),
					transient: true,
				}),
			};

		match result {
			Ok(vector) => return Ok(vector),
			Err(err) if err.is_transient_embedding() && attempt < EMBED_RETRIES => {
				tracing::warn!(error = %err, attempt, "Transient embedding failure; retrying.");
				tokio::time::sleep(backoff).await;

				backoff = backoff.saturating_mul(2);
			},
			Err(err) => return Err(err),
		}
	}

	unreachable!("The retry loop returns on its final attempt.")
}
