//! The per-request state machine:
//! `GUARDRAIL_IN -> RETRIEVE -> SYNTHESIZE -> GUARDRAIL_OUT -> ASSEMBLE`.
//!
//! Guardrail trips are values, not errors: they produce a normal response
//! with `query_answered = false` and the tripped guardrail recorded. Stage
//! errors abort the pipeline and surface as a [`QueryFailure`] carrying the
//! same header metadata a success would.

use std::time::{Duration, Instant};

use serde_json::Value;

use crate::{
	Error, QueryMetadata, QueryService, agent, assemble, guardrails,
	guardrails::InputDecision, prompts, retrieval,
};
use lore_domain::{GuardrailKind, NoteQueryResponse, UsageReport};

/// One authenticated, validated inbound request.
#[derive(Clone, Debug)]
pub struct Query {
	pub query_text: String,
	pub request_id: String,
	/// Bearer credential forwarded to the LLM proxy.
	pub api_token: String,
}

#[derive(Debug)]
pub struct QueryOutcome {
	pub response: NoteQueryResponse,
	pub metadata: QueryMetadata,
}

#[derive(Debug)]
pub struct QueryFailure {
	pub request_id: String,
	pub error: Error,
	pub metadata: QueryMetadata,
}

/// Usage and raw-response state threaded through the pipeline so headers can
/// be assembled on every exit path.
#[derive(Debug, Default)]
struct RequestContext {
	usage: UsageReport,
	last_raw: Option<Value>,
}

impl QueryService {
	/// Drive one query through the pipeline under the whole-request deadline.
	pub async fn query_notes(&self, query: Query) -> Result<QueryOutcome, QueryFailure> {
		let started = Instant::now();
		let deadline_secs = self.deps.cfg.service.request_timeout_secs;
		let mut ctx = RequestContext::default();
		let result = tokio::time::timeout(
			Duration::from_secs(deadline_secs),
			self.run_pipeline(&query, &mut ctx),
		)
		.await;
		let completion = self.deps.providers.completion.as_ref();
		let metadata = QueryMetadata {
			request_id: query.request_id.clone(),
			model_name: completion.model().to_string(),
			api_type: completion.api_kind().as_str(),
			generation_time_secs: started.elapsed().as_secs_f64(),
			usage: assemble::extract_usage(ctx.usage, ctx.last_raw.as_ref()),
			usage_reporting: self.deps.cfg.usage_reporting,
		};

		match result {
			Ok(Ok(response)) => Ok(QueryOutcome { response, metadata }),
			Ok(Err(error)) => {
				tracing::error!(request_id = %query.request_id, error = %error, "Query pipeline failed.");

				Err(QueryFailure { request_id: query.request_id, error, metadata })
			},
			Err(_) => {
				// The in-flight stage was cancelled when the deadline future
				// dropped it.
				tracing::error!(request_id = %query.request_id, deadline_secs, "Request deadline elapsed.");

				Err(QueryFailure {
					request_id: query.request_id,
					error: Error::Cancelled { secs: deadline_secs },
					metadata,
				})
			},
		}
	}

	async fn run_pipeline(
		&self,
		query: &Query,
		ctx: &mut RequestContext,
	) -> Result<NoteQueryResponse, Error> {
		let deps = &self.deps;

		// GUARDRAIL_IN
		let (decision, guard_usage) =
			guardrails::evaluate_input(deps, &query.api_token, &query.query_text).await;

		ctx.usage.accumulate(&guard_usage);

		if let InputDecision::Reject { reason } = decision {
			tracing::info!(request_id = %query.request_id, %reason, "Input guardrail tripped.");

			return Ok(NoteQueryResponse {
				request_id: query.request_id.clone(),
				answer: prompts::INPUT_REJECTED_ANSWER.to_string(),
				reasoning: format!("Input guardrail tripped: {reason}"),
				relevant_files: Vec::new(),
				original_query: query.query_text.clone(),
				query_answered: false,
				guardrails_tripped: vec![GuardrailKind::DescribesNoteQuery],
			});
		}

		// RETRIEVE
		let retrieval = retrieval::retrieve(deps, &query.api_token, &query.query_text).await?;

		// SYNTHESIZE
		let synthesis =
			agent::synthesize(deps, &query.api_token, &query.query_text, &retrieval).await?;

		ctx.usage.accumulate(&synthesis.usage);

		ctx.last_raw = synthesis.last_raw.clone();

		// GUARDRAIL_OUT
		let (verdict, judge_usage) =
			guardrails::judge_answer(deps, &query.api_token, &query.query_text, &synthesis.answer)
				.await;

		ctx.usage.accumulate(&judge_usage);

		if verdict.is_trip() {
			tracing::info!(
				request_id = %query.request_id,
				intent_match_score = verdict.intent_match_score,
				"Output judge tripped."
			);

			return Ok(NoteQueryResponse {
				request_id: query.request_id.clone(),
				answer: prompts::JUDGE_REJECTED_ANSWER.to_string(),
				reasoning: verdict.feedback,
				relevant_files: assemble::join_citations(&synthesis.answer, &retrieval),
				original_query: query.query_text.clone(),
				query_answered: false,
				guardrails_tripped: vec![GuardrailKind::JudgesAnswerQuality],
			});
		}

		// ASSEMBLE
		let joined = assemble::join_citations(&synthesis.answer, &retrieval);
		let relevant_files = assemble::attach_xcallback_urls(deps, joined).await;

		Ok(NoteQueryResponse {
			request_id: query.request_id.clone(),
			answer: synthesis.answer.answer,
			reasoning: synthesis.answer.reasoning,
			relevant_files,
			original_query: query.query_text.clone(),
			query_answered: true,
			guardrails_tripped: Vec::new(),
		})
	}
}
