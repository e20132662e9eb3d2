//! Synthesis agent: a bounded tool-call loop over the completion client that
//! produces a grounded, cited answer.

use std::time::Duration;

use serde_json::Value;

use crate::{
	Dependencies, Error, Result, complete_with_timeout, extract_json_object, prompts,
};
use lore_domain::{AgentAnswer, RetrievalResult, UsageReport};
use lore_providers::{ToolCall, XCALLBACK_TOOL_NAME};

/// One executed tool call, kept for observability and tests.
#[derive(Clone, Debug)]
pub struct ToolInvocation {
	pub name: String,
	pub arguments: Value,
	pub output: String,
}

/// What the synthesis stage hands to the judge and the assembler.
#[derive(Debug)]
pub struct SynthesisOutcome {
	pub answer: AgentAnswer,
	pub usage: UsageReport,
	pub last_raw: Option<Value>,
	pub tool_trace: Vec<ToolInvocation>,
}

/// Run the agent over the query and its retrieval candidates.
///
/// The loop is bounded three ways: the tool budget caps executed calls, one
/// corrective retry is allowed for malformed JSON, and one for a
/// citation-subset violation. Anything beyond that is an
/// [`Error::AgentOutput`].
pub(crate) async fn synthesize(
	deps: &Dependencies,
	api_token: &str,
	query: &str,
	retrieval: &RetrievalResult,
) -> Result<SynthesisOutcome> {
	let completion = deps.providers.completion.as_ref();
	let timeout_secs = deps.cfg.completion.timeout_secs;
	let budget = deps.cfg.completion.tool_budget;
	let tools = [prompts::xcallback_tool_spec()];
	let mut conversation = lore_providers::Conversation::new(
		completion.api_kind(),
		prompts::AGENT_INSTRUCTIONS,
		&prompts::agent_user_message(query, retrieval),
	);
	let mut usage = UsageReport::default();
	let mut last_raw = None;
	let mut tool_trace = Vec::new();
	let mut tool_calls_made = 0u32;
	let mut budget_warned = false;
	let mut json_retry_used = false;
	let mut citation_retry_used = false;

	loop {
		let turn =
			complete_with_timeout(completion, api_token, &conversation, &tools, timeout_secs)
				.await?;

		usage.accumulate(&turn.usage);

		last_raw = Some(turn.raw.clone());

		if !turn.tool_calls.is_empty() {
			if budget_warned {
				// The model kept requesting tools after the budget ran out.
				// Salvage whatever structured output this turn carries.
				if let Some(answer) = parse_agent_answer(turn.text.as_deref())
					&& answer.citation_violations(retrieval).is_empty()
					&& !answer.answer.trim().is_empty()
				{
					return Ok(SynthesisOutcome {
						answer: normalize(answer),
						usage,
						last_raw,
						tool_trace,
					});
				}

				return Err(Error::AgentOutput {
					message: format!(
						"Tool budget of {budget} exhausted without structured output."
					),
				});
			}

			conversation.push_assistant_turn(&turn);

			for call in &turn.tool_calls {
				if tool_calls_made >= budget {
					conversation.push_tool_output(call, "Error: tool budget exhausted.");

					continue;
				}

				tool_calls_made += 1;

				let output = execute_tool(deps, call).await;

				tool_trace.push(ToolInvocation {
					name: call.name.clone(),
					arguments: call.arguments.clone(),
					output: output.clone(),
				});
				conversation.push_tool_output(call, &output);
			}

			if tool_calls_made >= budget {
				budget_warned = true;

				conversation.push_user(
					"The tool budget is exhausted. Produce the final JSON object now without further tool calls.",
				);
			}

			continue;
		}

		let Some(answer) = parse_agent_answer(turn.text.as_deref()) else {
			if json_retry_used {
				return Err(Error::AgentOutput {
					message: "Agent did not return schema-conformant JSON after a corrective retry."
						.to_string(),
				});
			}

			json_retry_used = true;

			conversation.push_assistant_turn(&turn);
			conversation.push_user(prompts::JSON_RETRY_INSTRUCTION);

			continue;
		};
		let violations = answer.citation_violations(retrieval);

		if !violations.is_empty() {
			if citation_retry_used {
				return Err(Error::AgentOutput {
					message: format!(
						"Agent cited files outside the candidate list after a corrective retry: {}.",
						violations.join(", ")
					),
				});
			}

			citation_retry_used = true;

			tracing::warn!(violations = ?violations, "Citation subset violation; retrying once.");
			conversation.push_assistant_turn(&turn);
			conversation.push_user(&prompts::citation_retry_instruction(&violations, retrieval));

			continue;
		}

		if answer.answer.trim().is_empty() {
			if json_retry_used {
				return Err(Error::AgentOutput {
					message: "Agent returned an empty answer after a corrective retry.".to_string(),
				});
			}

			json_retry_used = true;

			conversation.push_assistant_turn(&turn);
			conversation.push_user(
				"The answer field must be non-empty. Return the corrected JSON object.",
			);

			continue;
		}

		return Ok(SynthesisOutcome { answer: normalize(answer), usage, last_raw, tool_trace });
	}
}

async fn execute_tool(deps: &Dependencies, call: &ToolCall) -> String {
	if call.name != XCALLBACK_TOOL_NAME {
		return format!("Error: unknown tool {:?}.", call.name);
	}

	let Some(file_path) = call.arguments.get("file_path").and_then(|v| v.as_str()) else {
		return "Error: the file_path argument is required.".to_string();
	};
	let heading = call.arguments.get("heading").and_then(|v| v.as_str());
	let timeout = Duration::from_secs(deps.cfg.mcp.timeout_secs);
	let result = tokio::time::timeout(
		timeout,
		deps.providers.xcallback.derive(file_path, heading),
	)
	.await;

	match result {
		Ok(Ok(url)) => url,
		Ok(Err(err)) => {
			tracing::warn!(error = %err, file_path, "x-callback tool call failed.");

			format!("Error: could not derive a link for {file_path}.")
		},
		Err(_) => {
			tracing::warn!(file_path, "x-callback tool call timed out.");

			format!("Error: could not derive a link for {file_path}.")
		},
	}
}

fn parse_agent_answer(text: Option<&str>) -> Option<AgentAnswer> {
	let value = extract_json_object(text?)?;

	serde_json::from_value(value).ok()
}

fn normalize(mut answer: AgentAnswer) -> AgentAnswer {
	answer.cited_file_paths = answer.distinct_citations();

	answer
}
