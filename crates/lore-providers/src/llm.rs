//! Chat-completion client for the OpenAI-compatible proxy.
//!
//! Two wire protocols hide behind one interface: the standard
//! chat-completions path and the responses path with native tool items. The
//! caller drives a conversation, appends tool outputs, and receives parsed
//! [`ModelTurn`]s; the protocol difference is confined to this module.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result, UpstreamErrorKind, auth_headers};
use lore_config::{ApiSelector, Completion, Proxy};
use lore_domain::UsageReport;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiKind {
	ChatCompletions,
	Responses,
}
impl ApiKind {
	/// Pure selection from the configured selector and model name.
	pub fn select(selector: ApiSelector, model: &str, patterns: &[String]) -> Self {
		match selector {
			ApiSelector::ChatCompletions => Self::ChatCompletions,
			ApiSelector::Responses => Self::Responses,
			ApiSelector::Auto =>
				if patterns.iter().any(|pattern| model.contains(pattern.as_str())) {
					Self::Responses
				} else {
					Self::ChatCompletions
				},
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::ChatCompletions => "chat_completions",
			Self::Responses => "responses",
		}
	}
}

/// A callable tool advertised to the model: name, description, and the JSON
/// schema of its arguments.
#[derive(Clone, Debug)]
pub struct ToolSpec {
	pub name: String,
	pub description: String,
	pub parameters: Value,
}

/// One tool invocation requested by the model.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
	pub id: String,
	pub name: String,
	pub arguments: Value,
}

/// A parsed model response: visible text, requested tool calls, token usage,
/// the raw response for header assembly, and the protocol-shaped items that
/// represent this turn when the conversation continues.
#[derive(Clone, Debug)]
pub struct ModelTurn {
	pub text: Option<String>,
	pub tool_calls: Vec<ToolCall>,
	pub usage: UsageReport,
	pub raw: Value,
	assistant_items: Vec<Value>,
}
impl ModelTurn {
	/// Assemble a turn from its parts, reconstructing the conversation items
	/// in chat shape. Intended for provider substitutes in tests; parsed
	/// turns carry the protocol's own items instead.
	pub fn from_parts(
		text: Option<String>,
		tool_calls: Vec<ToolCall>,
		usage: UsageReport,
		raw: Value,
	) -> Self {
		let mut message = serde_json::json!({
			"role": "assistant",
			"content": text.clone().map(Value::String).unwrap_or(Value::Null),
		});

		if !tool_calls.is_empty() {
			let calls = tool_calls
				.iter()
				.map(|call| {
					serde_json::json!({
						"id": call.id,
						"type": "function",
						"function": {
							"name": call.name,
							"arguments": call.arguments.to_string(),
						},
					})
				})
				.collect::<Vec<_>>();

			message["tool_calls"] = Value::Array(calls);
		}

		Self { text, tool_calls, usage, raw, assistant_items: vec![message] }
	}
}

/// An in-flight exchange with the model, encoded for one [`ApiKind`].
#[derive(Clone, Debug)]
pub struct Conversation {
	api: ApiKind,
	instructions: String,
	items: Vec<Value>,
}
impl Conversation {
	pub fn new(api: ApiKind, instructions: impl Into<String>, user_text: &str) -> Self {
		let mut conversation = Self { api, instructions: instructions.into(), items: Vec::new() };

		conversation.push_user(user_text);

		conversation
	}

	pub fn push_user(&mut self, text: &str) {
		self.items.push(serde_json::json!({ "role": "user", "content": text }));
	}

	pub fn push_assistant_turn(&mut self, turn: &ModelTurn) {
		self.items.extend(turn.assistant_items.iter().cloned());
	}

	pub fn push_tool_output(&mut self, call: &ToolCall, output: &str) {
		let item = match self.api {
			ApiKind::ChatCompletions => serde_json::json!({
				"role": "tool",
				"tool_call_id": call.id,
				"content": output,
			}),
			ApiKind::Responses => serde_json::json!({
				"type": "function_call_output",
				"call_id": call.id,
				"output": output,
			}),
		};

		self.items.push(item);
	}
}

pub struct LlmClient {
	http: Client,
	base_url: String,
	model: String,
	api: ApiKind,
	temperature: f32,
	max_tokens: u32,
}
impl LlmClient {
	pub fn new(proxy: &Proxy, cfg: &Completion) -> Result<Self> {
		let http = Client::builder()
			.timeout(Duration::from_secs(cfg.timeout_secs))
			.build()
			.map_err(|err| Error::Llm {
				kind: UpstreamErrorKind::Other,
				message: format!("Failed to build HTTP client: {err}."),
			})?;
		let api = ApiKind::select(cfg.api, &cfg.model, &cfg.responses_model_patterns);

		Ok(Self {
			http,
			base_url: proxy.base_url(),
			model: cfg.model.clone(),
			api,
			temperature: cfg.temperature,
			max_tokens: cfg.max_tokens,
		})
	}

	pub fn api_kind(&self) -> ApiKind {
		self.api
	}

	pub fn model(&self) -> &str {
		&self.model
	}

	pub fn conversation(&self, instructions: impl Into<String>, user_text: &str) -> Conversation {
		Conversation::new(self.api, instructions, user_text)
	}

	/// One round trip: send the conversation (plus tool bindings) and parse
	/// the model's turn.
	pub async fn complete(
		&self,
		api_token: &str,
		conversation: &Conversation,
		tools: &[ToolSpec],
	) -> Result<ModelTurn> {
		let (url, body) = match self.api {
			ApiKind::ChatCompletions => (
				format!("{}/chat/completions", self.base_url),
				self.chat_body(conversation, tools),
			),
			ApiKind::Responses =>
				(format!("{}/responses", self.base_url), self.responses_body(conversation, tools)),
		};
		let response = self
			.http
			.post(url)
			.headers(auth_headers(api_token)?)
			.json(&body)
			.send()
			.await
			.map_err(|err| Error::Llm {
				kind: UpstreamErrorKind::from_reqwest(&err),
				message: format!("{err}."),
			})?;
		let status = response.status();

		if !status.is_success() {
			return Err(Error::Llm {
				kind: UpstreamErrorKind::from_status(status),
				message: format!("Completion endpoint returned {status}."),
			});
		}

		let json: Value = response.json().await.map_err(|err| Error::Llm {
			kind: UpstreamErrorKind::from_reqwest(&err),
			message: format!("{err}."),
		})?;

		match self.api {
			ApiKind::ChatCompletions => parse_chat_turn(json),
			ApiKind::Responses => parse_responses_turn(json),
		}
	}

	fn chat_body(&self, conversation: &Conversation, tools: &[ToolSpec]) -> Value {
		let mut messages =
			vec![serde_json::json!({ "role": "system", "content": conversation.instructions })];

		messages.extend(conversation.items.iter().cloned());

		let mut body = serde_json::json!({
			"model": self.model,
			"temperature": self.temperature,
			"max_tokens": self.max_tokens,
			"messages": messages,
		});

		if !tools.is_empty() {
			let specs = tools
				.iter()
				.map(|tool| {
					serde_json::json!({
						"type": "function",
						"function": {
							"name": tool.name,
							"description": tool.description,
							"parameters": tool.parameters,
						},
					})
				})
				.collect::<Vec<_>>();

			body["tools"] = Value::Array(specs);
		}

		body
	}

	fn responses_body(&self, conversation: &Conversation, tools: &[ToolSpec]) -> Value {
		let mut body = serde_json::json!({
			"model": self.model,
			"temperature": self.temperature,
			"max_output_tokens": self.max_tokens,
			"instructions": conversation.instructions,
			"input": conversation.items,
		});

		if !tools.is_empty() {
			let specs = tools
				.iter()
				.map(|tool| {
					serde_json::json!({
						"type": "function",
						"name": tool.name,
						"description": tool.description,
						"parameters": tool.parameters,
					})
				})
				.collect::<Vec<_>>();

			body["tools"] = Value::Array(specs);
		}

		body
	}
}

fn parse_chat_turn(json: Value) -> Result<ModelTurn> {
	let message = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.ok_or_else(|| Error::InvalidResponse {
			message: "Chat response is missing choices[0].message.".to_string(),
		})?;
	let text = message
		.get("content")
		.and_then(|v| v.as_str())
		.map(str::trim)
		.filter(|content| !content.is_empty())
		.map(ToString::to_string);
	let mut tool_calls = Vec::new();

	if let Some(calls) = message.get("tool_calls").and_then(|v| v.as_array()) {
		for call in calls {
			let id = call
				.get("id")
				.and_then(|v| v.as_str())
				.ok_or_else(|| Error::InvalidResponse {
					message: "Chat tool call is missing id.".to_string(),
				})?
				.to_string();
			let function = call.get("function").ok_or_else(|| Error::InvalidResponse {
				message: "Chat tool call is missing function.".to_string(),
			})?;
			let name = function
				.get("name")
				.and_then(|v| v.as_str())
				.ok_or_else(|| Error::InvalidResponse {
					message: "Chat tool call is missing function name.".to_string(),
				})?
				.to_string();
			let arguments = parse_tool_arguments(function.get("arguments"))?;

			tool_calls.push(ToolCall { id, name, arguments });
		}
	}

	let usage = parse_usage(json.get("usage"));
	let assistant_items = vec![message.clone()];

	Ok(ModelTurn { text, tool_calls, usage, raw: json, assistant_items })
}

fn parse_responses_turn(json: Value) -> Result<ModelTurn> {
	let output =
		json.get("output").and_then(|v| v.as_array()).ok_or_else(|| Error::InvalidResponse {
			message: "Responses output array is missing.".to_string(),
		})?;
	let mut text_parts = Vec::new();
	let mut tool_calls = Vec::new();

	for item in output {
		match item.get("type").and_then(|v| v.as_str()) {
			Some("message") => {
				let segments = item.get("content").and_then(|v| v.as_array());

				for segment in segments.into_iter().flatten() {
					if segment.get("type").and_then(|v| v.as_str()) == Some("output_text")
						&& let Some(part) = segment.get("text").and_then(|v| v.as_str())
					{
						text_parts.push(part.to_string());
					}
				}
			},
			Some("function_call") => {
				let id = item
					.get("call_id")
					.and_then(|v| v.as_str())
					.ok_or_else(|| Error::InvalidResponse {
						message: "Responses function call is missing call_id.".to_string(),
					})?
					.to_string();
				let name = item
					.get("name")
					.and_then(|v| v.as_str())
					.ok_or_else(|| Error::InvalidResponse {
						message: "Responses function call is missing name.".to_string(),
					})?
					.to_string();
				let arguments = parse_tool_arguments(item.get("arguments"))?;

				tool_calls.push(ToolCall { id, name, arguments });
			},
			_ => {},
		}
	}

	let text = if text_parts.is_empty() { None } else { Some(text_parts.join("\n")) };
	let usage = parse_usage(json.get("usage"));
	let assistant_items = output.clone();

	Ok(ModelTurn { text, tool_calls, usage, raw: json, assistant_items })
}

fn parse_tool_arguments(raw: Option<&Value>) -> Result<Value> {
	let Some(raw) = raw else {
		return Ok(Value::Object(serde_json::Map::new()));
	};

	match raw {
		Value::String(encoded) =>
			serde_json::from_str(encoded).map_err(|_| Error::InvalidResponse {
				message: "Tool call arguments are not valid JSON.".to_string(),
			}),
		Value::Object(_) => Ok(raw.clone()),
		Value::Null => Ok(Value::Object(serde_json::Map::new())),
		_ => Err(Error::InvalidResponse {
			message: "Tool call arguments have an unexpected shape.".to_string(),
		}),
	}
}

/// Read token counters from a `usage` object. Every field may be absent or
/// null independently; both the chat and responses naming schemes are
/// accepted.
pub fn parse_usage(usage: Option<&Value>) -> UsageReport {
	let Some(usage) = usage else {
		return UsageReport::default();
	};
	let field = |names: &[&str]| {
		names.iter().find_map(|name| usage.get(name).and_then(|value| value.as_u64()))
	};

	UsageReport {
		input_tokens: field(&["input_tokens", "prompt_tokens"]),
		output_tokens: field(&["output_tokens", "completion_tokens"]),
		total_tokens: field(&["total_tokens"]),
	}
}
