use lore_providers::UpstreamErrorKind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure taxonomy of the query pipeline. Raw upstream failures are
/// translated into these kinds at component boundaries; the state machine
/// and the HTTP layer reason only about kinds.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Configuration error: {message}")]
	Config { message: String },
	#[error("Embedding error: {message}")]
	Embedding { message: String, transient: bool },
	#[error("Vector store error: {message}")]
	VectorStore { message: String },
	#[error("LLM error ({kind}): {message}")]
	Llm { kind: UpstreamErrorKind, message: String },
	#[error("Agent output error: {message}")]
	AgentOutput { message: String },
	#[error("MCP error: {message}")]
	Mcp { message: String },
	#[error("Request deadline of {secs} seconds elapsed.")]
	Cancelled { secs: u64 },
}
impl Error {
	/// Stable outward kind label for structured error responses.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Config { .. } => "config",
			Self::Embedding { .. } => "embedding",
			Self::VectorStore { .. } => "vector_store",
			Self::Llm { kind, .. } => kind.as_str(),
			Self::AgentOutput { .. } => "agent_output",
			Self::Mcp { .. } => "mcp",
			Self::Cancelled { .. } => "cancelled",
		}
	}

	pub fn is_transient_embedding(&self) -> bool {
		matches!(self, Self::Embedding { transient: true, .. })
	}
}

impl From<lore_providers::Error> for Error {
	fn from(err: lore_providers::Error) -> Self {
		match err {
			lore_providers::Error::Embedding { kind, message } =>
				Self::Embedding { message, transient: kind.is_transient() },
			lore_providers::Error::EmbeddingDimension { .. } =>
				Self::Embedding { message: err.to_string(), transient: false },
			lore_providers::Error::Llm { kind, message } => Self::Llm { kind, message },
			lore_providers::Error::Mcp { message } => Self::Mcp { message },
			lore_providers::Error::InvalidResponse { message } =>
				Self::Llm { kind: UpstreamErrorKind::Other, message },
			// The embedding client wraps header failures itself, so this
			// only escapes from the completion client.
			lore_providers::Error::InvalidHeader { message } =>
				Self::Llm { kind: UpstreamErrorKind::Auth, message },
		}
	}
}

impl From<lore_store::Error> for Error {
	fn from(err: lore_store::Error) -> Self {
		Self::VectorStore { message: err.to_string() }
	}
}
