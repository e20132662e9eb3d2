pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Classification of an upstream HTTP failure, shared by every outbound
/// client. The service layer reasons only about these kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpstreamErrorKind {
	RateLimit,
	Auth,
	Timeout,
	Connection,
	Other,
}
impl UpstreamErrorKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::RateLimit => "rate_limit",
			Self::Auth => "auth",
			Self::Timeout => "timeout",
			Self::Connection => "connection",
			Self::Other => "other",
		}
	}

	/// Failures worth a capped retry at the service layer.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::RateLimit | Self::Timeout | Self::Connection)
	}

	pub fn from_status(status: reqwest::StatusCode) -> Self {
		match status.as_u16() {
			429 => Self::RateLimit,
			401 | 403 => Self::Auth,
			_ => Self::Other,
		}
	}

	pub fn from_reqwest(err: &reqwest::Error) -> Self {
		if err.is_timeout() {
			return Self::Timeout;
		}
		if err.is_connect() {
			return Self::Connection;
		}
		if let Some(status) = err.status() {
			return Self::from_status(status);
		}

		Self::Other
	}
}
impl std::fmt::Display for UpstreamErrorKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Embedding request failed ({kind}): {message}")]
	Embedding { kind: UpstreamErrorKind, message: String },
	#[error("Embedding vector has dimension {actual}, expected {expected}.")]
	EmbeddingDimension { expected: u32, actual: usize },
	#[error("LLM request failed ({kind}): {message}")]
	Llm { kind: UpstreamErrorKind, message: String },
	#[error("MCP request failed: {message}")]
	Mcp { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
	#[error("Invalid header value: {message}")]
	InvalidHeader { message: String },
}
impl Error {
	pub fn llm_kind(&self) -> Option<UpstreamErrorKind> {
		match self {
			Self::Llm { kind, .. } => Some(*kind),
			_ => None,
		}
	}
}
