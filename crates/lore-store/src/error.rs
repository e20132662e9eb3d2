pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Qdrant error: {message}")]
	Qdrant { message: String },
	#[error(
		"Query vector has dimension {actual}, but collection {collection:?} expects {expected}."
	)]
	DimensionMismatch { collection: String, expected: u32, actual: usize },
}
