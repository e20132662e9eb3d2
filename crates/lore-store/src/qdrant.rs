use std::collections::HashMap;

use qdrant_client::qdrant::{
	CreateCollectionBuilder, Distance, Query, QueryPointsBuilder, ScoredPoint, Value,
	VectorParamsBuilder, value::Kind,
};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{Error, Result};
use lore_config::Retrieval;
use lore_domain::NoteReference;

/// Nearest-neighbour access to the pre-seeded note-file collection.
pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &Retrieval, vector_dim: u32) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url)
			.build()
			.map_err(|err| Error::Qdrant { message: format!("{err}.") })?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim })
	}

	/// Create the collection if it does not exist yet. Safe to call on every
	/// startup; an existing collection is left untouched.
	pub async fn ensure_collection(&self) -> Result<()> {
		let exists = self
			.client
			.collection_exists(&self.collection)
			.await
			.map_err(|err| Error::Qdrant { message: format!("{err}.") })?;

		if exists {
			return Ok(());
		}

		let builder = CreateCollectionBuilder::new(self.collection.clone())
			.vectors_config(VectorParamsBuilder::new(self.vector_dim.into(), Distance::Cosine));

		self.client
			.create_collection(builder)
			.await
			.map_err(|err| Error::Qdrant { message: format!("{err}.") })?;

		tracing::info!(collection = %self.collection, vector_dim = self.vector_dim, "Created Qdrant collection.");

		Ok(())
	}

	/// Nearest-neighbour search over the note-file collection. Malformed
	/// points are skipped with a warning; an empty result is legal.
	pub async fn search(&self, vector: &[f32], top_n: u32) -> Result<Vec<NoteReference>> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::DimensionMismatch {
				collection: self.collection.clone(),
				expected: self.vector_dim,
				actual: vector.len(),
			});
		}

		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector.to_vec()))
			.with_payload(true)
			.limit(top_n as u64);
		let response = self
			.client
			.query(search)
			.await
			.map_err(|err| Error::Qdrant { message: format!("{err}.") })?;
		let mut references = Vec::with_capacity(response.result.len());

		for point in &response.result {
			match point_to_reference(point) {
				Some(reference) => references.push(reference),
				None => {
					tracing::warn!(collection = %self.collection, "Skipping point with incomplete payload.");
				},
			}
		}

		Ok(references)
	}
}

/// Decode a scored point into a note reference. Requires `file_path`; the
/// remaining payload fields degrade gracefully.
pub fn point_to_reference(point: &ScoredPoint) -> Option<NoteReference> {
	let file_path = payload_string(&point.payload, "file_path")?;

	if file_path.trim().is_empty() {
		return None;
	}

	let file_name = payload_string(&point.payload, "file_name")
		.filter(|name| !name.trim().is_empty())
		.unwrap_or_else(|| basename(&file_path));
	let modified_at = payload_rfc3339(&point.payload, "modified_at");
	let size_bytes = payload_u64(&point.payload, "size_bytes").unwrap_or(0);
	// Cosine scores from Qdrant land in [-1, 1]; the reference contract is [0, 1].
	let similarity_score = point.score.clamp(0.0, 1.0);

	Some(NoteReference {
		file_path,
		file_name,
		modified_at,
		similarity_score,
		size_bytes,
		xcallback_url: None,
	})
}

fn basename(file_path: &str) -> String {
	file_path.rsplit('/').next().unwrap_or(file_path).to_string()
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}

fn payload_rfc3339(payload: &HashMap<String, Value>, key: &str) -> Option<OffsetDateTime> {
	let text = payload_string(payload, key)?;

	OffsetDateTime::parse(text.as_str(), &Rfc3339).ok()
}

fn payload_u64(payload: &HashMap<String, Value>, key: &str) -> Option<u64> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::IntegerValue(value)) => u64::try_from(*value).ok(),
		Some(Kind::DoubleValue(value)) =>
			if value.fract() == 0.0 && *value >= 0.0 {
				Some(*value as u64)
			} else {
				None
			},
		_ => None,
	}
}
