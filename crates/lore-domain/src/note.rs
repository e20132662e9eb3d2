use std::{
	cmp::Ordering,
	collections::{HashMap, hash_map::Entry},
};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A note file surfaced by semantic retrieval and eligible for citation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteReference {
	pub file_path: String,
	pub file_name: String,
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub modified_at: Option<OffsetDateTime>,
	pub similarity_score: f32,
	pub size_bytes: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub xcallback_url: Option<String>,
}

/// Ordered retrieval candidates for one query.
///
/// References are unique by `file_path` and sorted by descending similarity
/// with an ascending-path tie break; [`canonicalize_references`] establishes
/// both properties.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
	pub references: Vec<NoteReference>,
	pub query_embedding_dim: u32,
	pub collection_name: String,
}
impl RetrievalResult {
	pub fn empty(query_embedding_dim: u32, collection_name: impl Into<String>) -> Self {
		Self { references: Vec::new(), query_embedding_dim, collection_name: collection_name.into() }
	}

	pub fn find(&self, file_path: &str) -> Option<&NoteReference> {
		self.references.iter().find(|reference| reference.file_path == file_path)
	}

	pub fn contains(&self, file_path: &str) -> bool {
		self.find(file_path).is_some()
	}
}

/// Deduplicate by `file_path` keeping the highest similarity, sort by
/// descending similarity with ascending `file_path` as the tie break, then
/// drop references below the similarity floor when one is configured.
pub fn canonicalize_references(
	references: Vec<NoteReference>,
	similarity_floor: Option<f32>,
) -> Vec<NoteReference> {
	let mut by_path: HashMap<String, NoteReference> = HashMap::with_capacity(references.len());

	for reference in references {
		match by_path.entry(reference.file_path.clone()) {
			Entry::Occupied(mut entry) =>
				if reference.similarity_score > entry.get().similarity_score {
					entry.insert(reference);
				},
			Entry::Vacant(entry) => {
				entry.insert(reference);
			},
		}
	}

	let mut out = by_path.into_values().collect::<Vec<_>>();

	out.sort_by(|a, b| {
		b.similarity_score
			.partial_cmp(&a.similarity_score)
			.unwrap_or(Ordering::Equal)
			.then_with(|| a.file_path.cmp(&b.file_path))
	});

	if let Some(floor) = similarity_floor {
		out.retain(|reference| reference.similarity_score >= floor);
	}

	out
}

/// Identifier of a guardrail as it appears in `guardrails_tripped`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailKind {
	DescribesNoteQuery,
	JudgesAnswerQuality,
}
impl GuardrailKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::DescribesNoteQuery => "describes_note_query",
			Self::JudgesAnswerQuality => "judges_answer_quality",
		}
	}
}

/// The user-facing result of one note query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteQueryResponse {
	pub request_id: String,
	pub answer: String,
	pub reasoning: String,
	pub relevant_files: Vec<NoteReference>,
	pub original_query: String,
	pub query_answered: bool,
	pub guardrails_tripped: Vec<GuardrailKind>,
}
