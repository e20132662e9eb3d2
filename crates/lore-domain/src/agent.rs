use serde::{Deserialize, Serialize};

use crate::note::RetrievalResult;

/// Structured output of the synthesis agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentAnswer {
	pub answer: String,
	pub reasoning: String,
	#[serde(default)]
	pub cited_file_paths: Vec<String>,
}
impl AgentAnswer {
	/// Cited paths that are not in the candidate set. Empty means the
	/// citation-subset invariant holds.
	pub fn citation_violations(&self, candidates: &RetrievalResult) -> Vec<String> {
		self.cited_file_paths
			.iter()
			.filter(|path| !candidates.contains(path))
			.cloned()
			.collect()
	}

	/// Distinct cited paths in first-seen order.
	pub fn distinct_citations(&self) -> Vec<String> {
		let mut seen = Vec::new();

		for path in &self.cited_file_paths {
			if !seen.contains(path) {
				seen.push(path.clone());
			}
		}

		seen
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeScore {
	Pass,
	NeedsImprovement,
	Fail,
}

/// Output judge verdict over `(original_query, answer, citations)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JudgeVerdict {
	pub score: JudgeScore,
	pub feedback: String,
	pub intent_match_score: f32,
}
impl JudgeVerdict {
	pub fn is_trip(&self) -> bool {
		self.score == JudgeScore::Fail
	}
}

/// Token counters reported by the LLM proxy. Each field is independently
/// unknown; readers must not coerce unknown to zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
	pub input_tokens: Option<u64>,
	pub output_tokens: Option<u64>,
	pub total_tokens: Option<u64>,
}
impl UsageReport {
	pub fn is_unknown(&self) -> bool {
		self.input_tokens.is_none() && self.output_tokens.is_none() && self.total_tokens.is_none()
	}

	/// Fold another report into this one. Known fields add; an unknown field
	/// on either side leaves the known side untouched.
	pub fn accumulate(&mut self, other: &UsageReport) {
		self.input_tokens = add_optional(self.input_tokens, other.input_tokens);
		self.output_tokens = add_optional(self.output_tokens, other.output_tokens);
		self.total_tokens = add_optional(self.total_tokens, other.total_tokens);
	}

	/// Field-wise fallback: keep known fields, fill unknown ones from `other`.
	pub fn or(self, other: UsageReport) -> UsageReport {
		UsageReport {
			input_tokens: self.input_tokens.or(other.input_tokens),
			output_tokens: self.output_tokens.or(other.output_tokens),
			total_tokens: self.total_tokens.or(other.total_tokens),
		}
	}
}

fn add_optional(a: Option<u64>, b: Option<u64>) -> Option<u64> {
	match (a, b) {
		(Some(a), Some(b)) => Some(a.saturating_add(b)),
		(Some(a), None) => Some(a),
		(None, b) => b,
	}
}
