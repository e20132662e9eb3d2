//! The note-query pipeline: guardrails, retrieval, synthesis, judgment, and
//! response assembly behind one service type.
//!
//! Every outbound dependency sits behind a trait object owned by the
//! [`Dependencies`] container, constructed eagerly at startup. Tests build a
//! container from substitute providers and run the full pipeline offline.

pub mod agent;
pub mod assemble;
pub mod guardrails;
pub mod prompts;
pub mod query;
pub mod retrieval;

mod error;

pub use agent::{SynthesisOutcome, ToolInvocation};
pub use assemble::QueryMetadata;
pub use error::{Error, Result};
pub use guardrails::InputDecision;
pub use query::{Query, QueryFailure, QueryOutcome};

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use serde_json::Value;

use lore_config::Config;
use lore_domain::NoteReference;
use lore_providers::{
	ApiKind, Conversation, EmbeddingClient, LlmClient, McpClient, ModelTurn, ToolSpec,
	UpstreamErrorKind,
};
use lore_store::QdrantStore;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(&'a self, api_token: &'a str, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>>;

	fn dimension(&self) -> u32;
}

pub trait CompletionProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		api_token: &'a str,
		conversation: &'a Conversation,
		tools: &'a [ToolSpec],
	) -> BoxFuture<'a, Result<ModelTurn>>;

	fn api_kind(&self) -> ApiKind;

	fn model(&self) -> &str;
}

pub trait VectorSearchProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		top_n: u32,
	) -> BoxFuture<'a, Result<Vec<NoteReference>>>;

	fn collection(&self) -> &str;
}

pub trait XcallbackProvider
where
	Self: Send + Sync,
{
	fn derive<'a>(
		&'a self,
		file_path: &'a str,
		heading: Option<&'a str>,
	) -> BoxFuture<'a, Result<String>>;
}

/// The client managers behind the pipeline stages.
#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub completion: Arc<dyn CompletionProvider>,
	pub search: Arc<dyn VectorSearchProvider>,
	pub xcallback: Arc<dyn XcallbackProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		completion: Arc<dyn CompletionProvider>,
		search: Arc<dyn VectorSearchProvider>,
		xcallback: Arc<dyn XcallbackProvider>,
	) -> Self {
		Self { embedding, completion, search, xcallback }
	}
}

/// Process-lifetime dependency container. All client managers are built
/// eagerly in the constructor; there is no lazy initialization and no
/// module-global state, so substituting providers for tests is a matter of
/// passing a different container.
pub struct Dependencies {
	pub cfg: Config,
	pub providers: Providers,
}
impl Dependencies {
	/// Build the production container. Bootstraps the vector collection as an
	/// idempotent startup side effect.
	pub async fn new(cfg: Config) -> Result<Self> {
		let dimension = cfg.embedding.dimension().ok_or_else(|| Error::Config {
			message: format!("No embedding dimension known for model {:?}.", cfg.embedding.model),
		})?;
		let embedding = EmbeddingClient::new(&cfg.proxy, &cfg.embedding, dimension)?;
		let completion = LlmClient::new(&cfg.proxy, &cfg.completion)?;
		let store = QdrantStore::new(&cfg.retrieval, dimension)?;
		let xcallback = McpClient::new(&cfg.mcp)?;

		store.ensure_collection().await?;

		let providers = Providers::new(
			Arc::new(ProxyEmbedding { client: embedding }),
			Arc::new(ProxyCompletion { client: completion }),
			Arc::new(QdrantSearch { store }),
			Arc::new(McpXcallback { client: xcallback }),
		);

		Ok(Self { cfg, providers })
	}

	/// Build a container from explicit providers. This is the test seam.
	pub fn with_providers(cfg: Config, providers: Providers) -> Self {
		Self { cfg, providers }
	}
}

/// Orchestrates one request through the pipeline state machine.
pub struct QueryService {
	pub deps: Dependencies,
}
impl QueryService {
	pub fn new(deps: Dependencies) -> Self {
		Self { deps }
	}
}

struct ProxyEmbedding {
	client: EmbeddingClient,
}
impl EmbeddingProvider for ProxyEmbedding {
	fn embed<'a>(&'a self, api_token: &'a str, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(self.client.embed(api_token, text).await?) })
	}

	fn dimension(&self) -> u32 {
		self.client.dimension()
	}
}

struct ProxyCompletion {
	client: LlmClient,
}
impl CompletionProvider for ProxyCompletion {
	fn complete<'a>(
		&'a self,
		api_token: &'a str,
		conversation: &'a Conversation,
		tools: &'a [ToolSpec],
	) -> BoxFuture<'a, Result<ModelTurn>> {
		Box::pin(async move { Ok(self.client.complete(api_token, conversation, tools).await?) })
	}

	fn api_kind(&self) -> ApiKind {
		self.client.api_kind()
	}

	fn model(&self) -> &str {
		self.client.model()
	}
}

struct QdrantSearch {
	store: QdrantStore,
}
impl VectorSearchProvider for QdrantSearch {
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		top_n: u32,
	) -> BoxFuture<'a, Result<Vec<NoteReference>>> {
		Box::pin(async move { Ok(self.store.search(vector, top_n).await?) })
	}

	fn collection(&self) -> &str {
		&self.store.collection
	}
}

struct McpXcallback {
	client: McpClient,
}
impl XcallbackProvider for McpXcallback {
	fn derive<'a>(
		&'a self,
		file_path: &'a str,
		heading: Option<&'a str>,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(self.client.derive_xcallback_url(file_path, heading).await?) })
	}
}

/// One completion round trip under the configured per-call deadline. A
/// breach surfaces as the LLM timeout kind, the stage's native error class.
pub(crate) async fn complete_with_timeout(
	completion: &dyn CompletionProvider,
	api_token: &str,
	conversation: &Conversation,
	tools: &[ToolSpec],
	timeout_secs: u64,
) -> Result<ModelTurn> {
	match tokio::time::timeout(
		Duration::from_secs(timeout_secs),
		completion.complete(api_token, conversation, tools),
	)
	.await
	{
		Ok(result) => result,
		Err(_) => Err(Error::Llm {
			kind: UpstreamErrorKind::Timeout,
			message: format!("Completion call exceeded {timeout_secs} seconds."),
		}),
	}
}

/// Pull a JSON object out of model text: tolerate code fences and prose
/// around the object, then parse the outermost `{...}` span.
pub(crate) fn extract_json_object(text: &str) -> Option<Value> {
	let start = text.find('{')?;
	let end = text.rfind('}')?;

	if end < start {
		return None;
	}

	serde_json::from_str(&text[start..=end]).ok()
}
