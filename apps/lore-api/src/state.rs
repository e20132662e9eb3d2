use std::sync::Arc;

use lore_config::Config;
use lore_service::{Dependencies, QueryService};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<QueryService>,
}
impl AppState {
	/// Production state: eagerly builds every client manager and bootstraps
	/// the vector collection.
	pub async fn new(cfg: Config) -> lore_service::Result<Self> {
		let deps = Dependencies::new(cfg).await?;

		Ok(Self { service: Arc::new(QueryService::new(deps)) })
	}

	/// Wrap an already-built service. Tests use this with substitute
	/// providers.
	pub fn from_service(service: QueryService) -> Self {
		Self { service: Arc::new(service) }
	}
}
