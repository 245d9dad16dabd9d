use sqlx::SqlitePool;
use std::sync::Arc;

use super::flash::FlashSigner;
use crate::aws::AwsContext;
use crate::llm::{self, LanguageModel, LlmError, LlmSettings, UnavailableModel};
use crate::processor::NewsProcessor;
use crate::scheduler::SchedulerHandle;
use crate::store::ConfigRepository;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub processor: Arc<NewsProcessor>,
    pub scheduler: SchedulerHandle,
    pub aws: Arc<AwsContext>,
    pub flash: FlashSigner,
    /// Page title override from the config file.
    pub header: Option<String>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        processor: Arc<NewsProcessor>,
        scheduler: SchedulerHandle,
        aws: Arc<AwsContext>,
        secret_key: &str,
        header: Option<String>,
    ) -> Self {
        Self {
            db,
            processor,
            scheduler,
            aws,
            flash: FlashSigner::new(secret_key),
            header,
        }
    }

    /// Rebuild the model from stored settings and hand it to the processor.
    pub async fn reload_model(&self) -> Result<(), LlmError> {
        let (model, result) = model_from_store(&self.db, &self.aws).await;
        self.processor.set_model(model);
        result
    }
}

/// Model described by `system_config`; an [`UnavailableModel`] carries the
/// error when the backend cannot be built.
pub async fn model_from_store(
    db: &SqlitePool,
    aws: &AwsContext,
) -> (Arc<dyn LanguageModel>, Result<(), LlmError>) {
    let values = match ConfigRepository::all(db).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Could not read LLM settings, using defaults: {}", e);
            Default::default()
        }
    };
    let settings = LlmSettings::from_config(&values);
    match llm::build_model(&settings, aws) {
        Ok(model) => (model, Ok(())),
        Err(e) => {
            tracing::error!("Failed to initialise LLM: {}", e);
            let model: Arc<dyn LanguageModel> =
                Arc::new(UnavailableModel::new(settings.model.clone(), e.to_string()));
            (model, Err(e))
        }
    }
}
