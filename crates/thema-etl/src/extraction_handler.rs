//! ExtractionHandler — dispatches upload → extract → chunk → embed pipeline.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use matric_core::{ExtractionStrategy, JobType};

use crate::extraction::ExtractionRegistry;
use crate::handler::{JobContext, JobHandler, JobResult};

pub struct ExtractionHandler {
    registry: Arc<ExtractionRegistry>,
}

impl ExtractionHandler {
    pub fn new(registry: Arc<ExtractionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl JobHandler for ExtractionHandler {
    fn job_type(&self) -> JobType {
        JobType::Extraction
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        // Parse payload: { strategy, filename, mime_type, data, config }
        let payload = match ctx.payload() {
            Some(p) => p.clone(),
            None => return JobResult::Failed("Missing extraction job payload".into()),
        };

        let strategy_str = payload
            .get("strategy")
            .and_then(|v| v.as_str())
            .unwrap_or("text_native");
        let strategy: ExtractionStrategy = match strategy_str.parse() {
            Ok(s) => s,
            Err(e) => return JobResult::Failed(format!("Invalid extraction strategy: {}", e)),
        };

        let filename = payload
            .get("filename")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        let mime_type = payload
            .get("mime_type")
            .and_then(|v| v.as_str())
            .unwrap_or("application/octet-stream");
        let config = payload.get("config").cloned().unwrap_or_else(|| json!({}));

        // Get data from payload
        let data = if let Some(data_str) = payload.get("data").and_then(|v| v.as_str()) {
            data_str.as_bytes().to_vec()
        } else {
            return JobResult::Failed(
                "No data provided in payload (expected 'data' field with string content)".into(),
            );
        };

        ctx.report_progress(10, Some("Starting extraction"));

        // Check adapter availability
        if !self.registry.has_adapter(strategy) {
            return JobResult::Failed(format!(
                "No adapter registered for strategy: {:?}",
                strategy
            ));
        }

        ctx.report_progress(20, Some("Extracting content"));

        // Run extraction
        match self
            .registry
            .extract(strategy, &data, filename, mime_type, &config)
            .await
        {
            Ok(result) => {
                ctx.report_progress(80, Some("Extraction complete"));

                let result_json = json!({
                    "strategy": strategy.to_string(),
                    "has_text": result.extracted_text.is_some(),
                    "text_length": result.extracted_text.as_ref().map(|t| t.len()).unwrap_or(0),
                    "has_description": result.ai_description.is_some(),
                    "metadata": result.metadata,
                });

                info!(
                    strategy = %strategy,
                    filename,
                    text_len = result.extracted_text.as_ref().map(|t| t.len()).unwrap_or(0),
                    "Extraction completed successfully"
                );

                ctx.report_progress(100, Some("Done"));
                JobResult::Success(Some(result_json))
            }
            Err(e) => {
                error!(strategy = %strategy, filename, error = %e, "Extraction failed");
                JobResult::Failed(format!("Extraction failed: {}", e))
            }
        }
    }
}
