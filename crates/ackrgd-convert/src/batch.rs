//! Bounded parallel generation across services
//!
//! Services run as tokio tasks gated by a semaphore, under one deadline for
//! the whole batch. The first failure aborts every task still waiting or
//! running; graphs already written stay on disk.

use std::sync::Arc;

use ackrgd_core::ServiceConfig;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::{ConvertError, Result};
use crate::pipeline::{GenerateOptions, ServiceOutput, generate_service};
use crate::render::RenderSource;

/// Generate every service, returning outputs in `configs` order
pub async fn generate_all(
    configs: Vec<ServiceConfig>,
    source: Arc<dyn RenderSource>,
    options: GenerateOptions,
) -> Result<Vec<ServiceOutput>> {
    let total = configs.len();
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let options = Arc::new(options);

    info!(
        count = total,
        concurrency = options.concurrency.max(1),
        "generating services"
    );

    let mut tasks = JoinSet::new();
    for (index, config) in configs.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let source = Arc::clone(&source);
        let options = Arc::clone(&options);

        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| ConvertError::TaskFailed {
                    message: e.to_string(),
                })?;
            let output =
                tokio::task::spawn_blocking(move || generate_service(&config, &*source, &options))
                    .await
                    .map_err(|e| ConvertError::TaskFailed {
                        message: e.to_string(),
                    })??;
            Ok::<_, ConvertError>((index, output))
        });
    }

    let mut outputs: Vec<Option<ServiceOutput>> = vec![None; total];
    let deadline = options.timeout;
    let drained = tokio::time::timeout(deadline, async {
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|e| ConvertError::TaskFailed {
                message: e.to_string(),
            });
            match result.and_then(|r| r) {
                Ok((index, output)) => outputs[index] = Some(output),
                Err(err) => {
                    warn!(error = %err, "service failed, cancelling remaining services");
                    tasks.abort_all();
                    return Err(err);
                }
            }
        }
        Ok(())
    })
    .await;

    match drained {
        Ok(Ok(())) => {}
        Ok(Err(err)) => return Err(err),
        Err(_) => {
            warn!(after = ?deadline, "generation deadline reached");
            tasks.abort_all();
            return Err(ConvertError::Timeout { after: deadline });
        }
    }

    info!(count = total, "all services generated");
    Ok(outputs.into_iter().flatten().collect())
}
