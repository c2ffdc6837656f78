//! Publication dispatch.
//!
//! A short-period tick that pushes due scheduled publications to their
//! platform. Success records the platform-assigned id and URL; failure
//! stores the error and is final — re-scheduling is a human (or policy)
//! decision, never automatic. Failures are isolated per publication.

use podlink_core::Platform;
use podlink_db::PublicationRow;
use podlink_platforms::PublishContent;

use crate::EngineContext;

/// One dispatch tick over all due publications.
pub async fn run_publication_tick(ctx: &EngineContext) {
    let due = match podlink_db::list_due_publications(&ctx.pool).await {
        Ok(due) => due,
        Err(e) => {
            tracing::error!(error = %e, "publish: failed to list due publications");
            return;
        }
    };

    if due.is_empty() {
        return;
    }

    tracing::info!(count = due.len(), "publish: dispatching due publications");
    for publication in due {
        dispatch_one(ctx, &publication).await;
    }
}

/// Publishes a single record, recording the outcome. Never propagates —
/// one publication's failure must not stop the rest of the batch.
async fn dispatch_one(ctx: &EngineContext, publication: &PublicationRow) {
    let Some(platform) = Platform::parse(&publication.platform) else {
        record_failure(ctx, publication.id, "unknown platform").await;
        return;
    };

    let adapter = match ctx.adapters.get(platform) {
        Ok(adapter) => adapter,
        Err(e) => {
            record_failure(ctx, publication.id, &e.to_string()).await;
            return;
        }
    };

    let token = match ctx.tokens.authorized_token(platform, publication.user_id).await {
        Ok(Some(token)) => token,
        Ok(None) => {
            record_failure(ctx, publication.id, "platform not connected").await;
            return;
        }
        Err(e) => {
            record_failure(ctx, publication.id, &e.to_string()).await;
            return;
        }
    };

    let content = PublishContent {
        title: publication.title.clone(),
        description: publication.description.clone(),
        media_ref: publication.media_ref.clone(),
    };

    match adapter.publish(&token, &content).await {
        Ok(receipt) => {
            match podlink_db::mark_publication_published(
                &ctx.pool,
                publication.id,
                &receipt.platform_content_id,
                &receipt.url,
            )
            .await
            {
                Ok(()) => {
                    tracing::info!(
                        publication_id = publication.id,
                        platform = %platform,
                        url = %receipt.url,
                        "publish: delivered"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        publication_id = publication.id,
                        error = %e,
                        "publish: delivered but status update failed"
                    );
                }
            }
        }
        Err(e) => {
            tracing::warn!(
                publication_id = publication.id,
                platform = %platform,
                error = %e,
                "publish: delivery failed"
            );
            record_failure(ctx, publication.id, &e.to_string()).await;
        }
    }
}

async fn record_failure(ctx: &EngineContext, publication_id: i64, error: &str) {
    if let Err(e) = podlink_db::mark_publication_failed(&ctx.pool, publication_id, error).await {
        tracing::error!(publication_id, error = %e, "publish: failed to record failure");
    }
}
