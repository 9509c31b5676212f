//! Bounded webhook queue and its worker.
//!
//! The webhook receiver records each delivery and hands it to this queue so
//! that the provider gets an immediate acknowledgement. The worker drains the
//! queue with bounded concurrency and writes the outcome back onto the
//! delivery row.

use crate::processor::{CallProcessor, WebhookEvent};
use dispatch_db::DbPool;
use dispatch_records::mark_delivery;
use dispatch_types::DeliveryStatus;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};

/// A recorded delivery waiting to be processed.
#[derive(Debug, Clone)]
pub struct QueuedDelivery {
    pub delivery_id: i64,
    pub provider_call_id: String,
    pub event: WebhookEvent,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("webhook queue is full")]
    Full,
    #[error("webhook worker has stopped")]
    Closed,
}

/// Sending half of the webhook queue.
#[derive(Debug, Clone)]
pub struct WebhookQueue {
    tx: mpsc::Sender<QueuedDelivery>,
}

impl WebhookQueue {
    /// Creates a queue holding at most `capacity` pending deliveries.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<QueuedDelivery>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueues without waiting; a full queue is reported, not awaited.
    pub fn try_enqueue(&self, delivery: QueuedDelivery) -> Result<(), QueueError> {
        self.tx.try_send(delivery).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }
}

/// Drains the queue until every sender is dropped, running at most
/// `max_concurrency` deliveries at once.
pub async fn run_worker(
    mut rx: mpsc::Receiver<QueuedDelivery>,
    processor: Arc<CallProcessor>,
    pool: DbPool,
    max_concurrency: usize,
) {
    let max_concurrency = max_concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(max_concurrency));
    tracing::info!(max_concurrency, "starting webhook worker");

    while let Some(delivery) = rx.recv().await {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let processor = processor.clone();
        let pool = pool.clone();
        tokio::spawn(async move {
            process_delivery(&processor, &pool, delivery).await;
            drop(permit);
        });
    }

    tracing::info!("webhook worker stopped");
}

/// Processes one delivery and records its outcome.
pub async fn process_delivery(processor: &CallProcessor, pool: &DbPool, delivery: QueuedDelivery) {
    let event_type = delivery.event.event_type().to_string();
    let outcome = processor
        .handle_event(&delivery.provider_call_id, delivery.event)
        .await;

    let (status, detail) = match &outcome {
        Ok(outcome) => {
            tracing::info!(
                delivery_id = delivery.delivery_id,
                provider_call_id = %delivery.provider_call_id,
                %event_type,
                outcome = outcome.describe(),
                "webhook processed"
            );
            (DeliveryStatus::Processed, outcome.describe().to_string())
        }
        Err(e) => {
            tracing::error!(
                delivery_id = delivery.delivery_id,
                provider_call_id = %delivery.provider_call_id,
                %event_type,
                error = %e,
                "webhook processing failed"
            );
            (DeliveryStatus::Failed, e.to_string())
        }
    };

    let pool = pool.clone();
    let delivery_id = delivery.delivery_id;
    let res = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| e.to_string())?;
        mark_delivery(&conn, delivery_id, status, Some(&detail)).map_err(|e| e.to_string())
    })
    .await;

    match res {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!(delivery_id, "failed to record webhook outcome: {}", e);
        }
        Err(e) => {
            tracing::error!(delivery_id, "webhook outcome task join error: {}", e);
        }
    }
}
