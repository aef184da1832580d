//! C8: queue subscriber. Single-threaded long-polling loop that validates
//! messages, dispatches the job flow fire-and-forget, and routes
//! over-retried messages to the DLQ — grounded on
//! `original_source/backend/orchestration/subscriber.py::main_loop`, with
//! the Prefect `run_deployment(..., timeout=0)` fire-and-forget dispatch
//! translated to `tokio::spawn`: the subscriber spawns the job flow and
//! moves on to the next message; C7 itself always awaits its own
//! children, so the fire-and-forget boundary sits here, not there.

use std::collections::HashMap;
use std::sync::Arc;

use submission_core::{Job, JobStatus};
use submission_db::{DataAccess, DbError};
use submission_pipeline::{process_job, JobFlowDeps};
use tracing::{error, info, warn};

use crate::message::{parse_and_validate, MessageError};
use crate::transport::{QueueError, QueueTransport};

pub struct SubscriberConfig {
    pub queue_url: String,
    pub dlq_url: String,
    pub visibility_timeout_sec: i32,
    pub batch_size: i32,
    pub wait_time_sec: i32,
    pub dlq_retry_threshold: u32,
    pub max_consecutive_errors: u32,
}

pub struct Subscriber {
    transport: Arc<dyn QueueTransport>,
    dao: Arc<dyn DataAccess>,
    flow_deps: Arc<JobFlowDeps>,
    config: SubscriberConfig,
}

impl Subscriber {
    pub fn new(
        transport: Arc<dyn QueueTransport>,
        dao: Arc<dyn DataAccess>,
        flow_deps: Arc<JobFlowDeps>,
        config: SubscriberConfig,
    ) -> Self {
        Self { transport, dao, flow_deps, config }
    }

    /// Runs until the consecutive-error circuit breaker trips: the process
    /// is expected to be restarted by its supervisor, so this returns
    /// rather than looping forever on its own.
    pub async fn run(&self) {
        info!(
            queue_url = %self.config.queue_url,
            batch = self.config.batch_size,
            "starting queue subscriber"
        );

        let mut consecutive_errors: u32 = 0;

        loop {
            let received = self
                .transport
                .receive(
                    &self.config.queue_url,
                    self.config.batch_size,
                    self.config.wait_time_sec,
                    self.config.visibility_timeout_sec,
                )
                .await;

            let messages = match received {
                Ok(messages) => {
                    consecutive_errors = 0;
                    messages
                }
                Err(e) => {
                    error!(error = %e, "queue receive failed");
                    consecutive_errors += 1;
                    if consecutive_errors >= self.config.max_consecutive_errors {
                        error!(consecutive_errors, "error threshold reached, stopping subscriber");
                        return;
                    }
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            if messages.is_empty() {
                continue;
            }

            info!(count = messages.len(), "received messages");

            for message in messages {
                if message.approximate_receive_count > self.config.dlq_retry_threshold {
                    warn!(
                        message_id = %message.message_id,
                        receive_count = message.approximate_receive_count,
                        "message exceeded retry limit, routing to DLQ"
                    );
                    self.route_to_dlq(
                        &message.body,
                        &message.message_id,
                        &format!("exceeded_retry_limit_{}", message.approximate_receive_count),
                    )
                    .await;
                    self.delete(&message.receipt_handle).await;
                    continue;
                }

                match self.dispatch(&message.body, &message.message_id).await {
                    Ok(()) => {
                        self.delete(&message.receipt_handle).await;
                        consecutive_errors = 0;
                    }
                    Err(e) => {
                        warn!(error = %e, message_id = %message.message_id, "dispatch failed, leaving for redelivery");
                        consecutive_errors += 1;
                    }
                }
            }

            if consecutive_errors >= self.config.max_consecutive_errors {
                error!(consecutive_errors, "error threshold reached, stopping subscriber");
                return;
            }
        }
    }

    async fn delete(&self, receipt_handle: &str) {
        if let Err(e) = self.transport.delete(&self.config.queue_url, receipt_handle).await {
            warn!(error = %e, "failed to delete message from queue");
        }
    }

    async fn route_to_dlq(&self, body: &str, original_message_id: &str, reason: &str) {
        let mut value: serde_json::Value =
            serde_json::from_str(body).unwrap_or_else(|_| serde_json::json!({"_unparsable_body": body}));
        if let Some(obj) = value.as_object_mut() {
            obj.insert("_dlq_reason".to_string(), serde_json::json!(reason));
            obj.insert(
                "_original_message_id".to_string(),
                serde_json::json!(original_message_id),
            );
        }

        if let Err(e) = self
            .transport
            .send(&self.config.dlq_url, &value.to_string(), HashMap::new())
            .await
        {
            error!(error = %e, "failed to route message to DLQ");
        }
    }

    /// Validates, ensures the job row exists, and fire-and-forgets the job
    /// flow. Returns `Err` only for failures that should keep the message
    /// in the queue for redelivery; a malformed body is intentionally NOT
    /// retried here — it is dropped by the caller never deleting it,
    /// which lets it redeliver until it crosses the DLQ threshold.
    async fn dispatch(&self, body: &str, message_id: &str) -> Result<(), DispatchError> {
        let validated = match parse_and_validate(body) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, message_id, "message failed validation, will redeliver toward DLQ");
                return Err(DispatchError::Validation(e));
            }
        };

        let job_id: uuid::Uuid = validated
            .job_id
            .parse()
            .map_err(|_| DispatchError::Validation(MessageError::MissingJobId))?;

        match self.dao.get_job(job_id).await {
            Ok(_) => {}
            Err(DbError::JobNotFound(_)) => {
                let job = Job::builder()
                    .id(job_id)
                    .customer_id(validated.customer_id.clone())
                    .package_size(validated.package_size)
                    .priority(validated.priority)
                    .status(JobStatus::Pending)
                    .build();
                self.dao.insert_job(job).await.map_err(DispatchError::Db)?;
            }
            Err(e) => return Err(DispatchError::Db(e)),
        }

        let _ = self
            .dao
            .record_history(
                job_id,
                None,
                "queue_claimed",
                Some(serde_json::json!({"message_id": message_id})),
                None,
            )
            .await;

        let flow_deps = self.flow_deps.clone();
        let priority = validated.priority;
        tokio::spawn(async move {
            process_job(&flow_deps, job_id, priority).await;
        });

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
enum DispatchError {
    #[error("validation failed: {0}")]
    Validation(#[from] MessageError),
    #[error(transparent)]
    Db(#[from] DbError),
}
