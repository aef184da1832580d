//! C5: heartbeat emitter, modeled as a scoped resource tying a
//! `tokio::task::JoinHandle` to a guard struct that stops the loop on
//! drop. Acquired on submission start and released on every exit path.
//! Writes immediately on each loop iteration and sleeps after, so a
//! submission that finishes inside one interval still emits a
//! `running` heartbeat before anything tears the loop down.

use std::sync::Arc;
use std::time::Duration;

use submission_db::DataAccess;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

/// Acquired at submission start, released on every exit path (success,
/// failure, or cancellation). Holding it alive keeps the periodic
/// `running` heartbeat going; dropping or calling `finish` writes the
/// final `idle` heartbeat and clears `current_job_id`.
pub struct HeartbeatHandle {
    loop_handle: Option<JoinHandle<()>>,
    dao: Arc<dyn DataAccess>,
    worker_id: String,
    queue_name: String,
}

impl HeartbeatHandle {
    pub fn start(
        dao: Arc<dyn DataAccess>,
        worker_id: impl Into<String>,
        queue_name: impl Into<String>,
        job_id: Uuid,
        directory: impl Into<String>,
    ) -> Self {
        let worker_id = worker_id.into();
        let queue_name = queue_name.into();
        let directory = directory.into();

        let loop_dao = dao.clone();
        let loop_worker_id = worker_id.clone();
        let loop_queue_name = queue_name.clone();
        let loop_handle = tokio::spawn(async move {
            loop {
                if let Err(e) = loop_dao
                    .upsert_worker_heartbeat(
                        &loop_worker_id,
                        &loop_queue_name,
                        "running",
                        Some(job_id),
                        Some(serde_json::json!({"directory": directory})),
                    )
                    .await
                {
                    // Must not block or fail the submission when the write fails.
                    warn!(worker_id = %loop_worker_id, error = %e, "heartbeat write failed");
                }
                tokio::time::sleep(HEARTBEAT_INTERVAL).await;
            }
        });

        Self {
            loop_handle: Some(loop_handle),
            dao,
            worker_id,
            queue_name,
        }
    }

    /// Stop the periodic loop and write the final idle heartbeat.
    /// Idempotent: subsequent calls (or drop) are no-ops.
    pub async fn finish(&mut self) {
        if let Some(handle) = self.loop_handle.take() {
            handle.abort();
        } else {
            return;
        }

        if let Err(e) = self
            .dao
            .upsert_worker_heartbeat(&self.worker_id, &self.queue_name, "idle", None, None)
            .await
        {
            warn!(worker_id = %self.worker_id, error = %e, "final idle heartbeat write failed");
        }
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        let Some(handle) = self.loop_handle.take() else {
            return;
        };
        handle.abort();

        // `finish()` is the normal exit path; this only fires when a
        // caller forgot it (e.g. an early return/panic) and guarantees
        // the final idle heartbeat still lands.
        let dao = self.dao.clone();
        let worker_id = self.worker_id.clone();
        let queue_name = self.queue_name.clone();
        tokio::spawn(async move {
            if let Err(e) = dao
                .upsert_worker_heartbeat(&worker_id, &queue_name, "idle", None, None)
                .await
            {
                warn!(worker_id = %worker_id, error = %e, "final idle heartbeat write failed (drop path)");
            }
        });
    }
}
