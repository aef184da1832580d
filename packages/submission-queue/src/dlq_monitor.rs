//! C10: DLQ monitor. An independent periodic loop that watches the dead
//! letter queue's depth and fires an alert webhook when it's worth paging
//! someone about, grounded on
//! `original_source/backend/orchestration/dlq_monitor.py::check_dlq_depth`.
//!
//! The original formats a Slack Block Kit payload; this alerts via a
//! plain JSON POST to a configurable webhook so it isn't tied to one
//! provider. Alerting is edge-triggered: it fires the first time depth
//! crosses the threshold and again only if depth has grown since the
//! last alert, so a steady backlog doesn't page on every sweep.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::transport::QueueTransport;

const PEEK_SAMPLE_SIZE: i32 = 10;
const NO_ALERT_SENTINEL: i64 = -1;

pub struct DlqMonitorConfig {
    pub dlq_url: String,
    pub alert_threshold: u32,
    pub check_interval_sec: u64,
    pub alert_webhook_url: Option<String>,
}

pub struct DlqMonitor {
    transport: Arc<dyn QueueTransport>,
    http: reqwest::Client,
    config: DlqMonitorConfig,
    last_alert_depth: AtomicI64,
}

impl DlqMonitor {
    pub fn new(transport: Arc<dyn QueueTransport>, config: DlqMonitorConfig) -> Self {
        Self {
            transport,
            http: reqwest::Client::new(),
            config,
            last_alert_depth: AtomicI64::new(NO_ALERT_SENTINEL),
        }
    }

    pub async fn run(&self) -> ! {
        info!(
            threshold = self.config.alert_threshold,
            interval_sec = self.config.check_interval_sec,
            "starting DLQ monitor"
        );

        loop {
            if let Err(e) = self.check_once().await {
                error!(error = %e, "DLQ depth check failed");
            }
            tokio::time::sleep(Duration::from_secs(self.config.check_interval_sec)).await;
        }
    }

    async fn check_once(&self) -> Result<(), crate::transport::QueueError> {
        let depth = self.transport.depth(&self.config.dlq_url).await?;
        let total = depth.total();

        if total < self.config.alert_threshold as i64 {
            self.last_alert_depth.store(NO_ALERT_SENTINEL, Ordering::SeqCst);
            return Ok(());
        }

        let previous = self.last_alert_depth.load(Ordering::SeqCst);
        if previous != NO_ALERT_SENTINEL && total <= previous {
            info!(depth = total, previous, "DLQ depth at or below last alert, skipping");
            return Ok(());
        }

        let sample = self.transport.peek(&self.config.dlq_url, PEEK_SAMPLE_SIZE).await?;
        warn!(depth = total, threshold = self.config.alert_threshold, sample_size = sample.len(), "DLQ depth over threshold");

        self.send_alert(total, &sample).await;
        self.last_alert_depth.store(total, Ordering::SeqCst);

        Ok(())
    }

    async fn send_alert(&self, depth: i64, sample: &[crate::transport::RawMessage]) {
        let Some(url) = self.config.alert_webhook_url.as_deref() else {
            warn!(depth, "no ALERT_WEBHOOK_URL configured, dropping DLQ alert");
            return;
        };

        let payload = serde_json::json!({
            "queue": self.config.dlq_url,
            "count": depth,
            "threshold": self.config.alert_threshold,
            "sample": sample.iter().map(|m| serde_json::json!({
                "message_id": m.message_id,
                "body": m.body,
            })).collect::<Vec<_>>(),
        });

        match self.http.post(url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(depth, "DLQ alert delivered");
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "DLQ alert webhook returned non-success status");
            }
            Err(e) => {
                error!(error = %e, "failed to deliver DLQ alert");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::transport::{QueueDepth, QueueError, RawMessage};

    struct FakeTransport {
        depths: Mutex<Vec<i64>>,
        peeked: Mutex<usize>,
    }

    #[async_trait]
    impl QueueTransport for FakeTransport {
        async fn receive(
            &self,
            _queue_url: &str,
            _max_messages: i32,
            _wait_seconds: i32,
            _visibility_timeout_seconds: i32,
        ) -> Result<Vec<RawMessage>, QueueError> {
            Ok(Vec::new())
        }

        async fn delete(&self, _queue_url: &str, _receipt_handle: &str) -> Result<(), QueueError> {
            Ok(())
        }

        async fn send(&self, _queue_url: &str, _body: &str, _attributes: HashMap<String, String>) -> Result<String, QueueError> {
            Ok("m1".to_string())
        }

        async fn peek(&self, _queue_url: &str, max_messages: i32) -> Result<Vec<RawMessage>, QueueError> {
            *self.peeked.lock().unwrap() += 1;
            Ok((0..max_messages.min(3))
                .map(|i| RawMessage {
                    message_id: format!("m{i}"),
                    receipt_handle: format!("r{i}"),
                    body: "{}".to_string(),
                    approximate_receive_count: 5,
                })
                .collect())
        }

        async fn depth(&self, _queue_url: &str) -> Result<QueueDepth, QueueError> {
            let mut depths = self.depths.lock().unwrap();
            let value = depths.remove(0);
            Ok(QueueDepth { visible: value, in_flight: 0 })
        }
    }

    fn config(threshold: u32) -> DlqMonitorConfig {
        DlqMonitorConfig {
            dlq_url: "dlq".to_string(),
            alert_threshold: threshold,
            check_interval_sec: 1,
            alert_webhook_url: None,
        }
    }

    #[tokio::test]
    async fn below_threshold_does_not_peek() {
        let transport = Arc::new(FakeTransport { depths: Mutex::new(vec![0]), peeked: Mutex::new(0) });
        let monitor = DlqMonitor::new(transport.clone(), config(5));
        monitor.check_once().await.unwrap();
        assert_eq!(*transport.peeked.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn first_breach_peeks_and_records_depth() {
        let transport = Arc::new(FakeTransport { depths: Mutex::new(vec![7]), peeked: Mutex::new(0) });
        let monitor = DlqMonitor::new(transport.clone(), config(5));
        monitor.check_once().await.unwrap();
        assert_eq!(*transport.peeked.lock().unwrap(), 1);
        assert_eq!(monitor.last_alert_depth.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn repeated_same_depth_does_not_repeek() {
        let transport = Arc::new(FakeTransport { depths: Mutex::new(vec![7, 7]), peeked: Mutex::new(0) });
        let monitor = DlqMonitor::new(transport.clone(), config(5));
        monitor.check_once().await.unwrap();
        monitor.check_once().await.unwrap();
        assert_eq!(*transport.peeked.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn growing_depth_triggers_another_peek() {
        let transport = Arc::new(FakeTransport { depths: Mutex::new(vec![7, 12]), peeked: Mutex::new(0) });
        let monitor = DlqMonitor::new(transport.clone(), config(5));
        monitor.check_once().await.unwrap();
        monitor.check_once().await.unwrap();
        assert_eq!(*transport.peeked.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn dropping_below_threshold_resets_alert_state() {
        let transport = Arc::new(FakeTransport { depths: Mutex::new(vec![7, 0, 7]), peeked: Mutex::new(0) });
        let monitor = DlqMonitor::new(transport.clone(), config(5));
        monitor.check_once().await.unwrap();
        monitor.check_once().await.unwrap();
        monitor.check_once().await.unwrap();
        assert_eq!(*transport.peeked.lock().unwrap(), 2);
    }
}
