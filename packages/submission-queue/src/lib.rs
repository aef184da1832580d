//! C8 (queue subscriber), C9 (stale-job monitor), C10 (DLQ monitor).

pub mod aws_sqs;
pub mod dlq_monitor;
pub mod message;
pub mod stale_monitor;
pub mod subscriber;
pub mod transport;

pub use aws_sqs::AwsSqsTransport;
pub use dlq_monitor::{DlqMonitor, DlqMonitorConfig};
pub use message::{parse_and_validate, MessageError, ValidatedJob};
pub use stale_monitor::{StaleJobMonitor, StaleMonitorConfig};
pub use subscriber::{Subscriber, SubscriberConfig};
pub use transport::{QueueDepth, QueueError, QueueTransport, RawMessage};
