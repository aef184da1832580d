//! C4 (submission executor) and C5 (heartbeat emitter).

pub mod driver;
pub mod executor;
pub mod heartbeat;

pub use driver::{BrowserDriver, DriverError, PageSnapshot, UnconfiguredDriver};
pub use executor::{Outcome, SubmissionExecutor};
pub use heartbeat::HeartbeatHandle;
