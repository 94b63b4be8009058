pub mod config;
pub mod connector;
pub mod error;
pub mod health;
pub mod logging;
pub mod scanner;
pub mod source;

pub use config::{Credentials, MetricsOptions, OperatorKind, SourceConfig, CREDENTIALS_PROPERTY};
pub use connector::{DomainConnector, MemoryConnector, ReplayConnector, ScanRequest, Subscription};
pub use error::{SourceError, TeardownError};
pub use health::ConnectionHealth;
pub use logging::{init_logging, LogFormat};
pub use scanner::{DomainScanner, ForwardStats, ScannerContext, ScannerSlot};
pub use source::{MonitorSource, ReloadOutcome, SourceState};
