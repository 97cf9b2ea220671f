//! Alerting for Vigil.
//!
//! - [`AlertStore`]: bounded in-memory alert list with listeners and auto-dismiss
//! - [`NotificationDispatcher`]: the production [`Notifier`], fanning out to channels
//! - [`channels`]: terminal bell, log file, desktop, and webhook delivery
//! - [`AlertLogger`]: rotated JSON-lines alert log

pub mod channels;
pub mod config;
pub mod dispatcher;
pub mod logger;
pub mod store;
pub mod types;

pub use channels::{Channel, ChannelSettings};
pub use config::NotificationConfig;
pub use dispatcher::NotificationDispatcher;
pub use logger::{AlertLogEntry, AlertLogger};
pub use store::{AlertListener, AlertStore, AlertStoreConfig, Notifier};
pub use types::{Alert, AlertBadge, AlertLevel};
pub use vigil_core::{Result, VigilError};
