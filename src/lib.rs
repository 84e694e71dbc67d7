//! junit2alertmanager: raise Alertmanager alerts for failing tests.
//!
//! Reads a JUnit XML report, turns every failed (and not skipped) test case
//! into an alert, and posts the alerts to the first Alertmanager in a list of
//! redundant targets that accepts them.
//!
//! # Architecture
//!
//! - **Report**: parse the JUnit XML into a [`TestSuite`]
//! - **Alert**: map failed cases to [`Alert`] records
//! - **Delivery**: post the alerts with fallback across targets
//! - **Pipeline**: tie the three together for one [`Config`]
//!
//! # Example
//!
//! ```no_run
//! use junit2alertmanager::build_info::BuildInfo;
//! use junit2alertmanager::config::Config;
//! use junit2alertmanager::delivery::{HttpTransport, TlsPolicy};
//! use junit2alertmanager::pipeline::send_report;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config {
//!         targets: vec!["http://localhost:9093".to_string()],
//!         ..Config::default()
//!     }
//!     .validated()?;
//!     let transport = HttpTransport::new(TlsPolicy::Verify, BuildInfo::CURRENT)?;
//!     send_report(&config, transport).await?;
//!     Ok(())
//! }
//! ```

pub mod alert;
pub mod build_info;
pub mod config;
pub mod delivery;
pub mod pipeline;
pub mod report;

// Re-export commonly used types
pub use alert::{Alert, AlertMapper};
pub use config::{Config, load_config};
pub use delivery::{AlertTransport, Delivered, Deliverer, DeliveryError, HttpTransport};
pub use pipeline::{Error, build_alerts, send_report};
pub use report::{TestCase, TestSuite, parse_junit_file};
