//! The report-to-alerts pipeline: parse, map, deliver.

use tracing::{debug, info};

use crate::alert::{Alert, AlertMapper};
use crate::config::{Config, ConfigError, format_duration};
use crate::delivery::{AlertTransport, Delivered, Deliverer, DeliveryError};
use crate::report::{ReportError, parse_junit_file};

/// Any error that ends a run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Parses the configured report and maps its failures to alerts.
pub fn build_alerts(config: &Config) -> Result<Vec<Alert>, Error> {
    let suite = parse_junit_file(&config.junit_file)?;
    debug!(
        "Parsed suite {:?} with {} test cases from {}",
        suite.name,
        suite.test_cases.len(),
        config.junit_file.display()
    );

    let alerts = AlertMapper::from_config(config).map_alerts(&suite);
    info!(
        "{} of {} test cases failed (alerts expire after {})",
        alerts.len(),
        suite.test_cases.len(),
        format_duration(config.expire)
    );

    Ok(alerts)
}

/// Runs the whole pipeline and delivers the alerts through `transport`.
///
/// The alert list is sent even when empty.
pub async fn send_report<T: AlertTransport>(
    config: &Config,
    transport: T,
) -> Result<Delivered, Error> {
    let alerts = build_alerts(config)?;
    let delivered = Deliverer::new(transport)
        .deliver(&alerts, &config.targets)
        .await?;
    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::NamedTempFile;

    use crate::delivery::{TransportError, TransportResponse};

    const REPORT: &str = r#"<testsuite name="e2e">
  <testcase classname="checkout flow" name="adds item"/>
  <testcase classname="checkout flow" name="applies coupon"><failure>flaky</failure><skipped/></testcase>
  <testcase classname="checkout flow" name="pays"><failure>card declined</failure></testcase>
</testsuite>"#;

    /// Accepts everything and keeps the last payload.
    #[derive(Default)]
    struct RecordingTransport {
        payload: Mutex<Option<Vec<u8>>>,
    }

    #[async_trait]
    impl AlertTransport for RecordingTransport {
        async fn post_json(
            &self,
            _url: &str,
            body: &[u8],
        ) -> Result<TransportResponse, TransportError> {
            *self.payload.lock().unwrap() = Some(body.to_vec());
            Ok(TransportResponse {
                status: 200,
                body: String::new(),
            })
        }
    }

    fn report_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn config_for(path: PathBuf) -> Config {
        Config {
            targets: vec!["http://localhost:9093".to_string()],
            junit_file: path,
            alert_name: "shop".to_string(),
            expire: Duration::from_secs(60),
            ..Config::default()
        }
    }

    #[test]
    fn test_build_alerts() {
        let file = report_file(REPORT);
        let alerts = build_alerts(&config_for(file.path().to_path_buf())).unwrap();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].name(), Some("shop-checkout-flow-2"));
    }

    #[test]
    fn test_build_alerts_missing_report() {
        let err = build_alerts(&config_for(PathBuf::from("/nonexistent/junit.xml"))).unwrap_err();
        assert!(matches!(err, Error::Report(ReportError::Read { .. })));
    }

    #[test]
    fn test_build_alerts_malformed_report() {
        let file = report_file("<testsuite><testcase></testsuite>");
        let err = build_alerts(&config_for(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, Error::Report(ReportError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_send_report() {
        let file = report_file(REPORT);
        let transport = RecordingTransport::default();

        let delivered = send_report(&config_for(file.path().to_path_buf()), &transport)
            .await
            .unwrap();

        assert_eq!(delivered.target, "http://localhost:9093");
        assert_eq!(delivered.alert_count, 1);

        let payload = transport.payload.lock().unwrap().clone().unwrap();
        let sent: Vec<Alert> = serde_json::from_slice(&payload).unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].annotations["description"], "card declined");
    }
}
