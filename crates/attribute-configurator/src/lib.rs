use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, warn};

use matter_client::{Connector, CoordinationClient};
use types::{AttributeValue, ConfigurationRequest};

#[derive(Debug, Clone)]
pub struct ConfiguratorConfig {
    /// Grace period between the write and the verification read.
    pub settle_delay: Duration,
}

impl Default for ConfiguratorConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
        }
    }
}

/// Why a configuration run could not be completed or verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("connection error")]
    Connection,
    #[error("write error")]
    Write,
    #[error("verification read returned no value")]
    VerificationReadEmpty,
    #[error("verification read failed")]
    VerificationReadFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationResult {
    Success {
        value: AttributeValue,
    },
    /// The write was accepted but the device reports something else; it may
    /// have clamped, rounded or silently rejected the value.
    VerificationMismatch {
        expected: i64,
        observed: AttributeValue,
    },
    Failure(FailureReason),
}

impl ConfigurationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Runs connect, read, write, settle, verify and compare for one request.
pub struct AttributeConfigurator<C> {
    connector: C,
    config: ConfiguratorConfig,
}

impl<C: Connector> AttributeConfigurator<C> {
    pub fn new(connector: C, config: ConfiguratorConfig) -> Self {
        Self { connector, config }
    }

    /// Client errors never escape: they are logged and folded into the result.
    ///
    /// The connection is closed before returning. If the future is dropped
    /// instead (user interrupt), dropping the client releases it.
    pub async fn configure(&self, request: &ConfigurationRequest) -> ConfigurationResult {
        info!(url = %request.server_url, "connecting to matter server");
        let client = match self.connector.connect(&request.server_url).await {
            Ok(client) => client,
            Err(err) => {
                error!(url = %request.server_url, error = %err, "matter server connect failed");
                return ConfigurationResult::Failure(FailureReason::Connection);
            }
        };
        info!(node_id = request.node_id, "connected to matter server");

        let result = self.run(&client, request).await;
        client.close().await;
        result
    }

    async fn run(
        &self,
        client: &C::Client,
        request: &ConfigurationRequest,
    ) -> ConfigurationResult {
        let node_id = request.node_id;
        let path = &request.path;

        info!(node_id, %path, "reading current attribute value");
        match client.read_attribute(node_id, path).await {
            Ok(Some(value)) => info!(node_id, %path, %value, "current attribute value"),
            Ok(None) => warn!(
                node_id,
                %path,
                "could not read current attribute value, proceeding anyway"
            ),
            Err(err) => warn!(
                node_id,
                %path,
                error = %err,
                "attribute read failed, proceeding anyway"
            ),
        }

        info!(node_id, %path, value = request.desired_value, "writing attribute");
        if let Err(err) = client
            .write_attribute(node_id, path, request.desired_value)
            .await
        {
            error!(node_id, %path, error = %err, "attribute write failed");
            return ConfigurationResult::Failure(FailureReason::Write);
        }
        info!(node_id, %path, value = request.desired_value, "attribute write accepted");

        info!(
            delay_ms = self.config.settle_delay.as_millis(),
            "waiting before verification read"
        );
        sleep(self.config.settle_delay).await;

        let observed = match client.read_attribute(node_id, path).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                warn!(node_id, %path, "verification read returned no value");
                return ConfigurationResult::Failure(FailureReason::VerificationReadEmpty);
            }
            Err(err) => {
                warn!(node_id, %path, error = %err, "verification read failed");
                return ConfigurationResult::Failure(FailureReason::VerificationReadFailed);
            }
        };

        if reads_as(&observed, request.desired_value) {
            info!(node_id, %path, value = %observed, "attribute configured");
            ConfigurationResult::Success { value: observed }
        } else {
            warn!(
                node_id,
                %path,
                expected = request.desired_value,
                observed = %observed,
                "attribute was set but shows unexpected value"
            );
            ConfigurationResult::VerificationMismatch {
                expected: request.desired_value,
                observed,
            }
        }
    }
}

/// Numeric equality: `30.0` and `30` match, and a boolean reads as 0 or 1.
fn reads_as(observed: &AttributeValue, desired: i64) -> bool {
    if let Some(value) = observed.as_i64() {
        return value == desired;
    }
    if let Some(value) = observed.as_u64() {
        return i64::try_from(value).map_or(false, |value| value == desired);
    }
    if let Some(value) = observed.as_f64() {
        return value == desired as f64;
    }
    observed.as_bool().map_or(false, |value| i64::from(value) == desired)
}

#[cfg(test)]
mod tests {
    use super::{
        reads_as, AttributeConfigurator, ConfigurationResult, ConfiguratorConfig, FailureReason,
    };
    use async_trait::async_trait;
    use matter_client::{ClientError, Connector, CoordinationClient};
    use serde_json::{json, Value};
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;
    use types::{AttributePath, AttributeValue, ConfigurationRequest};

    type ReadQueue = VecDeque<Result<Option<Value>, ClientError>>;

    /// Attribute store keyed by path string. Scripted read results, when
    /// queued, take precedence over the stored state.
    #[derive(Clone, Default)]
    struct MockClient {
        attributes: Arc<Mutex<HashMap<String, Value>>>,
        scripted_reads: Arc<Mutex<ReadQueue>>,
        fail_writes: bool,
        reads: Arc<AtomicUsize>,
        writes: Arc<AtomicUsize>,
        closed: Arc<AtomicBool>,
    }

    impl MockClient {
        fn with_attribute(path: &str, value: Value) -> Self {
            let client = Self::default();
            client
                .attributes
                .lock()
                .unwrap()
                .insert(path.to_string(), value);
            client
        }

        fn script_reads(self, reads: Vec<Result<Option<Value>, ClientError>>) -> Self {
            *self.scripted_reads.lock().unwrap() = reads.into();
            self
        }

        fn read_count(&self) -> usize {
            self.reads.load(Ordering::Relaxed)
        }

        fn write_count(&self) -> usize {
            self.writes.load(Ordering::Relaxed)
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl CoordinationClient for MockClient {
        async fn read_attribute(
            &self,
            _node_id: u64,
            path: &AttributePath,
        ) -> Result<Option<AttributeValue>, ClientError> {
            self.reads.fetch_add(1, Ordering::Relaxed);
            if let Some(scripted) = self.scripted_reads.lock().unwrap().pop_front() {
                return scripted;
            }
            Ok(self
                .attributes
                .lock()
                .unwrap()
                .get(&path.to_string())
                .cloned())
        }

        async fn write_attribute(
            &self,
            _node_id: u64,
            path: &AttributePath,
            value: i64,
        ) -> Result<(), ClientError> {
            self.writes.fetch_add(1, Ordering::Relaxed);
            if self.fail_writes {
                return Err(ClientError::Server {
                    code: 0,
                    details: "write failed".to_string(),
                });
            }
            self.attributes
                .lock()
                .unwrap()
                .insert(path.to_string(), json!(value));
            Ok(())
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::Relaxed);
        }
    }

    struct MockConnector {
        client: Option<MockClient>,
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Client = MockClient;

        async fn connect(&self, _server_url: &str) -> Result<MockClient, ClientError> {
            self.client.clone().ok_or(ClientError::ConnectionClosed)
        }
    }

    fn request(value: i64) -> ConfigurationRequest {
        ConfigurationRequest::new(
            3,
            AttributePath::new(1, 1030, 3),
            value,
            "ws://localhost:5580/ws",
        )
    }

    fn configurator(client: &MockClient) -> AttributeConfigurator<MockConnector> {
        AttributeConfigurator::new(
            MockConnector {
                client: Some(client.clone()),
            },
            ConfiguratorConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn write_then_verify_succeeds() {
        let client = MockClient::with_attribute("1/1030/3", json!(20));

        let result = configurator(&client).configure(&request(30)).await;

        assert_eq!(result, ConfigurationResult::Success { value: json!(30) });
        assert_eq!(client.read_count(), 2);
        assert_eq!(client.write_count(), 1);
        assert!(client.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn verification_waits_for_settle_delay() {
        let client = MockClient::with_attribute("1/1030/3", json!(20));
        let started = Instant::now();

        let result = configurator(&client).configure(&request(30)).await;

        assert!(result.is_success());
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn different_readback_is_a_mismatch() {
        let client = MockClient::with_attribute("1/1030/3", json!(20))
            .script_reads(vec![Ok(Some(json!(20))), Ok(Some(json!(25)))]);

        let result = configurator(&client).configure(&request(30)).await;

        assert_eq!(
            result,
            ConfigurationResult::VerificationMismatch {
                expected: 30,
                observed: json!(25),
            }
        );
        assert!(!result.is_success());
        assert_eq!(client.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn write_failure_skips_verification() {
        let mut client = MockClient::with_attribute("1/1030/3", json!(20));
        client.fail_writes = true;

        let result = configurator(&client).configure(&request(30)).await;

        assert_eq!(result, ConfigurationResult::Failure(FailureReason::Write));
        assert_eq!(client.read_count(), 1);
        assert!(client.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_baseline_is_not_fatal() {
        let client = MockClient::default();

        let result = configurator(&client).configure(&request(30)).await;

        assert_eq!(result, ConfigurationResult::Success { value: json!(30) });
        assert_eq!(client.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_baseline_read_is_not_fatal() {
        let client = MockClient::default().script_reads(vec![Err(ClientError::Timeout {
            timeout_ms: 1_000,
        })]);

        let result = configurator(&client).configure(&request(30)).await;

        assert!(result.is_success());
        assert_eq!(client.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_verification_read_fails() {
        let client = MockClient::with_attribute("1/1030/3", json!(20))
            .script_reads(vec![Ok(Some(json!(20))), Ok(None)]);

        let result = configurator(&client).configure(&request(30)).await;

        assert_eq!(
            result,
            ConfigurationResult::Failure(FailureReason::VerificationReadEmpty)
        );
        assert_eq!(
            FailureReason::VerificationReadEmpty.to_string(),
            "verification read returned no value"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn erroring_verification_read_fails() {
        let client = MockClient::with_attribute("1/1030/3", json!(20))
            .script_reads(vec![Ok(Some(json!(20))), Err(ClientError::ConnectionClosed)]);

        let result = configurator(&client).configure(&request(30)).await;

        assert_eq!(
            result,
            ConfigurationResult::Failure(FailureReason::VerificationReadFailed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_request_verifies_both_times() {
        let client = MockClient::with_attribute("1/1030/3", json!(30));
        let configurator = configurator(&client);

        let first = configurator.configure(&request(30)).await;
        let second = configurator.configure(&request(30)).await;

        assert_eq!(first, ConfigurationResult::Success { value: json!(30) });
        assert_eq!(second, ConfigurationResult::Success { value: json!(30) });
        assert_eq!(client.write_count(), 2);
    }

    #[tokio::test]
    async fn connect_failure_is_reported() {
        let configurator = AttributeConfigurator::new(
            MockConnector { client: None },
            ConfiguratorConfig::default(),
        );

        let result = configurator.configure(&request(30)).await;

        assert_eq!(result, ConfigurationResult::Failure(FailureReason::Connection));
        assert_eq!(FailureReason::Connection.to_string(), "connection error");
    }

    #[tokio::test(start_paused = true)]
    async fn non_integer_readback_is_a_mismatch() {
        let client = MockClient::default()
            .script_reads(vec![Ok(None), Ok(Some(json!("thirty")))]);

        let result = configurator(&client).configure(&request(30)).await;

        assert!(matches!(
            result,
            ConfigurationResult::VerificationMismatch { expected: 30, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn float_readback_of_same_number_verifies() {
        let client = MockClient::default()
            .script_reads(vec![Ok(Some(json!(20.0))), Ok(Some(json!(30.0)))]);

        let result = configurator(&client).configure(&request(30)).await;

        assert_eq!(result, ConfigurationResult::Success { value: json!(30.0) });
    }

    #[test]
    fn readback_compares_numerically() {
        assert!(reads_as(&json!(30), 30));
        assert!(reads_as(&json!(30.0), 30));
        assert!(reads_as(&json!(-5), -5));
        assert!(reads_as(&json!(true), 1));
        assert!(reads_as(&json!(false), 0));
        assert!(!reads_as(&json!(30.5), 30));
        assert!(!reads_as(&json!(u64::MAX), -1));
        assert!(!reads_as(&json!("30"), 30));
        assert!(!reads_as(&Value::Null, 0));
    }
}
