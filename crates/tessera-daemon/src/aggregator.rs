// crates/tessera-daemon/src/aggregator.rs
//
// HttpAggregatorTarget: reporting sink that publishes local trust to the
// configured aggregator endpoints over the HTTP relay.
//
// Records of one run are buffered (a later record for the same peer replaces
// the earlier one) and sent as a single `reputation/local_trust` request per
// aggregator when the writer is closed.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tessera_core::{Epoch, PeerId, TesseraError, Trust, TrustValue};
use tessera_reputation::{ReportContext, Target, Writer};

/// JSON-RPC method name of a local trust report.
pub const LOCAL_TRUST_METHOD: &str = "reputation/local_trust";

/// Params of a `reputation/local_trust` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalTrustReport {
    pub epoch: Epoch,
    /// Public key of the reporting node.
    pub reporter: PeerId,
    /// Trust records ordered by peer.
    pub trusts: Vec<Trust>,
}

impl LocalTrustReport {
    fn new(epoch: Epoch, reporter: PeerId, buffered: &HashMap<PeerId, TrustValue>) -> Self {
        let mut trusts: Vec<Trust> = buffered
            .iter()
            .map(|(peer, value)| Trust::new(*peer, *value))
            .collect();
        trusts.sort_by(|a, b| a.peer().cmp(b.peer()));
        Self {
            epoch,
            reporter,
            trusts,
        }
    }

    /// Full request body.
    pub fn to_request(&self) -> serde_json::Value {
        serde_json::json!({
            "method": LOCAL_TRUST_METHOD,
            "params": self,
        })
    }
}

/// Sends each epoch's local trust to every configured aggregator.
#[derive(Debug, Clone)]
pub struct HttpAggregatorTarget {
    reporter: PeerId,
    urls: Vec<String>,
    /// Shared reqwest client for all outbound HTTP calls.
    client: reqwest::Client,
}

impl HttpAggregatorTarget {
    pub fn new(reporter: PeerId, urls: Vec<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            reporter,
            urls,
            client,
        }
    }

    /// Return the list of configured aggregator URLs.
    #[allow(dead_code)]
    pub fn urls(&self) -> &[String] {
        &self.urls
    }
}

#[async_trait]
impl Target for HttpAggregatorTarget {
    async fn init_writer(&self, ctx: &ReportContext) -> Result<Box<dyn Writer>, TesseraError> {
        Ok(Box::new(AggregatorWriter {
            epoch: ctx.epoch(),
            target: self.clone(),
            buffered: HashMap::new(),
        }))
    }
}

struct AggregatorWriter {
    epoch: Epoch,
    target: HttpAggregatorTarget,
    buffered: HashMap<PeerId, TrustValue>,
}

impl AggregatorWriter {
    async fn post(&self, url: &str, body: &serde_json::Value) -> Result<(), String> {
        let resp = self
            .target
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(format!("status {}", resp.status()))
        }
    }
}

#[async_trait]
impl Writer for AggregatorWriter {
    async fn write(&mut self, trust: Trust) -> Result<(), TesseraError> {
        self.buffered.insert(*trust.peer(), trust.value());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TesseraError> {
        if self.target.urls.is_empty() {
            tracing::debug!(epoch = self.epoch, "No aggregators configured, report not sent");
            return Ok(());
        }

        let report = LocalTrustReport::new(self.epoch, self.target.reporter, &self.buffered);
        let body = report.to_request();

        let mut failures = Vec::new();
        for url in &self.target.urls {
            match self.post(url, &body).await {
                Ok(()) => {
                    tracing::info!(
                        epoch = self.epoch,
                        trusts = report.trusts.len(),
                        "Sent local trust to aggregator {}",
                        url
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        epoch = self.epoch,
                        "Failed to send local trust to aggregator {}: {}",
                        url,
                        e
                    );
                    failures.push(format!("{}: {}", url, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(TesseraError::Sink(format!(
                "{} of {} aggregators rejected the report for epoch {} ({})",
                failures.len(),
                self.target.urls.len(),
                self.epoch,
                failures.join("; ")
            )))
        }
    }
}
