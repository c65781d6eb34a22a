//! HTTP implementation of the ledger gateway

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::gateway::ApiEnvelope;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{validate_conciliation_record, validate_disbursement_record};

/// Connection settings for the backend ledger API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Base URL of the backend, without a trailing slash
    pub base_url: String,
    /// Bearer token attached to every request, when set
    pub api_token: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_token: None,
            timeout_secs: 30,
        }
    }
}

impl GatewayConfig {
    /// Build a config from `LEDGER_API_BASE`, `LEDGER_API_TOKEN` and
    /// `LEDGER_API_TIMEOUT_SECS`, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("LEDGER_API_BASE").unwrap_or(defaults.base_url),
            api_token: std::env::var("LEDGER_API_TOKEN").ok(),
            timeout_secs: std::env::var("LEDGER_API_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// Ledger gateway speaking HTTP/JSON to the backend
///
/// Pure transport plus shape validation; no business logic. Network
/// failures surface as [`SettlementError::Transport`], `success: false`
/// envelopes as [`SettlementError::Backend`], and contract-violating
/// payloads as [`SettlementError::InvalidResponse`].
pub struct HttpGateway {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl HttpGateway {
    /// Create a gateway over the given connection settings
    pub fn new(config: GatewayConfig) -> SettlementResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("settlement-core/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SettlementError::Transport(e.to_string()))?;

        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and decode the response envelope
    ///
    /// Non-2xx responses that still carry an envelope are decoded like
    /// any other (the envelope's own failure branch applies); anything
    /// undecodable is reported with the HTTP status.
    async fn execute<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> SettlementResult<ApiEnvelope<T>> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| SettlementError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SettlementError::Transport(e.to_string()))?;

        match serde_json::from_str::<ApiEnvelope<T>>(&body) {
            Ok(envelope) => Ok(envelope),
            Err(_) if !(200..300).contains(&status) => Err(SettlementError::Backend {
                status,
                message: snippet(&body),
            }),
            Err(err) => Err(SettlementError::InvalidResponse(err.to_string())),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> SettlementResult<T> {
        debug!(path, "GET");
        self.execute(self.http.get(self.url(path))).await?.into_result()
    }

    async fn post_ack<B: Serialize + Sync>(&self, path: &str, body: &B) -> SettlementResult<()> {
        debug!(path, "POST");
        self.execute::<serde_json::Value>(self.http.post(self.url(path)).json(body))
            .await?
            .into_ack()
    }
}

#[async_trait]
impl LedgerGateway for HttpGateway {
    async fn list_pending_disbursements(&self) -> SettlementResult<Vec<DisbursementRecord>> {
        let records: Vec<DisbursementRecord> = self.get("/disbursements?status=PENDING").await?;
        for record in &records {
            validate_disbursement_record(record)?;
        }
        Ok(records)
    }

    async fn update_disbursement(
        &self,
        disbursement_id: &str,
        patch: &DisbursementPatch,
    ) -> SettlementResult<DisbursementRecord> {
        let path = format!("/disbursements/{}", disbursement_id);
        debug!(path = %path, "PATCH");
        let record: DisbursementRecord = self
            .execute(self.http.patch(self.url(&path)).json(patch))
            .await?
            .into_result()?;
        validate_disbursement_record(&record)?;
        Ok(record)
    }

    async fn process_disbursements(&self, request: &ProcessBatchRequest) -> SettlementResult<()> {
        self.post_ack("/disbursements/process", request).await
    }

    async fn list_repayments(&self) -> SettlementResult<Vec<ConciliationRecord>> {
        let records: Vec<ConciliationRecord> = self.get("/conciliation/repayments").await?;
        for record in &records {
            validate_conciliation_record(record)?;
        }
        Ok(records)
    }

    async fn match_candidates(
        &self,
        conciliation_id: &str,
    ) -> SettlementResult<Vec<MatchCandidate>> {
        self.get(&format!(
            "/conciliation/repayments/{}/recommandations",
            conciliation_id
        ))
        .await
    }

    async fn match_candidates_by_transaction(
        &self,
        transaction_id: &str,
    ) -> SettlementResult<Vec<MatchCandidate>> {
        self.get(&format!("/conciliation/recommandations/tx/{}", transaction_id))
            .await
    }

    async fn commit_match(&self, request: &CommitMatchRequest) -> SettlementResult<()> {
        self.post_ack("/conciliation/process", request).await
    }
}

/// First part of an undecodable body, for error messages
fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let cut = body
            .char_indices()
            .take_while(|(i, _)| *i < MAX)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}...", &body[..cut])
    }
}
