//! HTTP balance provider
//!
//! Client for the hosted balance service. The service stores one document
//! per (economy, user) with `cash` and `bank` fields and only supports
//! setting absolute values, so debit and credit are read-then-patch. The
//! resource serializer keeps concurrent mutations off the same document.

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::{BalanceProvider, ProviderError, Wallet};
use crate::config::ProviderConfig;
use crate::core_types::{EconomyId, UserId};
use crate::money;

/// Default Retry-After when the service omits the header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

pub struct HttpBalanceProvider {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpBalanceProvider {
    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn user_url(&self, economy: EconomyId, user: UserId) -> String {
        format!("{}/economies/{}/users/{}", self.base_url, economy, user)
    }

    /// Fetch the full balance document for a user
    async fn fetch_balances(
        &self,
        economy: EconomyId,
        user: UserId,
    ) -> Result<(Decimal, Decimal), ProviderError> {
        let resp = self
            .client
            .get(self.user_url(economy, user))
            .header("Authorization", &self.token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(request_error)?;

        let resp = check_status(resp, economy, user).await?;
        parse_balances(resp).await
    }

    /// Write absolute wallet value; returns the updated document
    async fn patch_balance(
        &self,
        economy: EconomyId,
        user: UserId,
        wallet: Wallet,
        value: Decimal,
        reason: &str,
    ) -> Result<(Decimal, Decimal), ProviderError> {
        // The service expects stringified numbers in write payloads.
        let body = json!({
            wallet.as_str(): money::format_amount(value, money::DEFAULT_SCALE),
            "reason": reason,
        });

        let resp = self
            .client
            .patch(self.user_url(economy, user))
            .header("Authorization", &self.token)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        let resp = check_status(resp, economy, user).await?;
        parse_balances(resp).await
    }
}

#[async_trait]
impl BalanceProvider for HttpBalanceProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn get_balance(
        &self,
        economy: EconomyId,
        user: UserId,
        wallet: Wallet,
    ) -> Result<Decimal, ProviderError> {
        let (cash, bank) = self.fetch_balances(economy, user).await?;
        Ok(pick(wallet, cash, bank))
    }

    async fn debit(
        &self,
        economy: EconomyId,
        user: UserId,
        wallet: Wallet,
        amount: Decimal,
    ) -> Result<Decimal, ProviderError> {
        let (cash, bank) = self.fetch_balances(economy, user).await?;
        let current = pick(wallet, cash, bank);

        // Caught here from the read, without issuing the write.
        if current < amount {
            return Err(ProviderError::InsufficientFunds {
                balance: current,
                requested: amount,
            });
        }

        let next = current - amount;
        debug!(economy, user, wallet = %wallet, %amount, %next, "provider debit");
        let (cash, bank) = self
            .patch_balance(economy, user, wallet, next, "clearinghouse debit")
            .await?;
        Ok(pick(wallet, cash, bank))
    }

    async fn credit(
        &self,
        economy: EconomyId,
        user: UserId,
        wallet: Wallet,
        amount: Decimal,
    ) -> Result<Decimal, ProviderError> {
        let (cash, bank) = self.fetch_balances(economy, user).await?;
        let current = pick(wallet, cash, bank);

        let next = current + amount;
        debug!(economy, user, wallet = %wallet, %amount, %next, "provider credit");
        let (cash, bank) = self
            .patch_balance(economy, user, wallet, next, "clearinghouse credit")
            .await?;
        Ok(pick(wallet, cash, bank))
    }
}

fn pick(wallet: Wallet, cash: Decimal, bank: Decimal) -> Decimal {
    match wallet {
        Wallet::Cash => cash,
        Wallet::Bank => bank,
    }
}

fn request_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Network(format!("request timed out: {}", e))
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Map non-success statuses onto the provider error taxonomy
async fn check_status(
    resp: reqwest::Response,
    economy: EconomyId,
    user: UserId,
) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    if status == StatusCode::NOT_FOUND {
        return Err(ProviderError::NotFound { economy, user });
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = resp
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        warn!(economy, user, retry_after_secs, "balance service rate limited");
        return Err(ProviderError::RateLimited { retry_after_secs });
    }

    if status.is_server_error() {
        return Err(ProviderError::Network(format!(
            "service error {} for economy {}",
            status.as_u16(),
            economy
        )));
    }

    let detail = resp.text().await.unwrap_or_default();
    Err(ProviderError::Permanent {
        status: status.as_u16(),
        detail,
    })
}

/// Parse `{"cash": ..., "bank": ...}` from a success response.
///
/// The service is inconsistent about numeric encoding (bare numbers in
/// reads, strings in writes), so both forms are accepted.
async fn parse_balances(resp: reqwest::Response) -> Result<(Decimal, Decimal), ProviderError> {
    let doc: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| ProviderError::Network(format!("bad response body: {}", e)))?;

    let cash = decode_field(&doc, "cash")?;
    let bank = decode_field(&doc, "bank")?;
    Ok((cash, bank))
}

fn decode_field(doc: &serde_json::Value, field: &str) -> Result<Decimal, ProviderError> {
    let value = doc.get(field).ok_or_else(|| ProviderError::Permanent {
        status: 200,
        detail: format!("response missing '{}' field", field),
    })?;

    let text = match value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => {
            return Err(ProviderError::Permanent {
                status: 200,
                detail: format!("unexpected '{}' value: {}", field, other),
            });
        }
    };

    money::parse_balance(&text).map_err(|_| ProviderError::Permanent {
        status: 200,
        detail: format!("unparseable '{}' value: {}", field, text),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_decode_field_number_and_string() {
        let doc = serde_json::json!({"cash": 1250.5, "bank": "300.25"});
        assert_eq!(decode_field(&doc, "cash").unwrap(), dec("1250.5"));
        assert_eq!(decode_field(&doc, "bank").unwrap(), dec("300.25"));
    }

    #[test]
    fn test_decode_field_rejects_missing_and_malformed() {
        let doc = serde_json::json!({"cash": true});
        assert!(matches!(
            decode_field(&doc, "cash"),
            Err(ProviderError::Permanent { .. })
        ));
        assert!(matches!(
            decode_field(&doc, "bank"),
            Err(ProviderError::Permanent { .. })
        ));
    }

    #[test]
    fn test_user_url_layout() {
        let provider = HttpBalanceProvider::new(&ProviderConfig {
            base_url: "http://localhost:8429/api/v1/".into(),
            token: "secret".into(),
            timeout_secs: 10,
        })
        .unwrap();
        assert_eq!(
            provider.user_url(42, 7),
            "http://localhost:8429/api/v1/economies/42/users/7"
        );
    }
}
