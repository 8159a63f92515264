//! Chain RPC client for live token balances.

use super::traits::BalanceSource;
use super::types::{AccountName, Asset, Symbol};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
struct CurrencyBalanceRequest<'a> {
    code: &'a str,
    account: &'a str,
    symbol: &'a str,
}

/// Read-only client for a chain node's HTTP API.
#[derive(Debug, Clone)]
pub struct ChainRpcClient {
    client: Client,
    base_url: String,
    token_contract: String,
}

impl ChainRpcClient {
    /// Create a client for `base_url`, reading balances of `token_contract`.
    pub fn new(base_url: &str, token_contract: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token_contract: token_contract.to_string(),
        })
    }

    /// Fetch the balance of `owner` in `symbol`; no balance row means zero.
    #[instrument(skip(self), name = "get_currency_balance")]
    pub async fn get_currency_balance(&self, owner: &AccountName, symbol: &Symbol) -> Result<Asset> {
        let url = format!("{}/v1/chain/get_currency_balance", self.base_url);
        let request = CurrencyBalanceRequest {
            code: &self.token_contract,
            account: owner.as_str(),
            symbol: symbol.code(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send get_currency_balance request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Chain API error {}: {}", status, body);
        }

        let rows: Vec<String> = response
            .json()
            .await
            .context("Failed to parse get_currency_balance response")?;

        for row in &rows {
            let asset: Asset = row
                .parse()
                .with_context(|| format!("Malformed balance row: {}", row))?;
            if &asset.symbol == symbol {
                debug!(%owner, %asset, "Fetched currency balance");
                return Ok(asset);
            }
        }

        Ok(Asset::zero(symbol.clone()))
    }
}

#[async_trait]
impl BalanceSource for ChainRpcClient {
    async fn fetch_balance(&self, owner: &AccountName, symbol: &Symbol) -> Result<Asset> {
        self.get_currency_balance(owner, symbol).await
    }
}
