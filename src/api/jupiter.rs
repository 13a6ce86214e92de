use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::SwapAggregator;
use crate::models::{Quote, UnsignedSwap};
use crate::Result;

// Jupiter Swap API v1
// Docs: https://dev.jup.ag/docs/swap-api/get-quote
pub const JUPITER_SWAP_API: &str = "https://lite-api.jup.ag/swap/v1";

pub const DEFAULT_COMPUTE_UNIT_PRICE_MICRO_LAMPORTS: u64 = 20 * 14_000;

/// Client for Jupiter aggregator API
#[derive(Clone)]
pub struct JupiterClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    compute_unit_price_micro_lamports: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    input_mint: String,
    in_amount: String,
    output_mint: String,
    out_amount: String,
    #[serde(default)]
    price_impact_pct: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    swap_transaction: String,
    #[serde(default)]
    last_valid_block_height: Option<u64>,
}

impl JupiterClient {
    /// Client against a custom endpoint with a bounded request timeout
    pub fn with_settings(
        base_url: &str,
        api_key: Option<String>,
        compute_unit_price_micro_lamports: u64,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            compute_unit_price_micro_lamports,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        }
    }

    /// Get a quote for swapping tokens
    ///
    /// # Arguments
    /// * `input_mint` - Input token mint address
    /// * `output_mint` - Output token mint address
    /// * `amount` - Amount in raw units (e.g., lamports for SOL)
    /// * `slippage_bps` - Slippage tolerance in basis points (50 = 0.5%)
    pub async fn get_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Quote> {
        let url = format!("{}/quote", self.base_url);
        tracing::debug!(
            "Jupiter quote: {} {} -> {} ({} bps)",
            amount,
            input_mint,
            output_mint,
            slippage_bps
        );

        let response = self
            .authorize(self.client.get(&url))
            .query(&[
                ("inputMint", input_mint.to_string()),
                ("outputMint", output_mint.to_string()),
                ("amount", amount.to_string()),
                ("slippageBps", slippage_bps.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(format!("Jupiter quote failed ({}): {}", status, body).into());
        }

        // Keep the raw payload: the swap endpoint wants it back verbatim
        let route: serde_json::Value = serde_json::from_str(&body)?;
        let parsed: QuoteResponse = serde_json::from_value(route.clone())?;

        let in_amount: u64 = parsed.in_amount.parse()?;
        let out_amount: u64 = parsed.out_amount.parse()?;
        let price_impact_pct = parsed
            .price_impact_pct
            .and_then(|p| p.parse().ok())
            .unwrap_or(0.0);

        tracing::debug!("Jupiter quote: in={} out={}", in_amount, out_amount);

        Ok(Quote {
            input_mint: parsed.input_mint,
            output_mint: parsed.output_mint,
            in_amount,
            out_amount,
            price_impact_pct,
            route,
        })
    }

    /// Build the unsigned swap transaction for a quote
    pub async fn get_swap_transaction(
        &self,
        quote: &Quote,
        user_public_key: &str,
        slippage_bps: u16,
    ) -> Result<UnsignedSwap> {
        let url = format!("{}/swap", self.base_url);
        let body = json!({
            "quoteResponse": quote.route,
            "userPublicKey": user_public_key,
            "computeUnitPriceMicroLamports": self.compute_unit_price_micro_lamports,
            "dynamicSlippage": { "maxBps": slippage_bps },
        });

        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("Jupiter swap failed ({}): {}", status, text).into());
        }

        let swap: SwapResponse = response.json().await?;
        let transaction = STANDARD.decode(swap.swap_transaction)?;

        Ok(UnsignedSwap {
            transaction,
            last_valid_block_height: swap.last_valid_block_height,
        })
    }
}

#[async_trait]
impl SwapAggregator for JupiterClient {
    async fn quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Quote> {
        self.get_quote(input_mint, output_mint, amount, slippage_bps)
            .await
    }

    async fn build_transaction(
        &self,
        quote: &Quote,
        user_address: &str,
        slippage_bps: u16,
    ) -> Result<UnsignedSwap> {
        self.get_swap_transaction(quote, user_address, slippage_bps)
            .await
    }
}
