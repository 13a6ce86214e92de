use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use super::MarketData;
use crate::models::Bar;
use crate::Result;

pub const CRYPTOCOMPARE_API_BASE: &str = "https://min-api.cryptocompare.com/data";

/// Client for CryptoCompare minute bars and spot prices
#[derive(Clone)]
pub struct CryptoCompareClient {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Envelope of `/v2/histominute`; `Data` is absent on error payloads
#[derive(Debug, Deserialize)]
struct HistoResponse {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "Data", default)]
    data: Option<HistoData>,
}

#[derive(Debug, Deserialize)]
struct HistoData {
    #[serde(rename = "Data", default)]
    data: Vec<HistoBar>,
}

#[derive(Debug, Deserialize)]
struct HistoBar {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

impl CryptoCompareClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Fetch `limit` bars of `fsym` priced in `tsym`, aggregated over `interval_minutes`
    pub async fn get_histominute(
        &self,
        fsym: &str,
        tsym: &str,
        interval_minutes: u32,
        limit: usize,
    ) -> Result<Vec<Bar>> {
        let url = format!("{}/v2/histominute", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("authorization", &self.api_key)
            .query(&[
                ("fsym", fsym.to_string()),
                ("tsym", tsym.to_string()),
                ("limit", limit.to_string()),
                ("aggregate", interval_minutes.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("CryptoCompare error ({}): {}", status, text).into());
        }

        let body: HistoResponse = response.json().await?;
        if body.response == "Error" {
            return Err(format!("CryptoCompare error: {}", body.message).into());
        }

        let mut bars = Vec::new();
        for raw in body.data.map(|d| d.data).unwrap_or_default() {
            let timestamp = Utc
                .timestamp_opt(raw.time, 0)
                .single()
                .ok_or_else(|| format!("Invalid bar timestamp {}", raw.time))?;
            bars.push(Bar {
                timestamp,
                open: raw.open,
                high: raw.high,
                low: raw.low,
                close: raw.close,
            });
        }
        bars.sort_by_key(|b| b.timestamp);

        tracing::debug!("Fetched {} bars for {}/{}", bars.len(), fsym, tsym);
        Ok(bars)
    }

    /// Spot price of `symbol` in USD
    pub async fn get_price_usd(&self, symbol: &str) -> Result<f64> {
        let url = format!("{}/price", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("authorization", &self.api_key)
            .query(&[("fsym", symbol), ("tsyms", "USD")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("CryptoCompare price error ({}) for {}", status, symbol).into());
        }

        let body: HashMap<String, serde_json::Value> = response.json().await?;
        if body.get("Response").and_then(|v| v.as_str()) == Some("Error") {
            let message = body
                .get("Message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            return Err(format!("CryptoCompare price error for {}: {}", symbol, message).into());
        }

        body.get("USD")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| format!("No USD price for {}", symbol).into())
    }
}

#[async_trait]
impl MarketData for CryptoCompareClient {
    async fn fetch_candles(
        &self,
        base_symbol: &str,
        quote_symbol: &str,
        interval_minutes: u32,
        limit: usize,
    ) -> Result<Vec<Bar>> {
        self.get_histominute(base_symbol, quote_symbol, interval_minutes, limit)
            .await
    }

    async fn fetch_price_usd(&self, symbol: &str) -> Result<f64> {
        self.get_price_usd(symbol).await
    }
}
