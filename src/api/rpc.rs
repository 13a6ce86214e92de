use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde_json::{json, Value};

use super::ChainRpc;
use crate::models::{TxStatus, SOL_MINT};
use crate::Result;

const DEFAULT_REQUESTS_PER_SECOND: u32 = 10;
const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// SOL kept aside for transaction fees; never reported as spendable
pub const SOL_FEE_RESERVE: f64 = 0.01;

type RpcRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Minimal Solana JSON-RPC client over HTTP
///
/// Cloneable; clones share the rate limiter and request counter.
#[derive(Clone)]
pub struct SolanaRpcClient {
    client: Client,
    url: String,
    rate_limiter: Arc<RpcRateLimiter>,
    next_id: Arc<AtomicU64>,
}

impl SolanaRpcClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        Self::with_rate_limit(url, timeout, DEFAULT_REQUESTS_PER_SECOND)
    }

    pub fn with_rate_limit(url: &str, timeout: Duration, requests_per_second: u32) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let rps = NonZeroU32::new(requests_per_second).ok_or("RPC rate limit must be non-zero")?;

        Ok(Self {
            client,
            url: url.to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Send one JSON-RPC request and return its `result`
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.rate_limiter.until_ready().await;

        let payload = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("RPC {} failed with HTTP {}", method, status).into());
        }

        let mut body: Value = response.json().await?;
        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error");
            return Err(format!("RPC {} error: {}", method, message).into());
        }

        match body.get_mut("result") {
            Some(result) => Ok(result.take()),
            None => Err(format!("RPC {} returned no result", method).into()),
        }
    }

    /// Native SOL balance in SOL, minus the fee reserve
    pub async fn get_sol_balance(&self, owner: &str) -> Result<f64> {
        let result = self.call("getBalance", json!([owner])).await?;
        let lamports = result
            .get("value")
            .and_then(|v| v.as_u64())
            .ok_or("Invalid getBalance response")?;

        let sol = lamports as f64 / LAMPORTS_PER_SOL;
        if sol < SOL_FEE_RESERVE {
            return Ok(0.0);
        }
        Ok(sol - SOL_FEE_RESERVE)
    }

    /// SPL token balance across every account of `owner` for `mint`
    pub async fn get_token_balance(&self, owner: &str, mint: &str) -> Result<f64> {
        let result = self
            .call(
                "getTokenAccountsByOwner",
                json!([owner, { "mint": mint }, { "encoding": "jsonParsed" }]),
            )
            .await?;

        let accounts = result
            .get("value")
            .and_then(|v| v.as_array())
            .ok_or("Invalid getTokenAccountsByOwner response")?;

        let total = accounts
            .iter()
            .filter_map(|account| {
                account
                    .pointer("/account/data/parsed/info/tokenAmount/uiAmount")
                    .and_then(|v| v.as_f64())
            })
            .sum();

        Ok(total)
    }
}

#[async_trait]
impl ChainRpc for SolanaRpcClient {
    async fn get_balance(&self, owner: &str, mint: &str) -> Result<f64> {
        if mint == SOL_MINT {
            self.get_sol_balance(owner).await
        } else {
            self.get_token_balance(owner, mint).await
        }
    }

    async fn get_decimals(&self, mint: &str) -> Result<u8> {
        if mint == SOL_MINT {
            return Ok(9);
        }
        let result = self.call("getTokenSupply", json!([mint])).await?;
        let decimals = result
            .pointer("/value/decimals")
            .and_then(|v| v.as_u64())
            .ok_or("Invalid getTokenSupply response")?;
        Ok(u8::try_from(decimals)?)
    }

    async fn get_block_height(&self) -> Result<u64> {
        let result = self
            .call("getBlockHeight", json!([{ "commitment": "confirmed" }]))
            .await?;
        result
            .as_u64()
            .ok_or_else(|| "Invalid getBlockHeight response".into())
    }

    async fn get_transaction_status(&self, signature: &str) -> Result<TxStatus> {
        let result = self
            .call(
                "getSignatureStatuses",
                json!([[signature], { "searchTransactionHistory": true }]),
            )
            .await?;

        let status = result
            .pointer("/value/0")
            .ok_or("Invalid getSignatureStatuses response")?;
        Ok(parse_signature_status(status))
    }

    async fn send_transaction(&self, signed_transaction: &[u8]) -> Result<String> {
        let encoded = STANDARD.encode(signed_transaction);
        let result = self
            .call(
                "sendTransaction",
                json!([encoded, {
                    "encoding": "base64",
                    "skipPreflight": false,
                    "preflightCommitment": "confirmed",
                    "maxRetries": 2,
                }]),
            )
            .await?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| "Invalid sendTransaction response".into())
    }
}

/// Map one `getSignatureStatuses` entry onto a settlement state
fn parse_signature_status(status: &Value) -> TxStatus {
    if status.is_null() {
        return TxStatus::Pending;
    }

    if let Some(err) = status.get("err").filter(|e| !e.is_null()) {
        return TxStatus::Failed(err.to_string());
    }

    match status.get("confirmationStatus").and_then(|s| s.as_str()) {
        Some("confirmed") | Some("finalized") => TxStatus::Success,
        _ => TxStatus::Pending,
    }
}
