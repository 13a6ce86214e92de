use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};

use crate::api::{ChainRpc, SwapAggregator};
use crate::config::SwapSettings;
use crate::execution::retry;
use crate::logging::TRADE_TARGET;
use crate::models::{Quote, SwapOrder, SwapStatus, TxStatus};
use crate::wallet::TransactionSigner;

/// Why a single swap attempt did not settle
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("{step} failed: {message}")]
    Step { step: &'static str, message: String },

    #[error("{step} timed out after {}s", .after.as_secs())]
    Timeout { step: &'static str, after: Duration },

    #[error("transaction {signature} failed on-chain: {error}")]
    TransactionFailed { signature: String, error: String },

    #[error("transaction {signature} expired before confirmation")]
    Expired { signature: String },

    #[error("transaction {signature} unconfirmed after {checks} checks")]
    Unconfirmed { signature: String, checks: u32 },

    #[error("earlier transaction {signature} can still land, not resubmitting")]
    EarlierStillValid { signature: String },
}

/// A settled swap
#[derive(Debug, Clone)]
pub struct SwapReceipt {
    pub signature: String,
    pub input_mint: String,
    pub output_mint: String,
    pub in_amount: u64,
    /// Quoted output in raw units of the output mint
    pub out_amount: u64,
    pub attempt: u32,
}

#[derive(Debug, Clone)]
pub enum SwapOutcome {
    Confirmed(SwapReceipt),
    Failed { attempts: u32 },
}

impl SwapOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, SwapOutcome::Confirmed(_))
    }
}

/// A transaction that reached the chain during an earlier attempt
#[derive(Debug, Clone)]
struct Submitted {
    signature: String,
    quote: Quote,
    attempt: u32,
    last_valid_block_height: Option<u64>,
    /// Failed on-chain or expired while still pending; it can never land
    dead: bool,
}

/// State of the earlier submissions after one status pass
enum Earlier {
    Landed(SwapReceipt),
    /// The first signature that may still land
    Live(String),
    Dead,
}

/// Quote, sign, submit and confirm swaps with a bounded number of attempts
pub struct SwapEngine {
    aggregator: Arc<dyn SwapAggregator>,
    rpc: Arc<dyn ChainRpc>,
    signer: Arc<dyn TransactionSigner>,
    slippage_bps: u16,
    settings: SwapSettings,
    request_timeout: Duration,
}

impl SwapEngine {
    pub fn new(
        aggregator: Arc<dyn SwapAggregator>,
        rpc: Arc<dyn ChainRpc>,
        signer: Arc<dyn TransactionSigner>,
        slippage_bps: u16,
        settings: SwapSettings,
        request_timeout: Duration,
    ) -> Self {
        Self {
            aggregator,
            rpc,
            signer,
            slippage_bps,
            settings,
            request_timeout,
        }
    }

    /// Swap `amount` raw units of `input_mint` into `output_mint`.
    ///
    /// Never fails: exhausted attempts are logged and reported as
    /// `SwapOutcome::Failed`.
    pub async fn perform_swap(&self, amount: u64, input_mint: &str, output_mint: &str) -> SwapOutcome {
        if amount == 0 {
            tracing::warn!("Refusing to swap zero {} for {}", input_mint, output_mint);
            return SwapOutcome::Failed { attempts: 0 };
        }

        let submitted = Mutex::new(Vec::new());
        let earlier = &submitted;
        let max_attempts = self.settings.max_attempts;

        let result = retry::bounded(max_attempts, move |attempt| {
            self.attempt(attempt, amount, input_mint, output_mint, earlier)
        })
        .await;

        match result {
            Ok(receipt) => {
                tracing::info!(
                    target: TRADE_TARGET,
                    "✅ Swap confirmed on attempt {}/{}: {}",
                    receipt.attempt,
                    max_attempts,
                    receipt.signature
                );
                SwapOutcome::Confirmed(receipt)
            }
            Err(failures) => {
                // The last attempt may have landed after its checks ran out
                match self.poll_submitted(&submitted).await {
                    Earlier::Landed(receipt) => {
                        tracing::info!(
                            target: TRADE_TARGET,
                            "✅ Swap landed after its checks ran out (attempt {}): {}",
                            receipt.attempt,
                            receipt.signature
                        );
                        return SwapOutcome::Confirmed(receipt);
                    }
                    Earlier::Live(signature) => tracing::error!(
                        target: TRADE_TARGET,
                        "Transaction {} is still pending and may settle later",
                        signature
                    ),
                    Earlier::Dead => {}
                }

                tracing::error!(
                    target: TRADE_TARGET,
                    "❌ Swap {} -> {} failed after {} attempts: {}",
                    input_mint,
                    output_mint,
                    failures.len(),
                    failures
                        .last()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "no attempts made".to_string())
                );
                SwapOutcome::Failed {
                    attempts: failures.len() as u32,
                }
            }
        }
    }

    async fn attempt(
        &self,
        attempt: u32,
        amount: u64,
        input_mint: &str,
        output_mint: &str,
        submitted: &Mutex<Vec<Submitted>>,
    ) -> Result<SwapReceipt, AttemptError> {
        // Never resubmit while an earlier transaction can still land
        if attempt > 1 {
            if let Some(receipt) = self.settle_earlier(submitted).await? {
                return Ok(receipt);
            }
        }

        let mut order = SwapOrder::new(input_mint, output_mint, amount);
        tracing::info!(
            "🔄 Swap attempt {} ({}): {} {} -> {}",
            attempt,
            order.id,
            amount,
            input_mint,
            output_mint
        );

        let quote = self
            .call(
                "quote",
                self.aggregator
                    .quote(input_mint, output_mint, amount, self.slippage_bps),
            )
            .await?;
        order.quote = Some(quote.clone());

        let unsigned = self
            .call(
                "build transaction",
                self.aggregator
                    .build_transaction(&quote, &self.signer.address(), self.slippage_bps),
            )
            .await?;

        let signed = self
            .signer
            .sign_transaction(&unsigned.transaction)
            .map_err(|e| AttemptError::Step {
                step: "sign",
                message: e.to_string(),
            })?;
        let signature = self
            .call("submit", self.rpc.send_transaction(&signed))
            .await?;
        order.signed_transaction = Some(signed);
        order.signature = Some(signature.clone());
        tracing::info!(target: TRADE_TARGET, "📤 Submitted {}", signature);

        submitted.lock().await.push(Submitted {
            signature: signature.clone(),
            quote: quote.clone(),
            attempt,
            last_valid_block_height: unsigned.last_valid_block_height,
            dead: false,
        });

        let confirmation = self
            .confirm(&signature, unsigned.last_valid_block_height)
            .await;
        if let Err(AttemptError::TransactionFailed { .. }) = &confirmation {
            if let Some(tx) = submitted
                .lock()
                .await
                .iter_mut()
                .find(|tx| tx.signature == signature)
            {
                tx.dead = true;
            }
        }
        order.status = match &confirmation {
            Ok(()) => SwapStatus::Confirmed,
            Err(_) => SwapStatus::Failed,
        };
        tracing::debug!("Swap order {} settled as {:?}", order.id, order.status);

        confirmation.map(|()| receipt(&signature, &quote, attempt))
    }

    /// Poll settlement with a fixed delay before each check
    async fn confirm(
        &self,
        signature: &str,
        last_valid_block_height: Option<u64>,
    ) -> Result<(), AttemptError> {
        let checks = self.settings.confirm_checks;
        let delay = Duration::from_secs(self.settings.confirm_delay_secs);

        for check in 1..=checks {
            sleep(delay).await;

            match self
                .call("status check", self.rpc.get_transaction_status(signature))
                .await
            {
                Ok(TxStatus::Success) => return Ok(()),
                Ok(TxStatus::Failed(error)) => {
                    return Err(AttemptError::TransactionFailed {
                        signature: signature.to_string(),
                        error,
                    })
                }
                Ok(TxStatus::Pending) => {
                    tracing::debug!("{} pending (check {}/{})", signature, check, checks);
                }
                Err(e) => tracing::warn!("Status check {}/{} for {}: {}", check, checks, signature, e),
            }

            if let Some(last_valid) = last_valid_block_height {
                if let Ok(height) = self
                    .call("block height", self.rpc.get_block_height())
                    .await
                {
                    if height > last_valid {
                        return Err(AttemptError::Expired {
                            signature: signature.to_string(),
                        });
                    }
                }
            }
        }

        Err(AttemptError::Unconfirmed {
            signature: signature.to_string(),
            checks,
        })
    }

    /// Wait until every earlier transaction has landed or can no longer land.
    ///
    /// Gives up after `confirm_checks` more polls; the attempt then fails
    /// without submitting anything.
    async fn settle_earlier(
        &self,
        submitted: &Mutex<Vec<Submitted>>,
    ) -> Result<Option<SwapReceipt>, AttemptError> {
        let checks = self.settings.confirm_checks;
        let delay = Duration::from_secs(self.settings.confirm_delay_secs);
        let mut poll = 0;

        loop {
            match self.poll_submitted(submitted).await {
                Earlier::Landed(receipt) => {
                    tracing::info!(
                        target: TRADE_TARGET,
                        "Earlier transaction {} landed late",
                        receipt.signature
                    );
                    return Ok(Some(receipt));
                }
                Earlier::Dead => return Ok(None),
                Earlier::Live(signature) if poll >= checks => {
                    return Err(AttemptError::EarlierStillValid { signature });
                }
                Earlier::Live(signature) => {
                    tracing::debug!("Waiting on earlier transaction {} ({}/{})", signature, poll + 1, checks);
                }
            }
            poll += 1;
            sleep(delay).await;
        }
    }

    /// One status pass over the earlier submissions.
    ///
    /// Block height is read before status: a transaction still pending
    /// after its blockhash expired can never land.
    async fn poll_submitted(&self, submitted: &Mutex<Vec<Submitted>>) -> Earlier {
        let mut earlier = submitted.lock().await;
        let mut live = None;

        for tx in earlier.iter_mut().filter(|tx| !tx.dead) {
            let expired = match tx.last_valid_block_height {
                Some(last_valid) => self
                    .call("block height", self.rpc.get_block_height())
                    .await
                    .is_ok_and(|height| height > last_valid),
                None => false,
            };

            match self
                .call("status recheck", self.rpc.get_transaction_status(&tx.signature))
                .await
            {
                Ok(TxStatus::Success) => {
                    return Earlier::Landed(receipt(&tx.signature, &tx.quote, tx.attempt))
                }
                Ok(TxStatus::Failed(_)) => tx.dead = true,
                Ok(TxStatus::Pending) if expired => tx.dead = true,
                Ok(TxStatus::Pending) | Err(_) => {
                    live.get_or_insert_with(|| tx.signature.clone());
                }
            }
        }

        match live {
            Some(signature) => Earlier::Live(signature),
            None => Earlier::Dead,
        }
    }

    async fn call<T>(
        &self,
        step: &'static str,
        future: impl Future<Output = crate::Result<T>>,
    ) -> Result<T, AttemptError> {
        match timeout(self.request_timeout, future).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(AttemptError::Step {
                step,
                message: e.to_string(),
            }),
            Err(_) => Err(AttemptError::Timeout {
                step,
                after: self.request_timeout,
            }),
        }
    }
}

fn receipt(signature: &str, quote: &Quote, attempt: u32) -> SwapReceipt {
    SwapReceipt {
        signature: signature.to_string(),
        input_mint: quote.input_mint.clone(),
        output_mint: quote.output_mint.clone(),
        in_amount: quote.in_amount,
        out_amount: quote.out_amount,
        attempt,
    }
}
