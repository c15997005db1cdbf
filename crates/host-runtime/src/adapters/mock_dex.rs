//! Deterministic DEX adapter for tests and development.

use async_trait::async_trait;

use host_types::ports::{Dex, QuoteRequest, QuoteResult, SigningHandle, SwapResult};
use host_types::{ChainTxStatus, HostError, HostResult};

/// Stand-in for the external DEX collaborator. Quotes a fixed-rate
/// book with a flat 0.3% price impact.
#[derive(Default)]
pub struct MockDex;

impl MockDex {
    pub fn new() -> Self {
        Self
    }

    fn rate(from_token: &str, to_token: &str) -> f64 {
        match (from_token, to_token) {
            ("ETH", "USDC") | ("ETH", "USDT") => 1500.0,
            ("USDC", "ETH") | ("USDT", "ETH") => 1.0 / 1500.0,
            ("BNB", "USDC") | ("BNB", "USDT") => 300.0,
            ("SOL", "USDC") | ("SOL", "USDT") => 100.0,
            _ => 1.0,
        }
    }
}

#[async_trait]
impl Dex for MockDex {
    async fn quote(&self, req: &QuoteRequest) -> HostResult<QuoteResult> {
        let amount_in: f64 = req
            .amount_in
            .parse()
            .map_err(|_| HostError::invalid_params("amount_in must be numeric"))?;
        if amount_in <= 0.0 {
            return Err(HostError::invalid_params("amount_in must be positive"));
        }

        let rate = Self::rate(&req.from_token, &req.to_token);
        let amount_out = amount_in * rate * 0.997;
        Ok(QuoteResult {
            amount_in: req.amount_in.clone(),
            amount_out: format!("{amount_out:.6}"),
            gas_estimate: "150000".to_string(),
            price_impact: "0.30".to_string(),
            route: vec![req.from_token.clone(), req.to_token.clone()],
            valid_until: chrono::Utc::now().timestamp() + 60,
        })
    }

    async fn execute(
        &self,
        _wallet: SigningHandle<'_>,
        req: &QuoteRequest,
    ) -> HostResult<SwapResult> {
        let quote = self.quote(req).await?;
        Ok(SwapResult {
            tx_hash: format!("0x{:064x}", quote.valid_until),
            status: ChainTxStatus::Pending,
            amount_out: quote.amount_out,
        })
    }
}
