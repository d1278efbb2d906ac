use async_trait::async_trait;
use serde::Deserialize;

pub const FALLBACK_ETH_USD: f64 = 2000.0;
pub const DEFAULT_ORACLE_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=ethereum&vs_currencies=usd";

/// ETH/USD quote source. Never fails: callers get the fallback instead.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn eth_usd(&self) -> f64;
}

#[derive(Deserialize)]
struct Quote {
    ethereum: Option<UsdQuote>,
}

#[derive(Deserialize)]
struct UsdQuote {
    usd: Option<f64>,
}

fn parse_quote(body: &str) -> Option<f64> {
    let quote: Quote = serde_json::from_str(body).ok()?;
    quote
        .ethereum
        .and_then(|e| e.usd)
        .filter(|usd| usd.is_finite() && *usd > 0.0)
}

pub struct CoinGeckoOracle {
    http: reqwest::Client,
    url: String,
}

impl CoinGeckoOracle {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    async fn fetch(&self) -> Result<String, reqwest::Error> {
        self.http.get(&self.url).send().await?.error_for_status()?.text().await
    }
}

#[async_trait]
impl PriceOracle for CoinGeckoOracle {
    async fn eth_usd(&self) -> f64 {
        match self.fetch().await {
            Ok(body) => parse_quote(&body).unwrap_or_else(|| {
                log::warn!("Unexpected ETH/USD quote, using fallback {}", FALLBACK_ETH_USD);
                FALLBACK_ETH_USD
            }),
            Err(e) => {
                log::warn!("ETH/USD quote unavailable ({}), using fallback {}", e, FALLBACK_ETH_USD);
                FALLBACK_ETH_USD
            }
        }
    }
}

/// A constant rate, for offline runs and tests.
pub struct FixedRate(pub f64);

#[async_trait]
impl PriceOracle for FixedRate {
    async fn eth_usd(&self) -> f64 {
        self.0
    }
}
