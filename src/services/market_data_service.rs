use async_trait::async_trait;
use reqwest::Client;
use std::env;
use std::time::Duration;

use crate::models::dto::{CompanyProfile, StockQuote};

/// Capacité "fournisseur de quotes" consommée par le service trade.
/// Trait séparé pour pouvoir brancher un stub dans les tests:
/// l'enrichissement ne doit jamais dépendre du réseau pour être testé.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Quotes pour un lot de symboles. Les échecs par symbole sont
    /// loggés et ignorés: le résultat ne contient que les succès.
    async fn get_quote_batch(&self, symbols: &[String]) -> Vec<StockQuote>;

    /// Profil société, None si le ticker est inconnu de Finnhub.
    async fn get_company_profile(&self, symbol: &str) -> Option<CompanyProfile>;
}

/// Client Finnhub (quote + profil société).
#[derive(Clone)]
pub struct FinnhubService {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FinnhubService {
    /// Construit le client depuis FINHUB_API_KEY / FINHUB_BASE_URL.
    /// Retourne None si la config est absente: le serveur démarre quand même,
    /// l'enrichissement est simplement désactivé.
    pub fn from_env() -> Option<Self> {
        let api_key = match env::var("FINHUB_API_KEY") {
            Ok(key) => key,
            Err(_) => {
                tracing::warn!("FINHUB_API_KEY not set, market data enrichment disabled");
                return None;
            }
        };
        let base_url = match env::var("FINHUB_BASE_URL") {
            Ok(url) => url,
            Err(_) => {
                tracing::warn!("FINHUB_BASE_URL not set, market data enrichment disabled");
                return None;
            }
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .ok()?;

        Some(FinnhubService {
            client,
            api_key,
            base_url,
        })
    }

    pub async fn get_quote(&self, symbol: &str) -> Result<StockQuote, reqwest::Error> {
        let url = format!("{}/quote?symbol={}", self.base_url, symbol.to_uppercase());

        let mut quote: StockQuote = self
            .client
            .get(&url)
            .header("X-Finnhub-Token", &self.api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        quote.symbol = symbol.to_string();
        Ok(quote)
    }
}

#[async_trait]
impl QuoteProvider for FinnhubService {
    async fn get_quote_batch(&self, symbols: &[String]) -> Vec<StockQuote> {
        let tasks = symbols.iter().map(|symbol| self.get_quote(symbol));
        let results = futures::future::join_all(tasks).await;

        let mut quotes = Vec::new();
        for (symbol, result) in symbols.iter().zip(results) {
            match result {
                Ok(quote) => quotes.push(quote),
                Err(e) => {
                    tracing::warn!("Error fetching price for {}: {}", symbol, e);
                }
            }
        }
        quotes
    }

    async fn get_company_profile(&self, symbol: &str) -> Option<CompanyProfile> {
        let url = format!(
            "{}/stock/profile2?symbol={}",
            self.base_url,
            symbol.to_uppercase()
        );

        let response = self
            .client
            .get(&url)
            .header("X-Finnhub-Token", &self.api_key)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let value: serde_json::Value = match response {
            Ok(r) => match r.json().await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!("Invalid profile payload for {}: {}", symbol, e);
                    return None;
                }
            },
            Err(e) => {
                tracing::warn!("Error fetching company profile for {}: {}", symbol, e);
                return None;
            }
        };

        parse_profile(value)
    }
}

// Finnhub renvoie {} pour un ticker invalide: on exige au moins "name".
fn parse_profile(value: serde_json::Value) -> Option<CompanyProfile> {
    if value.get("name").and_then(|n| n.as_str()).is_none() {
        return None;
    }
    serde_json::from_value(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_profile_rejects_empty_payload() {
        assert!(parse_profile(serde_json::json!({})).is_none());
    }

    #[test]
    fn test_parse_profile_reads_finnhub_fields() {
        let profile = parse_profile(serde_json::json!({
            "name": "Apple Inc",
            "country": "US",
            "currency": "USD",
            "exchange": "NASDAQ",
            "finnhubIndustry": "Technology",
            "logo": "https://example.com/logo.png",
            "marketCapitalization": 2500000.0
        }))
        .unwrap();

        assert_eq!(profile.name.as_deref(), Some("Apple Inc"));
        assert_eq!(profile.industry.as_deref(), Some("Technology"));
        assert_eq!(profile.market_cap, Some(2500000.0));
    }
}
