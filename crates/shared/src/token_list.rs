//! TTL bounded snapshot of the swappable token universe.
//!
//! A refresh replaces the snapshot wholesale; readers always observe a
//! complete snapshot. When a refresh fails and a previous snapshot exists,
//! the stale data keeps being served.

use crate::oneclick_api::{OneClickApi, OneClickError};
use model::token::TokenInfo;
use serde::Serialize;
use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(5 * 60);

/// Maps upstream blockchain codes to display names.
const CHAIN_DISPLAY_NAMES: &[(&str, &str)] = &[
    ("eth", "Ethereum"),
    ("btc", "Bitcoin"),
    ("sol", "Solana"),
    ("base", "Base"),
    ("arb", "Arbitrum"),
    ("ton", "TON"),
    ("tron", "TRON"),
    ("bsc", "BNB Chain"),
    ("pol", "Polygon"),
    ("op", "Optimism"),
    ("avax", "Avalanche"),
    ("near", "NEAR"),
    ("sui", "Sui"),
    ("apt", "Aptos"),
    ("aptos", "Aptos"),
    ("doge", "Dogecoin"),
    ("ltc", "Litecoin"),
    ("xrp", "XRP"),
    ("bch", "Bitcoin Cash"),
    ("xlm", "Stellar"),
    ("stellar", "Stellar"),
    ("zec", "Zcash"),
    ("cardano", "Cardano"),
    ("starknet", "StarkNet"),
    ("gnosis", "Gnosis"),
    ("bera", "Berachain"),
    ("monad", "Monad"),
    ("plasma", "Plasma"),
    ("xlayer", "X Layer"),
    ("aleo", "Aleo"),
    ("adi", "ADI"),
];

/// Networks listed here come first in the grouped view, in this order.
/// Everything else follows alphabetically.
const NETWORK_ORDER: &[&str] = &[
    "Ethereum",
    "Bitcoin",
    "Solana",
    "Base",
    "Arbitrum",
    "TON",
    "TRON",
    "BNB Chain",
    "Polygon",
    "Optimism",
    "Avalanche",
    "NEAR",
];

pub fn chain_display_name(code: &str) -> Option<&'static str> {
    CHAIN_DISPLAY_NAMES
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(code))
        .map(|(_, name)| *name)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkGroup {
    pub name: String,
    pub tokens: Vec<TokenInfo>,
}

#[derive(Default)]
struct Snapshot {
    tokens: Vec<TokenInfo>,
    by_asset_id: HashMap<String, usize>,
    networks: Vec<NetworkGroup>,
    updated_at: Option<Instant>,
}

pub struct TokenCache {
    api: Arc<dyn OneClickApi>,
    max_age: Duration,
    snapshot: RwLock<Snapshot>,
}

impl TokenCache {
    pub fn new(api: Arc<dyn OneClickApi>, max_age: Duration) -> Self {
        Self {
            api,
            max_age,
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    /// Fetches the token list and atomically replaces the snapshot.
    pub async fn refresh(&self) -> Result<(), OneClickError> {
        let tokens = self.api.tokens().await?;
        let snapshot = build_snapshot(tokens);
        tracing::info!(
            tokens = snapshot.tokens.len(),
            networks = snapshot.networks.len(),
            "token cache refreshed"
        );
        *self.snapshot.write().unwrap() = snapshot;
        Ok(())
    }

    async fn ensure_fresh(&self) -> Result<(), OneClickError> {
        {
            let snapshot = self.snapshot.read().unwrap();
            let fresh = snapshot
                .updated_at
                .is_some_and(|at| at.elapsed() < self.max_age);
            if fresh && !snapshot.tokens.is_empty() {
                return Ok(());
            }
        }
        match self.refresh().await {
            Ok(()) => Ok(()),
            Err(err) => {
                let snapshot = self.snapshot.read().unwrap();
                if snapshot.tokens.is_empty() {
                    Err(err)
                } else {
                    tracing::warn!(?err, "token refresh failed, serving stale snapshot");
                    Ok(())
                }
            }
        }
    }

    /// The current token universe, refreshed when older than the max age.
    pub async fn all(&self) -> Result<Vec<TokenInfo>, OneClickError> {
        self.ensure_fresh().await?;
        Ok(self.snapshot.read().unwrap().tokens.clone())
    }

    /// Tokens grouped by display network, refreshed when stale.
    pub async fn network_groups(&self) -> Result<Vec<NetworkGroup>, OneClickError> {
        self.ensure_fresh().await?;
        Ok(self.snapshot.read().unwrap().networks.clone())
    }

    /// Looks a token up by ticker, optionally constrained to a chain.
    /// An exact blockchain match wins; only when none exists does the
    /// asset-id substring heuristic apply (some assets carry no blockchain
    /// field but are still identified by a chain prefixed id).
    pub fn find_by_ticker_and_chain(&self, ticker: &str, chain: Option<&str>) -> Option<TokenInfo> {
        let snapshot = self.snapshot.read().unwrap();
        let chain = chain.map(str::trim).filter(|chain| !chain.is_empty());
        let by_ticker = |token: &&TokenInfo| token.ticker.eq_ignore_ascii_case(ticker);

        let chain = match chain {
            Some(chain) => chain.to_lowercase(),
            None => {
                return snapshot.tokens.iter().find(by_ticker).cloned();
            }
        };
        snapshot
            .tokens
            .iter()
            .find(|token| by_ticker(token) && token.blockchain.eq_ignore_ascii_case(&chain))
            .or_else(|| {
                snapshot
                    .tokens
                    .iter()
                    .find(|token| by_ticker(token) && token.asset_id.to_lowercase().contains(&chain))
            })
            .cloned()
    }

    pub fn find_by_asset_id(&self, asset_id: &str) -> Option<TokenInfo> {
        let snapshot = self.snapshot.read().unwrap();
        snapshot
            .by_asset_id
            .get(asset_id)
            .map(|&index| snapshot.tokens[index].clone())
    }

    /// Case insensitive substring search over ticker, name and display chain
    /// name, in snapshot order.
    pub fn search(&self, query: &str) -> Vec<TokenInfo> {
        let snapshot = self.snapshot.read().unwrap();
        if query.is_empty() {
            return snapshot.tokens.clone();
        }
        let query = query.to_lowercase();
        snapshot
            .tokens
            .iter()
            .filter(|token| {
                let chain =
                    chain_display_name(&token.blockchain).unwrap_or(token.blockchain.as_str());
                token.ticker.to_lowercase().contains(&query)
                    || token.name.to_lowercase().contains(&query)
                    || chain.to_lowercase().contains(&query)
            })
            .cloned()
            .collect()
    }

    /// Keeps the snapshot fresh for the rest of the process. The initial
    /// load is expected to have been attempted already.
    pub fn spawn_maintenance_task(self: &Arc<Self>, period: Duration) {
        let cache = Arc::clone(self);
        tokio::task::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(err) = cache.refresh().await {
                    tracing::warn!(?err, "token cache refresh failed");
                }
            }
        });
    }
}

/// Filters grouped tokens by a search query over ticker, name and group
/// name. Groups left empty are dropped.
pub fn filter_networks(networks: Vec<NetworkGroup>, query: &str) -> Vec<NetworkGroup> {
    let query = query.to_lowercase();
    networks
        .into_iter()
        .filter_map(|group| {
            let group_matches = group.name.to_lowercase().contains(&query);
            let tokens: Vec<_> = group
                .tokens
                .into_iter()
                .filter(|token| {
                    group_matches
                        || token.ticker.to_lowercase().contains(&query)
                        || token.name.to_lowercase().contains(&query)
                })
                .collect();
            (!tokens.is_empty()).then_some(NetworkGroup {
                name: group.name,
                tokens,
            })
        })
        .collect()
}

fn build_snapshot(mut tokens: Vec<TokenInfo>) -> Snapshot {
    for token in &mut tokens {
        if token.ticker.is_empty() && !token.symbol.is_empty() {
            token.ticker = token.symbol.clone();
        }
        token.ticker = token.ticker.to_uppercase();
    }

    let mut by_asset_id = HashMap::with_capacity(tokens.len());
    let mut grouped: HashMap<String, Vec<TokenInfo>> = HashMap::new();
    for (index, token) in tokens.iter().enumerate() {
        by_asset_id.insert(token.asset_id.clone(), index);

        let network = match chain_display_name(&token.blockchain) {
            Some(name) => name.to_string(),
            None if token.blockchain.is_empty() => "Other".to_string(),
            None => token.blockchain.clone(),
        };
        grouped.entry(network).or_default().push(token.clone());
    }

    let mut networks: Vec<NetworkGroup> = grouped
        .into_iter()
        .map(|(name, mut tokens)| {
            tokens.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(Ordering::Equal));
            NetworkGroup { name, tokens }
        })
        .collect();
    networks.sort_by(|a, b| {
        let rank = |group: &NetworkGroup| NETWORK_ORDER.iter().position(|n| *n == group.name);
        match (rank(a), rank(b)) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.name.cmp(&b.name),
        }
    });

    Snapshot {
        tokens,
        by_asset_id,
        networks,
        updated_at: Some(Instant::now()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oneclick_api::MockOneClickApi;
    use reqwest::StatusCode;

    fn token(ticker: &str, blockchain: &str, asset_id: &str, price: f64) -> TokenInfo {
        TokenInfo {
            asset_id: asset_id.to_string(),
            ticker: ticker.to_string(),
            name: format!("{ticker} token"),
            decimals: 18,
            blockchain: blockchain.to_string(),
            price,
            ..Default::default()
        }
    }

    fn universe() -> Vec<TokenInfo> {
        vec![
            token("ETH", "eth", "nep141:eth.omft.near", 1830.0),
            TokenInfo {
                // Empty ticker is backfilled from the symbol.
                symbol: "usdc".to_string(),
                ..token("", "eth", "nep141:usdc.near", 1.0)
            },
            token("SOL", "sol", "nep141:sol.omft.near", 160.0),
            token("USDT", "arb", "arb:usdt-arb.near", 1.0),
            token("USDT", "eth", "nep141:usdt.tether-token.near", 1.0),
            token("USDT", "", "tron:usdt-tron.near", 1.0),
            token("FOO", "sei", "sei:foo.near", 0.5),
        ]
    }

    fn failed() -> OneClickError {
        OneClickError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: String::new(),
        }
    }

    async fn cache_with(tokens: Vec<TokenInfo>) -> TokenCache {
        let mut api = MockOneClickApi::new();
        api.expect_tokens().returning(move || Ok(tokens.clone()));
        let cache = TokenCache::new(Arc::new(api), DEFAULT_MAX_AGE);
        cache.refresh().await.unwrap();
        cache
    }

    #[tokio::test]
    async fn normalizes_tickers() {
        let cache = cache_with(universe()).await;
        let usdc = cache.find_by_asset_id("nep141:usdc.near").unwrap();
        assert_eq!(usdc.ticker, "USDC");
    }

    #[tokio::test]
    async fn groups_networks_by_popularity_then_alphabetically() {
        let cache = cache_with(universe()).await;
        let groups = cache.network_groups().await.unwrap();
        let names: Vec<_> = groups.iter().map(|group| group.name.as_str()).collect();
        assert_eq!(names, ["Ethereum", "Solana", "Arbitrum", "Other", "sei"]);

        // Tokens within a group are ordered by descending price.
        let ethereum = &groups[0];
        assert_eq!(ethereum.tokens[0].ticker, "ETH");
    }

    #[tokio::test]
    async fn find_prefers_exact_chain_match() {
        let cache = cache_with(universe()).await;
        let found = cache.find_by_ticker_and_chain("USDT", Some("eth")).unwrap();
        assert_eq!(found.asset_id, "nep141:usdt.tether-token.near");
        let found = cache.find_by_ticker_and_chain("usdt", Some("ARB")).unwrap();
        assert_eq!(found.asset_id, "arb:usdt-arb.near");
    }

    #[tokio::test]
    async fn find_falls_back_to_asset_id_substring() {
        let cache = cache_with(universe()).await;
        let found = cache.find_by_ticker_and_chain("USDT", Some("tron")).unwrap();
        assert_eq!(found.asset_id, "tron:usdt-tron.near");
        assert!(cache.find_by_ticker_and_chain("USDT", Some("btc")).is_none());
    }

    #[tokio::test]
    async fn find_without_chain_returns_first_in_snapshot_order() {
        let cache = cache_with(universe()).await;
        let found = cache.find_by_ticker_and_chain("USDT", None).unwrap();
        assert_eq!(found.asset_id, "arb:usdt-arb.near");
        let found = cache.find_by_ticker_and_chain("USDT", Some("")).unwrap();
        assert_eq!(found.asset_id, "arb:usdt-arb.near");
    }

    #[tokio::test]
    async fn searches_ticker_name_and_display_chain() {
        let cache = cache_with(universe()).await;
        assert_eq!(cache.search("sol").len(), 1);
        assert_eq!(cache.search("USDT token").len(), 3);
        // "sei" has no display mapping; the raw code still matches.
        assert_eq!(cache.search("sei").len(), 1);
        assert_eq!(cache.search("").len(), universe().len());
        // Display name match for the eth blockchain code.
        assert_eq!(cache.search("ethereum").len(), 3);
    }

    #[tokio::test]
    async fn filters_network_groups() {
        let cache = cache_with(universe()).await;
        let groups = cache.network_groups().await.unwrap();

        // A group name match keeps the whole group.
        let filtered = filter_networks(groups.clone(), "solana");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "Solana");

        // A ticker match keeps only the matching tokens.
        let filtered = filter_networks(groups.clone(), "usdt");
        let names: Vec<_> = filtered.iter().map(|group| group.name.as_str()).collect();
        assert_eq!(names, ["Ethereum", "Arbitrum", "Other"]);
        assert!(filtered
            .iter()
            .flat_map(|group| &group.tokens)
            .all(|token| token.ticker == "USDT"));

        assert!(filter_networks(groups, "nomatch").is_empty());
    }

    #[tokio::test]
    async fn serves_stale_snapshot_when_refresh_fails() {
        let mut api = MockOneClickApi::new();
        let mut seq = mockall::Sequence::new();
        api.expect_tokens()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(vec![token("ETH", "eth", "nep141:eth.omft.near", 1830.0)]));
        api.expect_tokens()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(failed()));

        // A zero max age forces a refresh attempt on every read.
        let cache = TokenCache::new(Arc::new(api), Duration::ZERO);
        assert_eq!(cache.all().await.unwrap().len(), 1);
        assert_eq!(cache.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_cache_propagates_refresh_failure() {
        let mut api = MockOneClickApi::new();
        api.expect_tokens().returning(|| Err(failed()));
        let cache = TokenCache::new(Arc::new(api), DEFAULT_MAX_AGE);
        assert!(cache.all().await.is_err());
    }

    #[tokio::test]
    async fn fresh_snapshot_is_served_without_refetching() {
        let mut api = MockOneClickApi::new();
        api.expect_tokens()
            .times(1)
            .returning(|| Ok(vec![token("ETH", "eth", "nep141:eth.omft.near", 1830.0)]));
        let cache = TokenCache::new(Arc::new(api), DEFAULT_MAX_AGE);
        cache.refresh().await.unwrap();
        for _ in 0..3 {
            assert_eq!(cache.all().await.unwrap().len(), 1);
        }
    }
}
