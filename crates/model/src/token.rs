//! Token descriptors from the upstream `/v0/tokens` endpoint.

use serde::{Deserialize, Serialize};

/// One swappable asset as reported by the upstream.
///
/// The asset id is the only reliable key; every display field is best effort
/// and normalized by the token cache before use.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub asset_id: String,
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub decimals: u32,
    #[serde(default)]
    pub blockchain: String,
    /// Unit price in USD; 0 means unknown.
    #[serde(default)]
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_upstream_shape() {
        let token: TokenInfo = serde_json::from_value(json!({
            "assetId": "nep141:eth.omft.near",
            "symbol": "ETH",
            "name": "Ether",
            "decimals": 18,
            "blockchain": "eth",
            "price": 1830.11,
            "contractAddress": "0x0000000000000000000000000000000000000000"
        }))
        .unwrap();
        assert_eq!(token.asset_id, "nep141:eth.omft.near");
        assert_eq!(token.ticker, "");
        assert_eq!(token.symbol, "ETH");
        assert_eq!(token.decimals, 18);
    }

    #[test]
    fn missing_optional_fields_default() {
        let token: TokenInfo =
            serde_json::from_value(json!({"assetId": "nep141:wrap.near"})).unwrap();
        assert_eq!(token.decimals, 0);
        assert_eq!(token.price, 0.0);
        assert!(token.contract_address.is_none());
    }
}
