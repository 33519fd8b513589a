//! Order records and the encrypted order-token codec.
//!
//! There is no server side order storage. The complete order metadata is
//! sealed into an opaque token that the user keeps in their URL; presenting
//! the token back is the only way to look an order up again.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Swap metadata sealed into an order token.
///
/// Field names are shortened to single letters on the wire to keep the
/// resulting token short enough for a URL path segment.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Order {
    #[serde(rename = "d")]
    pub deposit_address: String,
    #[serde(rename = "m", default, skip_serializing_if = "String::is_empty")]
    pub deposit_memo: String,
    #[serde(rename = "f")]
    pub from_ticker: String,
    #[serde(rename = "fn")]
    pub from_network: String,
    #[serde(rename = "t")]
    pub to_ticker: String,
    #[serde(rename = "tn")]
    pub to_network: String,
    #[serde(rename = "ai")]
    pub amount_in: String,
    #[serde(rename = "ao")]
    pub amount_out: String,
    /// RFC 3339 UTC deadline after which the upstream refunds the deposit.
    #[serde(rename = "dl")]
    pub deadline: String,
    #[serde(rename = "c")]
    pub correlation_id: String,
    #[serde(rename = "rf", default, skip_serializing_if = "Option::is_none")]
    pub refund_address: Option<String>,
    #[serde(rename = "rx", default, skip_serializing_if = "Option::is_none")]
    pub receive_address: Option<String>,
}

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Returned for every decode failure. Callers must not be able to tell a
/// base64 error from an authentication failure.
#[derive(Debug, Error)]
#[error("invalid or expired order token")]
pub struct InvalidToken;

#[derive(Debug, Error)]
#[error("failed to seal order token")]
pub struct SealError;

/// AES-256-GCM codec turning an [`Order`] into a URL safe token and back.
///
/// Token layout: `iv(12) || ciphertext || tag(16)`, base64url without padding.
#[derive(Clone)]
pub struct OrderCodec {
    cipher: Aes256Gcm,
}

impl OrderCodec {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self {
            cipher: Aes256Gcm::new(&key.into()),
        }
    }

    /// Creates a codec from the configured hex secret. A missing secret is
    /// tolerated but downgrades to a random key, meaning previously issued
    /// tokens become unreadable after a restart.
    pub fn from_hex_secret(secret: Option<&str>) -> anyhow::Result<Self> {
        let secret = match secret {
            Some(secret) => secret,
            None => {
                tracing::warn!(
                    "order secret not configured; using an ephemeral random key, \
                     order tokens will not survive a restart"
                );
                let mut key = [0u8; KEY_LEN];
                OsRng.fill_bytes(&mut key);
                return Ok(Self::new(key));
            }
        };
        let bytes = hex::decode(secret)?;
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("order secret must be a 64 character hex string"))?;
        Ok(Self::new(key))
    }

    pub fn encode(&self, order: &Order) -> Result<String, SealError> {
        let plaintext = serde_json::to_vec(order).map_err(|_| SealError)?;
        let mut iv = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut iv);
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.as_slice())
            .map_err(|_| SealError)?;
        let mut packed = Vec::with_capacity(NONCE_LEN + sealed.len());
        packed.extend_from_slice(&iv);
        packed.extend_from_slice(&sealed);
        Ok(URL_SAFE_NO_PAD.encode(packed))
    }

    pub fn decode(&self, token: &str) -> Result<Order, InvalidToken> {
        let packed = URL_SAFE_NO_PAD.decode(token).map_err(|err| {
            tracing::debug!(?err, "order token is not valid base64url");
            InvalidToken
        })?;
        if packed.len() < NONCE_LEN + TAG_LEN {
            tracing::debug!(len = packed.len(), "order token too short");
            return Err(InvalidToken);
        }
        let (iv, ciphertext) = packed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(iv), ciphertext)
            .map_err(|_| {
                tracing::debug!("order token failed to authenticate");
                InvalidToken
            })?;
        serde_json::from_slice(&plaintext).map_err(|err| {
            tracing::debug!(?err, "order token payload is not a valid order");
            InvalidToken
        })
    }
}
