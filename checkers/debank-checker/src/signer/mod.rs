//! Request signing.
//!
//! Every API call carries three headers derived here: `x-api-nonce`,
//! `x-api-sign` and `x-api-ts`. The signature binds the upper-cased method,
//! the path, the canonical query string, the nonce and the timestamp.
//!
//! Two interchangeable [`Signer`] implementations exist:
//!
//! - [`NativeSigner`]: one lock-protected generator
//! - [`PooledSigner`]: a pool of isolated instances checked out per call
//!
//! Both produce identical signatures for identical inputs.

mod native;
mod pooled;

pub use native::{NativeSigner, NonceLcg};
pub use pooled::PooledSigner;

use crate::config::{SignerConfig, SignerKind};
use crate::error::CheckerError;
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Nonce flavour. Changes only the prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignType {
    #[default]
    Regular,
    Secondary,
}

impl SignType {
    pub fn nonce_prefix(&self) -> &'static str {
        match self {
            SignType::Regular => "n_",
            SignType::Secondary => "nc_",
        }
    }
}

/// Produces nonces and signatures. Implementations must be safe to call
/// from many workers at once.
pub trait Signer: Send + Sync {
    fn generate_nonce(&self) -> Result<String, CheckerError>;

    fn make_signature(
        &self,
        method: &str,
        path: &str,
        query: &str,
        nonce: &str,
        timestamp: &str,
    ) -> Result<String, CheckerError>;
}

/// Builds the signer selected in `[signer]`.
pub fn from_config(config: &SignerConfig) -> Arc<dyn Signer> {
    match config.kind {
        SignerKind::Native => Arc::new(NativeSigner::new(config.sign_type)),
        SignerKind::Pooled => Arc::new(PooledSigner::new(config.sign_type, config.pool_size)),
    }
}

/// Signature fields for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParams {
    pub nonce: String,
    pub signature: String,
    pub timestamp: String,
}

/// Turns a payload into [`RequestParams`] using any [`Signer`].
#[derive(Clone)]
pub struct ParamGenerator {
    signer: Arc<dyn Signer>,
}

impl ParamGenerator {
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self { signer }
    }

    pub fn generate(
        &self,
        payload: &Map<String, Value>,
        method: &str,
        path: &str,
    ) -> Result<RequestParams, CheckerError> {
        let nonce = self.signer.generate_nonce()?;
        let timestamp = unix_nanos().to_string();
        let method = method.to_ascii_uppercase();
        let query = canonical_query(payload);

        let signature = self
            .signer
            .make_signature(&method, path, &query, &nonce, &timestamp)?;

        Ok(RequestParams {
            nonce,
            signature,
            timestamp,
        })
    }
}

/// `key=value` pairs joined by `&`, keys ascending.
///
/// Strings are used raw, numbers and booleans through their display form,
/// `null` becomes empty and nested values are compact JSON.
pub fn canonical_query(payload: &Map<String, Value>) -> String {
    let mut keys: Vec<&String> = payload.keys().collect();
    keys.sort();

    keys.into_iter()
        .map(|key| {
            let value = match &payload[key] {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                nested => nested.to_string(),
            };
            format!("{}={}", key, value)
        })
        .collect::<Vec<_>>()
        .join("&")
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Keyed double SHA-256 with 64-byte ipad/opad blocks. Both inputs are
/// already hex digests.
pub(crate) fn compose_signature(key: &str, message: &str) -> String {
    const BLOCK: usize = 64;

    let mut block = [0u8; BLOCK];
    let key = key.as_bytes();
    if key.len() > BLOCK {
        block[..32].copy_from_slice(&Sha256::digest(key));
    } else {
        block[..key.len()].copy_from_slice(key);
    }

    let mut inner = Sha256::new();
    inner.update(block.map(|b| b ^ 0x36));
    inner.update(message.as_bytes());
    let inner = inner.finalize();

    let mut outer = Sha256::new();
    outer.update(block.map(|b| b ^ 0x5c));
    outer.update(inner);
    hex::encode(outer.finalize())
}

/// Signature over already-canonical inputs. Shared by both signers.
pub(crate) fn sign(method: &str, path: &str, query: &str, nonce: &str, ts: &str) -> String {
    let key = sha256_hex(format!("debank-api\n{}\n{}", nonce, ts).as_bytes());
    let message = sha256_hex(format!("{}\n{}\n{}", method, path, query).as_bytes());
    compose_signature(&key, &message)
}

/// Lower-case hex id of `len` characters.
pub fn random_id(len: usize) -> String {
    let bytes: Vec<u8> = (0..len.div_ceil(2)).map(|_| rand::random::<u8>()).collect();
    let mut id = hex::encode(bytes);
    id.truncate(len);
    id
}

pub(crate) fn unix_nanos() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_canonical_query_sorts_and_stringifies() {
        let payload = map(json!({
            "user_addr": "0xabc",
            "chain": "eth",
            "limit": 20,
            "flag": true,
            "none": null,
            "nested": {"a": 1}
        }));
        assert_eq!(
            canonical_query(&payload),
            r#"chain=eth&flag=true&limit=20&nested={"a":1}&none=&user_addr=0xabc"#
        );
    }

    #[test]
    fn test_compose_signature_is_hmac_sha256() {
        // RFC 4231 test case 2
        let mac = compose_signature("Jefe", "what do ya want for nothing?");
        assert_eq!(
            mac,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_random_id_length() {
        assert_eq!(random_id(32).len(), 32);
        assert_eq!(random_id(7).len(), 7);
        assert!(random_id(32).chars().all(|c| c.is_ascii_hexdigit()));
    }
}
