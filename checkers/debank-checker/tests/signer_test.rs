use debank_checker::error::CheckerError;
use debank_checker::signer::{
    canonical_query, NativeSigner, ParamGenerator, PooledSigner, SignType, Signer,
};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn map(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap_or_default()
}

const NONCE: &str = "n_abcdefghijklmnopqrstuvwxyz0123456789abcd";
const TS: &str = "1700000000000000000";

#[test]
fn test_key_order_does_not_change_signature() {
    let signer = NativeSigner::new(SignType::Regular);

    let a = canonical_query(&map(json!({"user_addr": "0xabc", "chain": "eth"})));
    let b = canonical_query(&map(json!({"chain": "eth", "user_addr": "0xabc"})));
    assert_eq!(a, b);

    let sig_a = signer
        .make_signature("GET", "/token/balance_list", &a, NONCE, TS)
        .unwrap();
    let sig_b = signer
        .make_signature("GET", "/token/balance_list", &b, NONCE, TS)
        .unwrap();
    assert_eq!(sig_a, sig_b);
    assert_eq!(sig_a.len(), 64);
    assert!(sig_a.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_every_input_is_bound() {
    let signer = NativeSigner::new(SignType::Regular);
    let query = "id=0xabc";
    let base = signer.make_signature("GET", "/user", query, NONCE, TS).unwrap();

    let variants = [
        signer.make_signature("POST", "/user", query, NONCE, TS).unwrap(),
        signer.make_signature("GET", "/user/used_chains", query, NONCE, TS).unwrap(),
        signer.make_signature("GET", "/user", "id=0xabd", NONCE, TS).unwrap(),
        signer.make_signature("GET", "/user", query, "n_other", TS).unwrap(),
        signer.make_signature("GET", "/user", query, NONCE, "1700000000000000001").unwrap(),
    ];
    for sig in variants {
        assert_ne!(sig, base);
    }
}

#[test]
fn test_native_and_pooled_agree() {
    let native = NativeSigner::new(SignType::Regular);
    let pooled = PooledSigner::new(SignType::Regular, 2);

    let query = canonical_query(&map(json!({"user_addr": "0xabc"})));
    let a = native
        .make_signature("GET", "/portfolio/project_list", &query, NONCE, TS)
        .unwrap();
    let b = pooled
        .make_signature("GET", "/portfolio/project_list", &query, NONCE, TS)
        .unwrap();
    assert_eq!(a, b);
    assert_eq!(pooled.idle(), 2);
}

#[test]
fn test_nonce_prefix_follows_sign_type() {
    let regular = NativeSigner::with_seed(SignType::Regular, 7);
    let secondary = PooledSigner::new(SignType::Secondary, 1);

    let n = regular.generate_nonce().unwrap();
    assert!(n.starts_with("n_"));
    assert_eq!(n.len(), 42);

    let n = secondary.generate_nonce().unwrap();
    assert!(n.starts_with("nc_"));
    assert_eq!(n.len(), 43);
    assert!(n[3..]
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
}

#[test]
fn test_pooled_signer_concurrent_use() {
    let pooled = Arc::new(PooledSigner::new(SignType::Regular, 2));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pooled = Arc::clone(&pooled);
            std::thread::spawn(move || {
                let mut nonces = Vec::new();
                for _ in 0..20 {
                    nonces.push(pooled.generate_nonce().unwrap());
                    pooled
                        .make_signature("GET", "/user", "id=0x1", NONCE, TS)
                        .unwrap();
                }
                nonces
            })
        })
        .collect();
    let mut seen = std::collections::HashSet::new();
    for h in handles {
        seen.extend(h.join().unwrap());
    }

    // No nonce repeats across instances or calls
    assert_eq!(seen.len(), 160);
    assert!(pooled.idle() <= 2);
}

/// Records what the generator hands to the signer.
#[derive(Default)]
struct RecordingSigner {
    seen: Mutex<Vec<(String, String, String)>>,
}

impl Signer for RecordingSigner {
    fn generate_nonce(&self) -> Result<String, CheckerError> {
        Ok("n_fixed".to_string())
    }

    fn make_signature(
        &self,
        method: &str,
        path: &str,
        query: &str,
        _nonce: &str,
        _timestamp: &str,
    ) -> Result<String, CheckerError> {
        self.seen
            .lock()
            .push((method.to_string(), path.to_string(), query.to_string()));
        Ok("sig".to_string())
    }
}

#[test]
fn test_generator_uppercases_method_and_canonicalizes() {
    let recorder = Arc::new(RecordingSigner::default());
    let generator = ParamGenerator::new(recorder.clone());

    let params = generator
        .generate(
            &map(json!({"user_addr": "0xabc", "chain": "bsc"})),
            "get",
            "/token/balance_list",
        )
        .unwrap();

    assert_eq!(params.nonce, "n_fixed");
    assert_eq!(params.signature, "sig");
    assert!(params.timestamp.parse::<u128>().unwrap() > 0);

    let seen = recorder.seen.lock();
    assert_eq!(
        seen[0],
        (
            "GET".to_string(),
            "/token/balance_list".to_string(),
            "chain=bsc&user_addr=0xabc".to_string()
        )
    );
}
