use super::native::NonceLcg;
use super::{sign, unix_nanos, SignType, Signer};
use crate::error::CheckerError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

const NONCE_LEN: usize = 40;

/// One isolated signer with its own generator, seeded once at creation.
#[derive(Debug)]
struct SignerInstance {
    id: usize,
    lcg: NonceLcg,
}

impl SignerInstance {
    fn new(id: usize, seed: u64) -> Self {
        Self {
            id,
            lcg: NonceLcg::new(seed ^ id as u64),
        }
    }

    fn nonce(&mut self) -> String {
        self.lcg.next_token(NONCE_LEN)
    }
}

/// Pool of isolated signing instances.
///
/// Checkout never blocks: an idle instance is reused when available,
/// otherwise a new one is created. On return an instance goes back to the
/// pool unless the pool is already at capacity, in which case it is dropped.
pub struct PooledSigner {
    sign_type: SignType,
    capacity: usize,
    seed: u64,
    idle: Mutex<Vec<SignerInstance>>,
    next_id: AtomicUsize,
    created: AtomicUsize,
    active: AtomicUsize,
}

impl PooledSigner {
    pub fn new(sign_type: SignType, pool_size: usize) -> Self {
        Self::with_seed(sign_type, pool_size, unix_nanos() as u64)
    }

    /// Instance `n` draws from an LCG seeded with `seed ^ n`.
    pub fn with_seed(sign_type: SignType, pool_size: usize, seed: u64) -> Self {
        let capacity = pool_size.max(1);
        let signer = Self {
            sign_type,
            capacity,
            seed,
            idle: Mutex::new(Vec::with_capacity(capacity)),
            next_id: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
        };

        let warm: Vec<SignerInstance> = (0..capacity).map(|_| signer.create()).collect();
        *signer.idle.lock() = warm;
        debug!("[SIGNER] Pool initialized with {} instances", capacity);
        signer
    }

    fn create(&self) -> SignerInstance {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.created.fetch_add(1, Ordering::Relaxed);
        let active = self.active.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("[SIGNER] Created instance #{} (active: {})", id, active);
        SignerInstance::new(id, self.seed)
    }

    fn checkout(&self) -> SignerInstance {
        let pooled = self.idle.lock().pop();
        pooled.unwrap_or_else(|| self.create())
    }

    fn release(&self, instance: SignerInstance) {
        let mut idle = self.idle.lock();
        if idle.len() < self.capacity {
            idle.push(instance);
        } else {
            drop(idle);
            let active = self.active.fetch_sub(1, Ordering::Relaxed) - 1;
            debug!("[SIGNER] Pool full, discarded instance #{} (active: {})", instance.id, active);
        }
    }

    /// Instances created over the pool's lifetime.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Instances alive right now, idle or checked out.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }
}

impl Signer for PooledSigner {
    fn generate_nonce(&self) -> Result<String, CheckerError> {
        let mut instance = self.checkout();
        let token = instance.nonce();
        self.release(instance);
        Ok(format!("{}{}", self.sign_type.nonce_prefix(), token))
    }

    fn make_signature(
        &self,
        method: &str,
        path: &str,
        query: &str,
        nonce: &str,
        timestamp: &str,
    ) -> Result<String, CheckerError> {
        let instance = self.checkout();
        let signature = sign(method, path, query, nonce, timestamp);
        self.release(instance);
        Ok(signature)
    }
}
