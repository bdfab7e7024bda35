use super::{sign, unix_nanos, SignType, Signer};
use crate::error::CheckerError;
use parking_lot::Mutex;

const NONCE_LEN: usize = 40;
const NONCE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// 64-bit linear congruential generator used for nonce characters.
#[derive(Debug, Clone)]
pub struct NonceLcg {
    state: u64,
}

impl NonceLcg {
    const MULTIPLIER: u64 = 6364136223846793005;
    const INCREMENT: u64 = 1442695040888963407;

    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn from_clock() -> Self {
        Self::new(unix_nanos() as u64)
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT);
        (self.state >> 33) as u32
    }

    /// `len` characters from `[a-z0-9]`.
    pub fn next_token(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| {
                let idx = self.next_u32() as usize % NONCE_ALPHABET.len();
                NONCE_ALPHABET[idx] as char
            })
            .collect()
    }
}

/// Single in-process generator behind a mutex.
pub struct NativeSigner {
    sign_type: SignType,
    lcg: Mutex<NonceLcg>,
}

impl NativeSigner {
    pub fn new(sign_type: SignType) -> Self {
        Self {
            sign_type,
            lcg: Mutex::new(NonceLcg::from_clock()),
        }
    }

    pub fn with_seed(sign_type: SignType, seed: u64) -> Self {
        Self {
            sign_type,
            lcg: Mutex::new(NonceLcg::new(seed)),
        }
    }
}

impl Signer for NativeSigner {
    fn generate_nonce(&self) -> Result<String, CheckerError> {
        let token = self.lcg.lock().next_token(NONCE_LEN);
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
        Ok(sign(method, path, query, nonce, timestamp))
    }
}
