use core::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::identity::DeviceIdentity;

/// Source of opaque request identifiers for outbound requests.
pub trait RequestIdGenerator: Send + Sync {
    /// Generate a new request identifier
    fn generate(&self) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct RandomRequestIdGenerator;

impl RequestIdGenerator for RandomRequestIdGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic identifiers derived from the device identity and a counter.
pub struct SequentialRequestIdGenerator {
    prefix: [u8; 8],
    counter: AtomicU64,
}

impl SequentialRequestIdGenerator {
    pub fn new(identity: &DeviceIdentity) -> Self {
        let seed = identity
            .client_id()
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
                (acc ^ b as u64).wrapping_mul(0x0100_0000_01b3)
            });

        Self {
            prefix: seed.to_be_bytes(),
            counter: AtomicU64::new(0),
        }
    }
}

impl RequestIdGenerator for SequentialRequestIdGenerator {
    fn generate(&self) -> String {
        let counter = self.counter.fetch_add(1, Ordering::SeqCst);
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&self.prefix);
        bytes[8..16].copy_from_slice(&counter.to_be_bytes());
        Uuid::from_bytes(bytes).to_string()
    }
}

impl Clone for SequentialRequestIdGenerator {
    fn clone(&self) -> Self {
        Self {
            prefix: self.prefix,
            counter: AtomicU64::new(self.counter.load(Ordering::SeqCst)),
        }
    }
}
