//! Deterministic random streams derived from a single world seed.
//!
//! Every consumer of randomness (position searches, each spawner, each air
//! drop) draws from its own labelled stream so that adding a consumer never
//! shifts the numbers another consumer sees.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// Label of the stream used for host-side position searches.
pub const POSITION_STREAM: &str = "position";
/// Label prefix of the streams used by horde spawners.
pub const SPAWNER_STREAM: &str = "spawner";
/// Label prefix of the streams used by air-drop sequencers.
pub const AIR_DROP_STREAM: &str = "air-drop";

/// Derives a child seed from a base seed and a textual label.
#[must_use]
pub fn derive_labeled_seed(base: u64, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(base.to_le_bytes());
    hasher.update(label.as_bytes());
    finalize_seed(hasher)
}

/// Derives a child seed for a labelled stream owned by a numbered instance.
#[must_use]
pub fn derive_instance_seed(base: u64, label: &str, instance: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(base.to_le_bytes());
    hasher.update(label.as_bytes());
    hasher.update(instance.to_le_bytes());
    finalize_seed(hasher)
}

/// Creates the random stream identified by `label`.
#[must_use]
pub fn stream(world_seed: u64, label: &str) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(derive_labeled_seed(world_seed, label))
}

/// Creates the random stream identified by `label` for a numbered instance.
#[must_use]
pub fn instance_stream(world_seed: u64, label: &str, instance: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(derive_instance_seed(world_seed, label, instance))
}

fn finalize_seed(hasher: Sha256) -> u64 {
    let digest = hasher.finalize();
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
