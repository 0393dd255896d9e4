use cdt_core::derive_substream_seed;

const ACCEPTANCE_STREAM: u64 = 0;
const EXECUTOR_STREAM: u64 = 1;

/// Seed of the stream feeding kind selection and acceptance draws.
pub fn acceptance_seed(master_seed: u64) -> u64 {
    derive_substream_seed(master_seed, ACCEPTANCE_STREAM)
}

/// Seed of the stream an executor uses to choose elements.
pub fn executor_seed(master_seed: u64) -> u64 {
    derive_substream_seed(master_seed, EXECUTOR_STREAM)
}
