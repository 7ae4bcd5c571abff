mod index;
mod sort;

// Small deterministic generator for shuffled test inputs.
pub(crate) fn lcg_step(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    *state >> 16
}
