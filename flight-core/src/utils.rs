pub fn ms_to_us(ms: u32) -> u64 {
    ms as u64 * 1_000
}

pub fn us_to_s(us: u64) -> f32 {
    us as f32 / 1_000_000.0
}

/// `now - since` in microseconds, zero if the clock went backwards.
pub fn elapsed_us(now_us: u64, since_us: u64) -> u64 {
    now_us.saturating_sub(since_us)
}
