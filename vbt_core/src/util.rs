//! Frame period helpers.

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;
/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Frame period in microseconds for a given rate.
/// - Clamps `fps` to at least 1 to avoid division by zero.
/// - Ensures result is at least 1 microsecond.
#[inline]
pub fn period_us(fps: u32) -> u64 {
    (MICROS_PER_SEC / u64::from(fps.max(1))).max(1)
}

/// Frame period in milliseconds, at least 1.
#[inline]
pub fn period_ms(fps: u32) -> u64 {
    (MILLIS_PER_SEC / u64::from(fps.max(1))).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periods_clamp() {
        assert_eq!(period_ms(30), 33);
        assert_eq!(period_ms(0), 1000);
        assert_eq!(period_ms(5000), 1);
        assert_eq!(period_us(30), 33_333);
    }
}
