//! Fixed-width latency histogram.
//!
//! Buckets are not evenly spaced: boundary `n` is `floor(1000 * 1.5^n)`
//! microseconds for `n` in `[0, 22]`, giving finer resolution near the
//! common case and coarser resolution in the tail. `pop_latencies` in the
//! metrics storage reports this as a flat 23-element count array per split.

const BUCKET_COUNT: usize = 23;

fn boundaries() -> [u64; BUCKET_COUNT] {
    let mut out = [0u64; BUCKET_COUNT];
    let mut factor = 1.0f64;
    for (n, slot) in out.iter_mut().enumerate() {
        *slot = (1000.0 * factor) as u64;
        factor *= 1.5;
        let _ = n;
    }
    out
}

/// Map a latency, in microseconds, to its bucket index `[0, 22]`. Anything
/// at or above the last boundary lands in the final bucket (no overflow
/// bucket — the tail just saturates).
pub fn bucket_for_micros(latency_us: u64) -> usize {
    let bounds = boundaries();
    for (i, bound) in bounds.iter().enumerate() {
        if latency_us <= *bound {
            return i;
        }
    }
    BUCKET_COUNT - 1
}

pub fn bucket_count() -> usize {
    BUCKET_COUNT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_boundary_is_1000us() {
        assert_eq!(boundaries()[0], 1000);
    }

    #[test]
    fn boundaries_are_strictly_increasing() {
        let bounds = boundaries();
        for w in bounds.windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[test]
    fn zero_latency_falls_in_first_bucket() {
        assert_eq!(bucket_for_micros(0), 0);
    }

    #[test]
    fn huge_latency_saturates_last_bucket() {
        assert_eq!(bucket_for_micros(u64::MAX), BUCKET_COUNT - 1);
    }

    #[test]
    fn latency_at_a_boundary_falls_in_that_bucket() {
        let bounds = boundaries();
        assert_eq!(bucket_for_micros(bounds[5]), 5);
        assert_eq!(bucket_for_micros(bounds[5] + 1), 6);
    }
}
