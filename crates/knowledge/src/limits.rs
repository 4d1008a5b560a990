pub const MAX_RETRIEVAL_CONCURRENCY: usize = 32;

/// Clamp a requested worker count to `1..=MAX_RETRIEVAL_CONCURRENCY`
pub fn clamp_concurrency(requested: usize) -> usize {
    requested.clamp(1, MAX_RETRIEVAL_CONCURRENCY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_concurrency_bounds_worker_count() {
        assert_eq!(clamp_concurrency(0), 1);
        assert_eq!(clamp_concurrency(1), 1);
        assert_eq!(clamp_concurrency(4), 4);
        assert_eq!(clamp_concurrency(999), MAX_RETRIEVAL_CONCURRENCY);
        assert_eq!(clamp_concurrency(usize::MAX), MAX_RETRIEVAL_CONCURRENCY);
    }
}
