//! Configuration of the query engine.

/// Settings for a [`QueryEngine`][crate::engine::QueryEngine].
///
/// # Examples
///
/// ```
/// use ac_eval::config::QueryConfig;
///
/// let config = QueryConfig::default().with_cache_bits(10);
/// assert!(config.caching);
/// assert_eq!(config.cache_bits, 10);
///
/// let uncached = QueryConfig::default().with_caching(false);
/// assert!(!uncached.caching);
/// ```
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct QueryConfig {
    /// Memoize partials per evidence vector (default: true)
    pub caching: bool,
    /// Initial cache capacity is `2^cache_bits` entries (default: 14)
    pub cache_bits: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            caching: true,
            cache_bits: 14,
        }
    }
}

impl QueryConfig {
    pub fn with_caching(mut self, caching: bool) -> Self {
        self.caching = caching;
        self
    }

    /// # Panics
    ///
    /// Panics if `bits > 31`.
    pub fn with_cache_bits(mut self, bits: usize) -> Self {
        assert!(bits <= 31, "Cache bits should be in the range 0..=31");
        self.cache_bits = bits;
        self
    }
}
