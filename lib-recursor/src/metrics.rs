//! Metrics from a resolution attempt.  The resolver builds this
//! structure rather than updating Prometheus metrics directly, so the
//! core stays free of the exporter.

#[derive(Debug, Default)]
pub struct Metrics {
    /// Questions answered straight from the positive cache.
    pub cache_hits: u64,
    /// Questions which had to consult upstream nameservers.
    pub cache_misses: u64,
    /// Questions cut short by a non-expired negative cache entry.
    pub negative_hits: u64,
    /// Delegation levels where some upstream nameserver produced a
    /// usable response.
    pub nameserver_hits: u64,
    /// Delegation levels where every attempt failed.
    pub nameserver_misses: u64,
    /// CNAME targets this resolution chased.
    pub cname_chases: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub fn cache_miss(&mut self) {
        self.cache_misses += 1;
    }

    pub fn negative_hit(&mut self) {
        self.negative_hits += 1;
    }

    pub fn nameserver_hit(&mut self) {
        self.nameserver_hits += 1;
    }

    pub fn nameserver_miss(&mut self) {
        self.nameserver_misses += 1;
    }

    pub fn cname_chase(&mut self) {
        self.cname_chases += 1;
    }
}
