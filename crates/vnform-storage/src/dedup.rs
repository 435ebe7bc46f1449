//! Advisory fast-path pre-check ahead of the authoritative SQLite lookup
//! (§4.1 "Fast-path pre-check"). Grounded on `sg-core::dedup::BloomDedup`:
//! same idea (probabilistic negative, exact-check confirms), rekeyed from
//! chunk hashes to `(url, content_hash)` pairs.
//!
//! A bloom filter can only answer "definitely new" or "maybe seen" — it
//! must never be the sole basis for skipping a crawl-cycle write. Callers
//! are expected to treat a "maybe seen" as "go check the metadata store",
//! never as "definitely seen".

use bloomfilter::Bloom;

const EXPECTED_ITEMS: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.01;

pub struct FastDedupIndex {
    bloom: Bloom<String>,
}

impl FastDedupIndex {
    pub fn new() -> Self {
        FastDedupIndex {
            bloom: Bloom::new_for_fp_rate(EXPECTED_ITEMS, FALSE_POSITIVE_RATE),
        }
    }

    /// Rebuild from the metadata store's full dedup key set, called once at
    /// process start so the fast path is warm before the first crawl cycle.
    pub fn seed(keys: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut index = FastDedupIndex::new();
        for (url, hash) in keys {
            index.bloom.set(&dedup_key(&url, &hash));
        }
        index
    }

    /// `true` means "definitely not seen before" — safe to skip the
    /// authoritative check only when composing a *new-item* decision, never
    /// when composing a *delete/skip* decision in the other direction.
    pub fn definitely_new(&self, url: &str, content_hash: &str) -> bool {
        !self.bloom.check(&dedup_key(url, content_hash))
    }

    pub fn record(&mut self, url: &str, content_hash: &str) {
        self.bloom.set(&dedup_key(url, content_hash));
    }
}

impl Default for FastDedupIndex {
    fn default() -> Self {
        FastDedupIndex::new()
    }
}

fn dedup_key(url: &str, content_hash: &str) -> String {
    format!("{url}\u{0}{content_hash}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseeded_index_reports_everything_as_new() {
        let index = FastDedupIndex::new();
        assert!(index.definitely_new("https://x/mau.pdf", "abc"));
    }

    #[test]
    fn recorded_key_is_no_longer_definitely_new() {
        let mut index = FastDedupIndex::new();
        index.record("https://x/mau.pdf", "abc");
        assert!(!index.definitely_new("https://x/mau.pdf", "abc"));
    }

    #[test]
    fn seeding_from_existing_keys_populates_the_filter() {
        let index = FastDedupIndex::seed(vec![("https://x/mau.pdf".to_string(), "abc".to_string())]);
        assert!(!index.definitely_new("https://x/mau.pdf", "abc"));
        assert!(index.definitely_new("https://x/mau.pdf", "different-hash"));
    }
}
