use moka::future::Cache;

use crate::config::Lang;

/// In-memory translation memo using moka.
///
/// Repeated source strings within a run (page headers, footers, boilerplate)
/// resolve from here instead of hitting the backend again. Entries live for
/// the lifetime of the process; fallback results from failed items are
/// deliberately never inserted.
pub struct TranslationMemo {
    cache: Cache<String, String>,
}

/// Bounded at a generous number of distinct strings per run.
const MEMO_MAX_ENTRIES: u64 = 10_000;

impl TranslationMemo {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().max_capacity(MEMO_MAX_ENTRIES).build(),
        }
    }

    /// Opaque fixed-length key over all inputs that affect the result.
    fn key(text: &str, source: &Lang, target: &Lang) -> String {
        // Null separators prevent collisions between ("a","bc") and ("ab","c")
        let combined = format!("{}\0{}\0{}", source.as_str(), target.as_str(), text);
        format!("{:x}", md5::compute(combined.as_bytes()))
    }

    pub async fn get(&self, text: &str, source: &Lang, target: &Lang) -> Option<String> {
        self.cache.get(&Self::key(text, source, target)).await
    }

    pub async fn insert(&self, text: &str, source: &Lang, target: &Lang, translation: String) {
        self.cache
            .insert(Self::key(text, source, target), translation)
            .await;
    }
}

impl Default for TranslationMemo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memo_roundtrip() {
        let memo = TranslationMemo::new();
        let (en, hi) = (Lang::new("en"), Lang::new("hi"));

        assert!(memo.get("hello", &en, &hi).await.is_none());
        memo.insert("hello", &en, &hi, "namaste".to_string()).await;
        assert_eq!(memo.get("hello", &en, &hi).await.as_deref(), Some("namaste"));
    }

    #[tokio::test]
    async fn test_memo_distinguishes_language_pairs() {
        let memo = TranslationMemo::new();
        let (en, hi, fr) = (Lang::new("en"), Lang::new("hi"), Lang::new("fr"));

        memo.insert("hello", &en, &hi, "namaste".to_string()).await;
        assert!(memo.get("hello", &en, &fr).await.is_none());
    }
}
