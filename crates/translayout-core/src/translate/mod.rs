//! Translation service shared by both rendering strategies.
//!
//! [`RegionTranslator`] wraps a [`TranslationBackend`] with the skip
//! heuristic, batch-call-with-per-item-fallback logic, and an in-memory
//! memo. The raster renderer and the native-PDF renderer both consume it;
//! neither carries its own batching logic.

mod backend;
mod memo;
mod openai;

pub use backend::TranslationBackend;
pub use memo::TranslationMemo;
pub use openai::OpenAiTranslator;

use std::sync::Arc;

use tracing::warn;

use crate::config::{Lang, TranslatorConfig};
use crate::error::Result;

/// Create the default backend from configuration
pub fn create_backend(config: &TranslatorConfig) -> Result<Arc<dyn TranslationBackend>> {
    Ok(Arc::new(OpenAiTranslator::new(config)))
}

/// Batching translation service with skip heuristic and fallback.
///
/// All methods are infallible from the caller's perspective: backend errors
/// degrade to returning source text, never to a missing region.
pub struct RegionTranslator {
    backend: Arc<dyn TranslationBackend>,
    memo: TranslationMemo,
    source: Lang,
    target: Lang,
}

impl RegionTranslator {
    pub fn new(backend: Arc<dyn TranslationBackend>, source: Lang, target: Lang) -> Self {
        Self {
            backend,
            memo: TranslationMemo::new(),
            source,
            target,
        }
    }

    /// Texts too short or purely numeric are not worth a remote call.
    fn should_skip(text: &str) -> bool {
        let stripped = text.trim();
        stripped.chars().count() < 2 || stripped.chars().all(|c| c.is_ascii_digit())
    }

    /// Translate a batch of texts, preserving order and count.
    ///
    /// Skippable items are returned verbatim. The rest go to the backend as
    /// one batch call; if that fails, each item is retried individually and
    /// items that still fail fall back to their source text.
    pub async fn translate_batch(&self, texts: &[String]) -> Vec<String> {
        if texts.is_empty() {
            return Vec::new();
        }

        let mut results: Vec<String> = texts.to_vec();
        let mut pending_indices = Vec::new();
        let mut pending_texts = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            if Self::should_skip(text) {
                continue;
            }
            if let Some(hit) = self.memo.get(text, &self.source, &self.target).await {
                results[i] = hit;
                continue;
            }
            pending_indices.push(i);
            pending_texts.push(text.clone());
        }

        if pending_texts.is_empty() {
            return results;
        }

        match self
            .backend
            .translate_batch(&pending_texts, &self.source, &self.target)
            .await
        {
            Ok(translations) => {
                for (&idx, translation) in pending_indices.iter().zip(translations) {
                    if translation.trim().is_empty() {
                        // Never drop a region's text entirely
                        results[idx] = texts[idx].clone();
                    } else {
                        self.memo
                            .insert(&texts[idx], &self.source, &self.target, translation.clone())
                            .await;
                        results[idx] = translation;
                    }
                }
            }
            Err(e) => {
                warn!("Batch translation failed ({e}), falling back to individual calls");
                self.translate_individually(&pending_indices, &pending_texts, texts, &mut results)
                    .await;
            }
        }

        results
    }

    /// Translate a single string with the same skip/fallback contract.
    pub async fn translate(&self, text: &str) -> String {
        if Self::should_skip(text) {
            return text.to_string();
        }

        if let Some(hit) = self.memo.get(text, &self.source, &self.target).await {
            return hit;
        }

        match self.backend.translate(text, &self.source, &self.target).await {
            Ok(translation) if !translation.trim().is_empty() => {
                self.memo
                    .insert(text, &self.source, &self.target, translation.clone())
                    .await;
                translation
            }
            Ok(_) => text.to_string(),
            Err(e) => {
                warn!("Translation failed for one item ({e}), keeping source text");
                text.to_string()
            }
        }
    }

    /// Fallback path: one backend call per item, in original order.
    async fn translate_individually(
        &self,
        indices: &[usize],
        pending: &[String],
        originals: &[String],
        results: &mut [String],
    ) {
        for (&idx, text) in indices.iter().zip(pending) {
            match self.backend.translate(text, &self.source, &self.target).await {
                Ok(translation) if !translation.trim().is_empty() => {
                    self.memo
                        .insert(text, &self.source, &self.target, translation.clone())
                        .await;
                    results[idx] = translation;
                }
                Ok(_) => results[idx] = originals[idx].clone(),
                Err(_) => results[idx] = originals[idx].clone(),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::Error;

    /// Mock backend with scriptable failure behavior.
    struct MockBackend {
        prefix: &'static str,
        fail_batch: bool,
        fail_all: bool,
        batch_calls: AtomicUsize,
        single_calls: AtomicUsize,
    }

    impl MockBackend {
        fn working() -> Self {
            Self {
                prefix: "tr:",
                fail_batch: false,
                fail_all: false,
                batch_calls: AtomicUsize::new(0),
                single_calls: AtomicUsize::new(0),
            }
        }

        fn batch_failing() -> Self {
            Self {
                fail_batch: true,
                ..Self::working()
            }
        }

        fn fully_failing() -> Self {
            Self {
                fail_batch: true,
                fail_all: true,
                ..Self::working()
            }
        }
    }

    #[async_trait]
    impl TranslationBackend for MockBackend {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn translate_batch(
            &self,
            texts: &[String],
            _source: &Lang,
            _target: &Lang,
        ) -> crate::error::Result<Vec<String>> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_batch {
                return Err(Error::TranslationRequest("batch down".to_string()));
            }
            Ok(texts.iter().map(|t| format!("{}{}", self.prefix, t)).collect())
        }

        async fn translate(
            &self,
            text: &str,
            _source: &Lang,
            _target: &Lang,
        ) -> crate::error::Result<String> {
            self.single_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_all {
                return Err(Error::TranslationRequest("backend down".to_string()));
            }
            Ok(format!("{}{}", self.prefix, text))
        }
    }

    fn service(backend: Arc<MockBackend>) -> RegionTranslator {
        RegionTranslator::new(backend, Lang::new("en"), Lang::new("hi"))
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_skip_heuristic() {
        assert!(RegionTranslator::should_skip(""));
        assert!(RegionTranslator::should_skip(" "));
        assert!(RegionTranslator::should_skip("a"));
        assert!(RegionTranslator::should_skip(" x "));
        assert!(RegionTranslator::should_skip("42"));
        assert!(RegionTranslator::should_skip(" 12345 "));
        assert!(!RegionTranslator::should_skip("ab"));
        assert!(!RegionTranslator::should_skip("4a"));
        assert!(!RegionTranslator::should_skip("hello world"));
    }

    #[tokio::test]
    async fn test_batch_preserves_length_and_order() {
        let backend = Arc::new(MockBackend::working());
        let svc = service(Arc::clone(&backend));

        let input = texts(&["hello", "5", "", "world"]);
        let out = svc.translate_batch(&input).await;

        assert_eq!(out.len(), input.len());
        assert_eq!(out, vec!["tr:hello", "5", "", "tr:world"]);
        // Only one batch call for the two eligible items
        assert_eq!(backend.batch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.single_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_skippable_makes_no_backend_calls() {
        let backend = Arc::new(MockBackend::working());
        let svc = service(Arc::clone(&backend));

        let input = texts(&["1", "22", " ", "9"]);
        let out = svc.translate_batch(&input).await;

        assert_eq!(out, input);
        assert_eq!(backend.batch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batch_failure_falls_back_to_individual() {
        let backend = Arc::new(MockBackend::batch_failing());
        let svc = service(Arc::clone(&backend));

        let input = texts(&["hello", "world"]);
        let out = svc.translate_batch(&input).await;

        assert_eq!(out, vec!["tr:hello", "tr:world"]);
        assert_eq!(backend.batch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.single_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_total_failure_returns_source_texts() {
        let backend = Arc::new(MockBackend::fully_failing());
        let svc = service(backend);

        let input = texts(&["hello", "7", "world"]);
        let out = svc.translate_batch(&input).await;

        assert_eq!(out, input);
    }

    #[tokio::test]
    async fn test_single_translate_failure_returns_source() {
        let backend = Arc::new(MockBackend::fully_failing());
        let svc = service(backend);

        assert_eq!(svc.translate("hello").await, "hello");
        assert_eq!(svc.translate("5").await, "5");
    }

    #[tokio::test]
    async fn test_memo_avoids_repeat_backend_calls() {
        let backend = Arc::new(MockBackend::working());
        let svc = service(Arc::clone(&backend));

        let first = svc.translate_batch(&texts(&["header text"])).await;
        let second = svc.translate_batch(&texts(&["header text"])).await;

        assert_eq!(first, second);
        assert_eq!(backend.batch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_items_are_not_memoized() {
        let backend = Arc::new(MockBackend::fully_failing());
        let svc = service(Arc::clone(&backend));

        let _ = svc.translate("hello").await;
        let _ = svc.translate("hello").await;

        // Both attempts reached the backend; the fallback was never cached
        assert_eq!(backend.single_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_translation_falls_back_to_source() {
        struct EmptyBackend;

        #[async_trait]
        impl TranslationBackend for EmptyBackend {
            fn name(&self) -> &'static str {
                "empty"
            }

            async fn translate_batch(
                &self,
                texts: &[String],
                _source: &Lang,
                _target: &Lang,
            ) -> crate::error::Result<Vec<String>> {
                Ok(vec![String::new(); texts.len()])
            }

            async fn translate(
                &self,
                _text: &str,
                _source: &Lang,
                _target: &Lang,
            ) -> crate::error::Result<String> {
                Ok(String::new())
            }
        }

        let svc = RegionTranslator::new(Arc::new(EmptyBackend), Lang::new("en"), Lang::new("hi"));
        let out = svc.translate_batch(&texts(&["hello"])).await;
        assert_eq!(out, vec!["hello"]);
    }
}
