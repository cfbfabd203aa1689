use async_trait::async_trait;

use crate::config::Lang;
use crate::error::Result;

/// Trait for remote translation backends.
///
/// Implementations must be safe for concurrent use: one client is shared
/// across all page workers.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Human-readable backend name, used in logs
    fn name(&self) -> &'static str;

    /// Translate a batch of strings, returning translations in the same
    /// order and count. May fail wholesale; callers are expected to fall
    /// back to per-item calls.
    async fn translate_batch(
        &self,
        texts: &[String],
        source: &Lang,
        target: &Lang,
    ) -> Result<Vec<String>>;

    /// Translate a single string.
    async fn translate(&self, text: &str, source: &Lang, target: &Lang) -> Result<String>;
}
