//! Transcript post-processing seam.
//!
//! After transcription the session can optionally pass the raw text through
//! an [`Enhancer`] (an LLM polish service, a formatting pass, …).  The core
//! only defines the interface; implementations live with the surrounding
//! application.
//!
//! Enhancement is best-effort: when it fails or times out the session falls
//! back to the raw transcript instead of erroring.

use async_trait::async_trait;
use thiserror::Error;

// ---------------------------------------------------------------------------
// EnhanceError
// ---------------------------------------------------------------------------

/// Errors an enhancement backend can surface.
#[derive(Debug, Clone, Error)]
pub enum EnhanceError {
    #[error("enhancement timed out")]
    Timeout,

    #[error("enhancement backend failed: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// Enhancer trait
// ---------------------------------------------------------------------------

/// Thread-safe async interface to a transcript post-processor.
///
/// Implementations must be `Send + Sync` so they can be held behind an
/// `Arc<dyn Enhancer>` and awaited from a spawned task.
#[async_trait]
pub trait Enhancer: Send + Sync {
    /// Rewrite `raw` into its polished form.
    async fn enhance(&self, raw: &str) -> Result<String, EnhanceError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
