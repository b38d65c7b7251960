//! Cooperative cancellation.
//!
//! Resolution is pure computation, so it cannot be interrupted from outside.
//! Instead every long-running loop (autoderef steps, candidate impls,
//! selection recursion, normalization) calls [`CancellationToken::check`]
//! and unwinds with [`Cancelled`] once the owning [`CancellationSource`]
//! has been cancelled, typically because the file being analysed changed.
//!
//! # Example
//!
//! ```rust
//! use rsresolve::cancel::CancellationSource;
//!
//! let source = CancellationSource::new();
//! let token = source.token();
//! assert!(token.check().is_ok());
//!
//! source.cancel_with_reason(Some("document changed".into()));
//! assert!(token.check().is_err());
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::error::Cancelled;

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

/// State behind every clone of one token.
#[derive(Debug)]
struct TokenState {
    /// Set once by the owning source.
    cancelled: AtomicBool,
    /// Cancelling the parent cancels this token too.
    parent: Option<CancellationToken>,
    reason: Mutex<Option<String>>,
}

impl TokenState {
    fn new(parent: Option<CancellationToken>) -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            parent,
            reason: Mutex::new(None),
        }
    }
}

/// A read-only handle that reports whether cancellation was requested.
///
/// Tokens are cheap to clone and can be shared across threads.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    /// Unique token ID.
    id: u64,
    state: Arc<TokenState>,
}

impl CancellationToken {
    fn new() -> Self {
        Self {
            id: NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed),
            state: Arc::new(TokenState::new(None)),
        }
    }

    fn with_parent(parent: CancellationToken) -> Self {
        Self {
            id: NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed),
            state: Arc::new(TokenState::new(Some(parent))),
        }
    }

    /// Get the token ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Check if cancellation has been requested on this token or any parent.
    pub fn is_cancelled(&self) -> bool {
        if self.state.cancelled.load(Ordering::Acquire) {
            return true;
        }
        match &self.state.parent {
            Some(parent) => parent.is_cancelled(),
            None => false,
        }
    }

    /// Why the token was cancelled.
    ///
    /// Falls back to the parent's reason when the parent was the one cancelled.
    pub fn reason(&self) -> Option<String> {
        if self.state.cancelled.load(Ordering::Acquire) {
            return self.state.reason.lock().clone();
        }
        self.state.parent.as_ref().and_then(CancellationToken::reason)
    }

    /// Create a child token, cancelled when either it or this token is.
    pub fn child(&self) -> CancellationToken {
        CancellationToken::with_parent(self.clone())
    }

    /// Return `Err(Cancelled)` if cancellation has been requested.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled { reason: self.reason() })
        } else {
            Ok(())
        }
    }
}

/// Shared token that is never cancelled.
static NONE_TOKEN: OnceLock<CancellationToken> = OnceLock::new();

impl Default for CancellationToken {
    /// The shared token no source can cancel.
    fn default() -> Self {
        NONE_TOKEN.get_or_init(CancellationToken::new).clone()
    }
}

/// Owns the ability to cancel; hands out [`CancellationToken`]s.
#[derive(Debug)]
pub struct CancellationSource {
    token: CancellationToken,
}

impl CancellationSource {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Tokens from this source are also cancelled when `parent` is.
    pub fn with_parent(parent: CancellationToken) -> Self {
        Self {
            token: CancellationToken::with_parent(parent),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.cancel_with_reason(None);
    }

    pub fn cancel_with_reason(&self, reason: Option<String>) {
        *self.token.state.reason.lock() = reason;
        self.token.state.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_cancels_token() {
        let source = CancellationSource::new();
        let token = source.token();
        assert!(!token.is_cancelled());
        source.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.check(), Err(Cancelled { reason: None }));
    }

    #[test]
    fn test_parent_cancellation_reaches_child() {
        let parent = CancellationSource::new();
        let child = parent.token().child();
        let grandchild = CancellationSource::with_parent(child.clone());

        parent.cancel_with_reason(Some("shutdown".into()));
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
        assert_eq!(grandchild.token().reason().as_deref(), Some("shutdown"));
    }

    #[test]
    fn test_child_cancellation_does_not_reach_parent() {
        let parent = CancellationSource::new();
        let child = CancellationSource::with_parent(parent.token());
        child.cancel();
        assert!(!parent.is_cancelled());
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_default_token_never_cancelled() {
        let token = CancellationToken::default();
        assert!(token.check().is_ok());
        assert_eq!(token.id(), CancellationToken::default().id());
    }
}
