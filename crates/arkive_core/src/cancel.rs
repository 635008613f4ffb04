//! Cooperative cancellation for multi-file operations.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A flag shared between whoever starts a batch and whoever may abandon it
///
/// Batches check the token between files; a file already being decoded or written always runs to
/// completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A token that hasn't been cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that every holder of this token stops at its next check
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod test {
    use super::CancellationToken;

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!token.is_cancelled());

        other.cancel();
        assert!(token.is_cancelled());
    }
}
