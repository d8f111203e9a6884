use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A flag shared between a [`Compiler`](crate::Compiler) and its caller, used to stop compilation
/// early.
///
/// The compiler checks the token when it starts and finishes processing each file.
///
/// # Examples
///
/// ```
/// # use protolink::CancellationToken;
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// assert!(!token.is_cancelled());
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a new token which has not been cancelled.
    pub fn new() -> Self {
        Default::default()
    }

    /// Requests cancellation. This affects every clone of the token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns true if [`cancel`](CancellationToken::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
