//! Transaction depth bookkeeping shared by backends.

/// Tracks how many `begin_transaction` calls are outstanding on a handle.
///
/// Only the outermost begin issues a real `BEGIN`; commit and rollback
/// close the whole transaction and reset the depth to zero. Both are
/// no-ops when no transaction is open.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransactionDepth {
    depth: u32,
}

impl TransactionDepth {
    /// A counter with no open transaction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current nesting depth.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Whether a transaction is open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.depth > 0
    }

    /// Whether the next begin is the outermost one and must issue `BEGIN`.
    #[must_use]
    pub fn needs_begin(&self) -> bool {
        self.depth == 0
    }

    /// Record a successful begin.
    pub fn enter(&mut self) -> u32 {
        self.depth = self.depth.saturating_add(1);
        self.depth
    }

    /// Close the transaction. Returns `false` if none was open.
    pub fn reset(&mut self) -> bool {
        let was_active = self.is_active();
        self.depth = 0;
        was_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_counts_nested_begins() {
        let mut tx = TransactionDepth::new();
        assert!(tx.needs_begin());
        assert_eq!(tx.enter(), 1);
        assert!(!tx.needs_begin());
        assert_eq!(tx.enter(), 2);
        assert!(tx.is_active());
        assert!(tx.reset());
        assert_eq!(tx.depth(), 0);
    }

    #[test]
    fn test_reset_without_transaction() {
        let mut tx = TransactionDepth::new();
        assert!(!tx.reset());
        assert!(!tx.is_active());
    }
}
