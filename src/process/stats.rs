//! Invocation counting

use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts process invocations for one engine pass
#[derive(Debug, Default)]
pub struct Statistics {
    runs: AtomicUsize,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_run() {
        let stats = Statistics::new();
        stats.register_run();
        stats.register_run();
        assert_eq!(stats.run_count(), 2);
    }
}
