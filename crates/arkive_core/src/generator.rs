//! Deferred byte sources consumed while an archive is being written.

use std::{collections::HashMap, fmt};

use tracing::trace;

use crate::error::{Error, Result};

/// Produces the decoded bytes of one file
pub type Producer<'a> = Box<dyn FnOnce() -> Result<Vec<u8>> + Send + 'a>;

/// A set of deferred byte sources, keyed by the file's position in the repack list
///
/// Each producer runs at most once; [`ContentGenerator::get_bytes`] removes it before invoking it,
/// so producers that read from a shared stream position are never run twice. The generator is
/// handed to a driver's `write_archive` by value and dropped when the write returns, which
/// releases whatever the remaining producers captured (open files, stream borrows).
#[derive(Default)]
pub struct ContentGenerator<'a> {
    producers: HashMap<usize, Producer<'a>>,
}

impl<'a> ContentGenerator<'a> {
    /// Creates an empty generator
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the producer for the file at position `key`, replacing any earlier one
    pub fn add(&mut self, key: usize, producer: impl FnOnce() -> Result<Vec<u8>> + Send + 'a) {
        self.producers.insert(key, Box::new(producer));
    }

    /// Registers bytes that are already in memory
    pub fn add_bytes(&mut self, key: usize, bytes: Vec<u8>) {
        self.add(key, move || Ok(bytes));
    }

    /// Runs and discards the producer for `key`
    pub fn get_bytes(&mut self, key: usize) -> Result<Vec<u8>> {
        let producer = self
            .producers
            .remove(&key)
            .ok_or(Error::ContentUnavailable(key))?;
        let bytes = producer()?;
        trace!(key, size = bytes.len(), "produced content");
        Ok(bytes)
    }

    /// Whether a producer is registered for `key`
    pub fn contains(&self, key: usize) -> bool {
        self.producers.contains_key(&key)
    }

    /// Number of producers not yet consumed
    pub fn len(&self) -> usize {
        self.producers.len()
    }

    /// Whether every producer has been consumed
    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}

impl fmt::Debug for ContentGenerator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys = self.producers.keys().collect::<Vec<_>>();
        keys.sort();
        f.debug_struct("ContentGenerator")
            .field("pending", &keys)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::ContentGenerator;
    use crate::error::{Error, Result};

    #[test]
    fn producer_runs_at_most_once() -> Result<()> {
        let calls = AtomicUsize::new(0);
        let mut generator = ContentGenerator::new();
        generator.add(0, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(b"hello".to_vec())
        });

        assert_eq!(generator.get_bytes(0)?, b"hello".to_vec());
        assert!(matches!(
            generator.get_bytes(0),
            Err(Error::ContentUnavailable(0))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn unused_producers_are_released_on_drop() {
        let marker = std::sync::Arc::new(());
        {
            let held = marker.clone();
            let mut generator = ContentGenerator::new();
            generator.add(3, move || {
                let _keep = held;
                Ok(Vec::new())
            });
            assert_eq!(std::sync::Arc::strong_count(&marker), 2);
            assert!(generator.contains(3));
        }
        assert_eq!(std::sync::Arc::strong_count(&marker), 1);
    }
}
