//! Batch-oriented cursor contract consumed by [`ReadStream`](super::ReadStream)
//!
//! The stream only needs two operations from the driver: fetch the next batch
//! and close. [`MongoBatchCursor`] implements them on top of a driver cursor
//! returned by `find` or `aggregate`.

use async_trait::async_trait;
use bson::RawDocumentBuf;
use futures::TryStreamExt;
use mongodb::Cursor;
use tracing::{debug, info};

use crate::error::StreamError;

/// One group of documents returned by a single fetch.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    /// Documents in cursor order
    pub documents: Vec<RawDocumentBuf>,

    /// False once the cursor is known to be exhausted
    pub has_more: bool,
}

/// Pull-based cursor that hands out documents a batch at a time.
///
/// The stream never calls `next_batch` again before the previous call
/// resolved.
#[async_trait]
pub trait BatchCursor: Send {
    /// Fetch the next batch of documents
    async fn next_batch(&mut self) -> Result<Batch, StreamError>;

    /// Release the server-side cursor. Idempotent and best-effort.
    async fn close(&mut self) -> Result<(), StreamError>;
}

/// [`BatchCursor`] over a driver cursor from `find` or `aggregate`.
pub struct MongoBatchCursor {
    cursor: Option<Cursor<RawDocumentBuf>>,
    batch_size: u32,
    total_fetched: u64,
    source: &'static str,
}

impl MongoBatchCursor {
    /// Wrap a driver cursor
    ///
    /// # Arguments
    /// * `cursor` - cursor returned by `find` or `aggregate`
    /// * `batch_size` - maximum documents handed out per `next_batch`
    /// * `source` - operation name for logging ("find" or "aggregate")
    pub fn new(cursor: Cursor<RawDocumentBuf>, batch_size: u32, source: &'static str) -> Self {
        Self {
            cursor: Some(cursor),
            batch_size: batch_size.max(1),
            total_fetched: 0,
            source,
        }
    }

    pub fn find(cursor: Cursor<RawDocumentBuf>, batch_size: u32) -> Self {
        Self::new(cursor, batch_size, "find")
    }

    pub fn aggregate(cursor: Cursor<RawDocumentBuf>, batch_size: u32) -> Self {
        Self::new(cursor, batch_size, "aggregate")
    }

    /// Documents handed out so far
    pub fn total_fetched(&self) -> u64 {
        self.total_fetched
    }
}

#[async_trait]
impl BatchCursor for MongoBatchCursor {
    async fn next_batch(&mut self) -> Result<Batch, StreamError> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Err(StreamError::Closed);
        };

        let mut documents = Vec::with_capacity(self.batch_size as usize);
        let mut has_more = true;

        while documents.len() < self.batch_size as usize {
            match cursor.try_next().await {
                Ok(Some(doc)) => documents.push(doc),
                Ok(None) => {
                    has_more = false;
                    break;
                }
                Err(e) => {
                    // Dropping the driver cursor kills it on the server
                    self.cursor = None;
                    return Err(StreamError::from_driver(&e));
                }
            }
        }

        self.total_fetched += documents.len() as u64;
        debug!(
            "{} cursor returned {} documents (total: {}, has_more: {})",
            self.source,
            documents.len(),
            self.total_fetched,
            has_more
        );

        if !has_more {
            self.cursor = None;
        }

        Ok(Batch {
            documents,
            has_more,
        })
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        if self.cursor.take().is_some() {
            info!(
                "Closed {} cursor after fetching {} documents",
                self.source, self.total_fetched
            );
        }
        Ok(())
    }
}

impl Drop for MongoBatchCursor {
    fn drop(&mut self) {
        if self.cursor.is_some() {
            debug!("{} cursor dropped without explicit close", self.source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_cursor_trait_object() {
        fn _accepts_batch_cursor(_cursor: Box<dyn BatchCursor>) {}
    }

    #[test]
    fn test_default_batch_is_final_and_empty() {
        let batch = Batch::default();
        assert!(batch.documents.is_empty());
        assert!(!batch.has_more);
    }
}
