use crate::csv_out::CsvAppender;
use crate::store::DocumentStore;
use async_trait::async_trait;
use croplisten_core::{Platform, Post, StoreError};
use platform_clients::PageSink;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Deduplicating destination for one platform's walk. Posts are keyed by
/// `post_id` with last-write-wins, so a post appearing on two pages keeps
/// its most recent version. Flushing appends new records to the CSV file
/// and bulk-inserts them into the platform's collection; neither failure
/// aborts the run.
pub struct DedupSink {
    platform: Platform,
    posts: HashMap<String, Post>,
    pending: Vec<String>,
    csv: Option<CsvAppender>,
    store: Option<Arc<dyn DocumentStore>>,
}

impl DedupSink {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            posts: HashMap::new(),
            pending: Vec::new(),
            csv: None,
            store: None,
        }
    }

    pub fn with_csv(mut self, appender: CsvAppender) -> Self {
        self.csv = Some(appender);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn get(&self, post_id: &str) -> Option<&Post> {
        self.posts.get(post_id)
    }
}

#[async_trait]
impl PageSink for DedupSink {
    /// Returns true when the post id was not seen before in this run.
    fn save(&mut self, post: Post) -> bool {
        let id = post.post_id.clone();
        let new = self.posts.insert(id.clone(), post).is_none();
        if new {
            self.pending.push(id);
        } else {
            debug!(post_id = %id, "duplicate post replaced with latest version");
        }
        new
    }

    async fn flush(&mut self) -> Result<usize, StoreError> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let batch: Vec<Post> = self
            .pending
            .iter()
            .filter_map(|id| self.posts.get(id).cloned())
            .collect();
        let batch_ids: Vec<&str> = batch.iter().map(|p| p.post_id.as_str()).collect();
        self.pending.clear();

        if let Some(csv) = &self.csv {
            if let Err(e) = csv.append(&batch) {
                warn!(platform = %self.platform, error = %e, "CSV append failed, records remain in the document store path");
            }
        }

        if let Some(store) = &self.store {
            if let Err(e) = store.insert_posts(self.platform, &batch).await {
                error!(
                    platform = %self.platform,
                    error = %e,
                    post_ids = ?batch_ids,
                    "bulk insert failed for batch"
                );
            }
        }

        debug!(platform = %self.platform, count = batch.len(), "flushed batch");
        Ok(batch.len())
    }

    fn saved_count(&self) -> usize {
        self.posts.len()
    }
}
