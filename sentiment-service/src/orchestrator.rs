//! Batch scoring of stored posts across platforms.

use croplisten_core::{Platform, SentimentError, StoreError};
use sentiment::Analyzer;
use serde::Serialize;
use std::sync::Arc;
use storage::{DocumentStore, StoredPost};
use tracing::{debug, error, info, warn};

/// Unscored post counts by platform.
#[derive(Debug, Clone, Serialize)]
pub struct UnscoredCounts {
    pub reddit: u64,
    pub twitter: u64,
    pub bluesky: u64,
    pub total: u64,
}

/// What one batch run did. `fetched` is how many posts were pulled from
/// the store; every one of them ends up processed, skipped or errored.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub fetched: usize,
    pub processed: usize,
    pub errors: usize,
    pub skipped: usize,
    pub remaining: UnscoredCounts,
}

/// Pulls unscored posts from the store, scores them, and writes results
/// back. Terminal failures are marked on the post so it is never retried.
pub struct BatchOrchestrator {
    store: Arc<dyn DocumentStore>,
    analyzer: Arc<Analyzer>,
}

impl BatchOrchestrator {
    pub fn new(store: Arc<dyn DocumentStore>, analyzer: Arc<Analyzer>) -> Self {
        Self { store, analyzer }
    }

    /// Score up to `batch_size` unscored posts. With a `source` the whole
    /// batch comes from that platform; without one, Reddit gets 60% of the
    /// batch, Bluesky 70% of whatever Reddit left unfilled, and Twitter
    /// the remainder.
    pub async fn run_batch(
        &self,
        batch_size: usize,
        source: Option<Platform>,
    ) -> Result<BatchReport, StoreError> {
        let batch = self.fetch_batch(batch_size, source).await?;

        let mut report = BatchReport {
            fetched: batch.len(),
            processed: 0,
            errors: 0,
            skipped: 0,
            remaining: UnscoredCounts {
                reddit: 0,
                twitter: 0,
                bluesky: 0,
                total: 0,
            },
        };

        for (platform, post) in &batch {
            self.score_post(*platform, post, &mut report).await;
        }

        report.remaining = self.unscored_counts().await?;
        info!(
            fetched = report.fetched,
            processed = report.processed,
            errors = report.errors,
            skipped = report.skipped,
            remaining = report.remaining.total,
            "batch run complete"
        );
        Ok(report)
    }

    pub async fn unscored_counts(&self) -> Result<UnscoredCounts, StoreError> {
        let reddit = self.store.count_unscored(Platform::Reddit).await?;
        let twitter = self.store.count_unscored(Platform::Twitter).await?;
        let bluesky = self.store.count_unscored(Platform::Bluesky).await?;
        Ok(UnscoredCounts {
            reddit,
            twitter,
            bluesky,
            total: reddit + twitter + bluesky,
        })
    }

    async fn fetch_batch(
        &self,
        batch_size: usize,
        source: Option<Platform>,
    ) -> Result<Vec<(Platform, StoredPost)>, StoreError> {
        if let Some(platform) = source {
            let posts = self
                .store
                .find_unscored(platform, batch_size as i64)
                .await?;
            return Ok(posts.into_iter().map(|p| (platform, p)).collect());
        }

        let mut batch = Vec::new();

        let reddit_limit = batch_size * 60 / 100;
        let mut fetched = 0;
        if reddit_limit > 0 {
            let posts = self
                .store
                .find_unscored(Platform::Reddit, reddit_limit as i64)
                .await?;
            fetched += posts.len();
            batch.extend(posts.into_iter().map(|p| (Platform::Reddit, p)));
        }

        let bluesky_limit = (batch_size - fetched) * 70 / 100;
        if bluesky_limit > 0 {
            let posts = self
                .store
                .find_unscored(Platform::Bluesky, bluesky_limit as i64)
                .await?;
            fetched += posts.len();
            batch.extend(posts.into_iter().map(|p| (Platform::Bluesky, p)));
        }

        let twitter_limit = batch_size - fetched;
        if twitter_limit > 0 {
            let posts = self
                .store
                .find_unscored(Platform::Twitter, twitter_limit as i64)
                .await?;
            batch.extend(posts.into_iter().map(|p| (Platform::Twitter, p)));
        }

        debug!(size = batch.len(), "assembled scoring batch");
        Ok(batch)
    }

    async fn score_post(&self, platform: Platform, post: &StoredPost, report: &mut BatchReport) {
        if post.content_text.trim().is_empty() {
            debug!(platform = %platform, post_id = %post.post_id, "post has no content");
            self.skip_post(platform, &post.post_id, "No content to analyse")
                .await;
            report.skipped += 1;
            return;
        }

        match self.analyzer.analyze(&post.content_text).await {
            Ok(analysis) => {
                match self
                    .store
                    .update_sentiment(
                        platform,
                        &post.post_id,
                        &analysis.sentiment,
                        &analysis.entities,
                        &analysis.processed_text,
                    )
                    .await
                {
                    Ok(()) => report.processed += 1,
                    Err(e) => {
                        error!(platform = %platform, post_id = %post.post_id, error = %e, "failed to store sentiment");
                        report.errors += 1;
                    }
                }
            }
            Err(SentimentError::EmptyInput) => {
                self.skip_post(platform, &post.post_id, "No content to analyse")
                    .await;
                report.skipped += 1;
            }
            Err(e) => {
                warn!(platform = %platform, post_id = %post.post_id, error = %e, "scoring failed");
                if let Err(mark) = self
                    .store
                    .mark_failed(platform, &post.post_id, &e.to_string())
                    .await
                {
                    error!(post_id = %post.post_id, error = %mark, "failed to mark post as failed");
                }
                report.errors += 1;
            }
        }
    }

    async fn skip_post(&self, platform: Platform, post_id: &str, reason: &str) {
        if let Err(e) = self.store.mark_skipped(platform, post_id, reason).await {
            error!(post_id = %post_id, error = %e, "failed to mark post as skipped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use croplisten_core::{AgriculturalTerm, Post, SentimentResult};
    use sentiment::{ChunkClassifier, Lexicon};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        posts: HashMap<Platform, Vec<StoredPost>>,
        fetch_calls: Mutex<Vec<(Platform, i64)>>,
        updated: Mutex<Vec<String>>,
        skipped: Mutex<Vec<(String, String)>>,
        failed: Mutex<Vec<String>>,
    }

    impl FakeStore {
        fn with_posts(posts: HashMap<Platform, Vec<StoredPost>>) -> Self {
            Self {
                posts,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl DocumentStore for FakeStore {
        async fn insert_posts(
            &self,
            _platform: Platform,
            posts: &[Post],
        ) -> Result<usize, StoreError> {
            Ok(posts.len())
        }

        async fn find_unscored(
            &self,
            platform: Platform,
            limit: i64,
        ) -> Result<Vec<StoredPost>, StoreError> {
            self.fetch_calls.lock().unwrap().push((platform, limit));
            let posts = self.posts.get(&platform).cloned().unwrap_or_default();
            Ok(posts.into_iter().take(limit as usize).collect())
        }

        async fn count_unscored(&self, platform: Platform) -> Result<u64, StoreError> {
            Ok(self.posts.get(&platform).map_or(0, |p| p.len() as u64))
        }

        async fn find_post(
            &self,
            platform: Platform,
            post_id: &str,
        ) -> Result<Option<StoredPost>, StoreError> {
            Ok(self
                .posts
                .get(&platform)
                .and_then(|posts| posts.iter().find(|p| p.post_id == post_id).cloned()))
        }

        async fn update_sentiment(
            &self,
            _platform: Platform,
            post_id: &str,
            _sentiment: &SentimentResult,
            _entities: &[AgriculturalTerm],
            _processed_text: &str,
        ) -> Result<(), StoreError> {
            self.updated.lock().unwrap().push(post_id.to_string());
            Ok(())
        }

        async fn mark_failed(
            &self,
            _platform: Platform,
            post_id: &str,
            _error: &str,
        ) -> Result<(), StoreError> {
            self.failed.lock().unwrap().push(post_id.to_string());
            Ok(())
        }

        async fn mark_skipped(
            &self,
            _platform: Platform,
            post_id: &str,
            reason: &str,
        ) -> Result<(), StoreError> {
            self.skipped
                .lock()
                .unwrap()
                .push((post_id.to_string(), reason.to_string()));
            Ok(())
        }
    }

    struct FixedClassifier;

    #[async_trait]
    impl ChunkClassifier for FixedClassifier {
        async fn classify(&self, _text: &str) -> Result<[f64; 3], SentimentError> {
            Ok([0.2, 0.5, 0.3])
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl ChunkClassifier for FailingClassifier {
        async fn classify(&self, _text: &str) -> Result<[f64; 3], SentimentError> {
            Err(SentimentError::InferenceFailed {
                details: "model offline".to_string(),
            })
        }
    }

    fn stored(id: &str, content: &str) -> StoredPost {
        StoredPost {
            post_id: id.to_string(),
            content_text: content.to_string(),
        }
    }

    fn many(prefix: &str, n: usize) -> Vec<StoredPost> {
        (0..n)
            .map(|i| stored(&format!("{prefix}{i}"), "the wheat crop looks healthy"))
            .collect()
    }

    fn orchestrator(store: Arc<FakeStore>) -> BatchOrchestrator {
        let analyzer = Arc::new(Analyzer::new(
            Arc::new(FixedClassifier),
            Lexicon::agricultural(),
        ));
        BatchOrchestrator::new(store, analyzer)
    }

    #[tokio::test]
    async fn test_saturated_batch_splits_60_28_12() {
        let store = Arc::new(FakeStore::with_posts(HashMap::from([
            (Platform::Reddit, many("r", 100)),
            (Platform::Bluesky, many("b", 100)),
            (Platform::Twitter, many("t", 100)),
        ])));
        let report = orchestrator(store.clone())
            .run_batch(100, None)
            .await
            .unwrap();

        let calls = store.fetch_calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                (Platform::Reddit, 60),
                (Platform::Bluesky, 28),
                (Platform::Twitter, 12),
            ]
        );
        assert_eq!(report.fetched, 100);
        assert_eq!(report.processed, 100);
        assert_eq!(report.errors, 0);
    }

    #[tokio::test]
    async fn test_unfilled_reddit_share_rolls_over() {
        let store = Arc::new(FakeStore::with_posts(HashMap::from([
            (Platform::Reddit, many("r", 10)),
            (Platform::Bluesky, many("b", 100)),
            (Platform::Twitter, many("t", 100)),
        ])));
        let report = orchestrator(store.clone())
            .run_batch(100, None)
            .await
            .unwrap();

        // Reddit returned 10 of its 60, so Bluesky gets 70% of the
        // remaining 90 and Twitter tops up the batch
        let calls = store.fetch_calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                (Platform::Reddit, 60),
                (Platform::Bluesky, 63),
                (Platform::Twitter, 27),
            ]
        );
        assert_eq!(report.fetched, 100);
        assert_eq!(report.processed, 100);
    }

    #[tokio::test]
    async fn test_source_filter_uses_single_platform() {
        let store = Arc::new(FakeStore::with_posts(HashMap::from([
            (Platform::Reddit, many("r", 5)),
            (Platform::Bluesky, many("b", 5)),
        ])));
        let report = orchestrator(store.clone())
            .run_batch(50, Some(Platform::Bluesky))
            .await
            .unwrap();

        let calls = store.fetch_calls.lock().unwrap().clone();
        assert_eq!(calls, vec![(Platform::Bluesky, 50)]);
        assert_eq!(report.processed, 5);
    }

    #[tokio::test]
    async fn test_empty_content_is_skipped_permanently() {
        let store = Arc::new(FakeStore::with_posts(HashMap::from([(
            Platform::Reddit,
            vec![stored("r1", "   "), stored("r2", "healthy crop")],
        )])));
        let report = orchestrator(store.clone())
            .run_batch(10, Some(Platform::Reddit))
            .await
            .unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors, 0);
        let skipped = store.skipped.lock().unwrap().clone();
        assert_eq!(
            skipped,
            vec![("r1".to_string(), "No content to analyse".to_string())]
        );
        assert_eq!(store.updated.lock().unwrap().clone(), vec!["r2"]);
    }

    #[tokio::test]
    async fn test_classifier_failure_marks_post_failed() {
        let store = Arc::new(FakeStore::with_posts(HashMap::from([(
            Platform::Twitter,
            vec![stored("t1", "crop report")],
        )])));
        let analyzer = Arc::new(Analyzer::new(
            Arc::new(FailingClassifier),
            Lexicon::agricultural(),
        ));
        let report = BatchOrchestrator::new(store.clone(), analyzer)
            .run_batch(10, Some(Platform::Twitter))
            .await
            .unwrap();

        assert_eq!(report.processed, 0);
        assert_eq!(report.errors, 1);
        assert_eq!(store.failed.lock().unwrap().clone(), vec!["t1"]);
        assert!(store.updated.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_store_reports_nothing_fetched() {
        let store = Arc::new(FakeStore::default());
        let report = orchestrator(store).run_batch(50, None).await.unwrap();
        assert_eq!(report.fetched, 0);
        assert_eq!(report.processed, 0);
        assert_eq!(report.remaining.total, 0);
    }

    #[tokio::test]
    async fn test_remaining_counts_cover_all_platforms() {
        let store = Arc::new(FakeStore::with_posts(HashMap::from([
            (Platform::Reddit, many("r", 3)),
            (Platform::Twitter, many("t", 2)),
        ])));
        let counts = orchestrator(store).unscored_counts().await.unwrap();
        assert_eq!(counts.reddit, 3);
        assert_eq!(counts.twitter, 2);
        assert_eq!(counts.bluesky, 0);
        assert_eq!(counts.total, 5);
    }
}
