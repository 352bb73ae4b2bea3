use async_trait::async_trait;
use chrono::Utc;
use croplisten_core::{AgriculturalTerm, Platform, Post, SentimentResult, StoreError};
use futures::TryStreamExt;
use mongodb::bson::{doc, to_bson, Document};
use mongodb::{Client, Database};
use serde::Deserialize;
use tracing::{debug, info};

/// A stored post as the scorer needs it.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredPost {
    pub post_id: String,
    #[serde(default)]
    pub content_text: String,
}

/// Document-store operations the collection and scoring pipelines need.
/// Mongo-backed in production, faked in tests.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_posts(&self, platform: Platform, posts: &[Post]) -> Result<usize, StoreError>;

    /// Posts still eligible for scoring: no sentiment, no score timestamp,
    /// and neither terminal flag set.
    async fn find_unscored(
        &self,
        platform: Platform,
        limit: i64,
    ) -> Result<Vec<StoredPost>, StoreError>;

    async fn count_unscored(&self, platform: Platform) -> Result<u64, StoreError>;

    async fn find_post(
        &self,
        platform: Platform,
        post_id: &str,
    ) -> Result<Option<StoredPost>, StoreError>;

    async fn update_sentiment(
        &self,
        platform: Platform,
        post_id: &str,
        sentiment: &SentimentResult,
        entities: &[AgriculturalTerm],
        processed_text: &str,
    ) -> Result<(), StoreError>;

    /// Permanent failure: the post is never retried.
    async fn mark_failed(
        &self,
        platform: Platform,
        post_id: &str,
        error: &str,
    ) -> Result<(), StoreError>;

    /// Permanent skip (e.g. empty content): the post is never retried.
    async fn mark_skipped(
        &self,
        platform: Platform,
        post_id: &str,
        reason: &str,
    ) -> Result<(), StoreError>;
}

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| StoreError::ConnectionFailed {
                reason: e.to_string(),
            })?;
        let db = client.database(db_name);
        // Fail fast on an unreachable server instead of on the first write
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::ConnectionFailed {
                reason: e.to_string(),
            })?;
        info!(db = db_name, "connected to document store");
        Ok(Self { db })
    }

    fn collection(&self, platform: Platform) -> mongodb::Collection<Document> {
        self.db.collection::<Document>(platform.collection_name())
    }

    fn typed_collection(&self, platform: Platform) -> mongodb::Collection<StoredPost> {
        self.db.collection::<StoredPost>(platform.collection_name())
    }
}

/// Filter matching posts that have never been scored, skipped, or failed.
/// All four conditions are checked: documents written by older pipeline
/// versions may carry any subset of the marker fields.
pub fn unscored_filter() -> Document {
    doc! {
        "$and": [
            { "sentiment": null },
            { "sentiment_analysis_failed": { "$ne": true } },
            { "sentiment_analysis_skipped": { "$ne": true } },
            { "sentiment_updated_at": { "$exists": false } },
        ]
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn insert_posts(&self, platform: Platform, posts: &[Post]) -> Result<usize, StoreError> {
        if posts.is_empty() {
            return Ok(0);
        }
        let docs: Result<Vec<Document>, _> = posts
            .iter()
            .map(|p| mongodb::bson::to_document(p))
            .collect();
        let docs = docs.map_err(|e| StoreError::BulkInsertFailed {
            details: e.to_string(),
        })?;
        let result = self.collection(platform).insert_many(docs).await?;
        debug!(
            platform = %platform,
            inserted = result.inserted_ids.len(),
            "bulk inserted posts"
        );
        Ok(result.inserted_ids.len())
    }

    async fn find_unscored(
        &self,
        platform: Platform,
        limit: i64,
    ) -> Result<Vec<StoredPost>, StoreError> {
        let cursor = self
            .typed_collection(platform)
            .find(unscored_filter())
            .projection(doc! { "post_id": 1, "content_text": 1 })
            .limit(limit)
            .await?;
        let posts: Vec<StoredPost> = cursor.try_collect().await?;
        Ok(posts)
    }

    async fn count_unscored(&self, platform: Platform) -> Result<u64, StoreError> {
        let count = self
            .collection(platform)
            .count_documents(unscored_filter())
            .await?;
        Ok(count)
    }

    async fn find_post(
        &self,
        platform: Platform,
        post_id: &str,
    ) -> Result<Option<StoredPost>, StoreError> {
        let found = self
            .typed_collection(platform)
            .find_one(doc! { "post_id": post_id })
            .await?;
        Ok(found)
    }

    async fn update_sentiment(
        &self,
        platform: Platform,
        post_id: &str,
        sentiment: &SentimentResult,
        entities: &[AgriculturalTerm],
        processed_text: &str,
    ) -> Result<(), StoreError> {
        let sentiment_bson = to_bson(sentiment).map_err(|e| StoreError::MalformedRecord {
            post_id: post_id.to_string(),
            details: e.to_string(),
        })?;
        let entities_bson = to_bson(entities).map_err(|e| StoreError::MalformedRecord {
            post_id: post_id.to_string(),
            details: e.to_string(),
        })?;
        self.collection(platform)
            .update_one(
                doc! { "post_id": post_id },
                doc! { "$set": {
                    "sentiment": sentiment_bson,
                    "entities": entities_bson,
                    "processed_text": processed_text,
                    "sentiment_updated_at": Utc::now().to_rfc3339(),
                }},
            )
            .await?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        platform: Platform,
        post_id: &str,
        error: &str,
    ) -> Result<(), StoreError> {
        self.collection(platform)
            .update_one(
                doc! { "post_id": post_id },
                doc! { "$set": {
                    "sentiment_analysis_failed": true,
                    "sentiment_error": error,
                }},
            )
            .await?;
        Ok(())
    }

    async fn mark_skipped(
        &self,
        platform: Platform,
        post_id: &str,
        reason: &str,
    ) -> Result<(), StoreError> {
        self.collection(platform)
            .update_one(
                doc! { "post_id": post_id },
                doc! { "$set": {
                    "sentiment_analysis_skipped": true,
                    "sentiment_skip_reason": reason,
                }},
            )
            .await?;
        Ok(())
    }
}
