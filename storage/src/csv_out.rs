use croplisten_core::{Post, StoreError};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fixed CSV layout shared by every platform's output file. Sentiment is
/// never written here; it lives only in the document store.
pub const CSV_HEADER: [&str; 10] = [
    "post_id",
    "username",
    "user_location",
    "content_text",
    "url",
    "created_at",
    "likes",
    "comments",
    "platform",
    "topic_classification",
];

/// Append-only CSV writer. The header is written once, when the target
/// file is created empty; later appends go straight to rows.
pub struct CsvAppender {
    path: PathBuf,
}

impl CsvAppender {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, posts: &[Post]) -> Result<usize, StoreError> {
        if posts.is_empty() {
            return Ok(0);
        }

        let fresh = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::Writer::from_writer(file);

        if fresh {
            writer.write_record(CSV_HEADER)?;
        }

        for post in posts {
            writer.write_record([
                post.post_id.as_str(),
                post.username.as_str(),
                post.user_location.as_str(),
                post.content_text.as_str(),
                post.url.as_str(),
                post.created_at.as_str(),
                &post.likes.to_string(),
                &post.comments.to_string(),
                post.platform.as_str(),
                post.topic_classification.as_str(),
            ])?;
        }
        writer.flush()?;

        debug!(count = posts.len(), path = %self.path.display(), "appended posts to CSV");
        Ok(posts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use croplisten_core::Platform;

    fn post(id: &str, text: &str) -> Post {
        Post {
            post_id: id.to_string(),
            username: "grower".to_string(),
            user_location: String::new(),
            content_text: text.to_string(),
            url: format!("https://example.com/{id}"),
            created_at: "2024-05-01T10:00:00+00:00".to_string(),
            likes: 1,
            comments: 2,
            platform: Platform::Reddit,
            topic_classification: "Agriculture".to_string(),
            collected_at: Utc::now(),
        }
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.csv");
        let appender = CsvAppender::new(&path);

        appender.append(&[post("a", "one")]).unwrap();
        appender.append(&[post("b", "two")]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("post_id,username"));
        assert_eq!(content.matches("post_id,username").count(), 1);
    }

    #[test]
    fn test_fields_with_commas_and_quotes_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.csv");
        let appender = CsvAppender::new(&path);

        appender
            .append(&[post("a", "wheat, barley and \"rust\" damage")])
            .unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[3], "wheat, barley and \"rust\" damage");
        assert_eq!(record.len(), 10);
    }

    #[test]
    fn test_empty_append_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posts.csv");
        let appender = CsvAppender::new(&path);
        assert_eq!(appender.append(&[]).unwrap(), 0);
        assert!(!path.exists());
    }
}
