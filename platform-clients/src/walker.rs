use crate::fetch::{FetchClient, PageSink};
use crate::pacing::PacingConfig;
use croplisten_core::PlatformApiError;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Walker states. `HasCursor` waits out the pacing delay and loops back
/// into `Fetching`; `Exhausted` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum WalkerState {
    Idle,
    Fetching,
    HasCursor(String),
    Exhausted,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct WalkConfig {
    /// Stop once this many records have been saved
    pub max_posts: usize,
    pub pacing: PacingConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WalkOutcome {
    /// The platform ran out of results
    Exhausted,
    /// The configured ceiling was reached; the cursor was discarded
    CeilingReached,
    /// Unrecoverable fetch failure; already-persisted records remain valid
    Failed(String),
}

#[derive(Debug)]
pub struct WalkReport {
    pub pages_fetched: u32,
    pub saved: usize,
    pub outcome: WalkOutcome,
}

/// Drive a full paginated search: fetch, save, flush, wait, repeat until
/// the results run out, the ceiling is hit, or the client fails
/// permanently. Persistence failures are logged and never stop the walk.
pub async fn walk(
    client: &mut dyn FetchClient,
    sink: &mut dyn PageSink,
    query: &str,
    config: &WalkConfig,
) -> WalkReport {
    let platform = client.platform();
    let mut state = WalkerState::Idle;
    let mut cursor: Option<String> = None;
    let mut pages_fetched: u32 = 0;

    info!(%platform, %query, max_posts = config.max_posts, "starting paginated walk");

    loop {
        state = match state {
            WalkerState::Idle => WalkerState::Fetching,

            WalkerState::HasCursor(next) => {
                sleep(config.pacing.next_delay()).await;
                cursor = Some(next);
                WalkerState::Fetching
            }

            WalkerState::Fetching => match client.fetch(query, cursor.as_deref()).await {
                Err(err) => {
                    error!(%platform, error = %err, "walk failed, keeping partial results");
                    WalkerState::Failed(err.to_string())
                }
                Ok(page) => {
                    pages_fetched += 1;

                    let page_empty = page.posts.is_empty();
                    let mut ceiling_hit = false;
                    for post in page.posts {
                        if sink.saved_count() >= config.max_posts {
                            ceiling_hit = true;
                            break;
                        }
                        sink.save(post);
                    }
                    ceiling_hit = ceiling_hit || sink.saved_count() >= config.max_posts;

                    if let Err(err) = sink.flush().await {
                        warn!(%platform, error = %err, "persistence failed for this page, continuing");
                    }

                    if ceiling_hit {
                        info!(%platform, saved = sink.saved_count(), "reached post ceiling, stopping");
                        return WalkReport {
                            pages_fetched,
                            saved: sink.saved_count(),
                            outcome: WalkOutcome::CeilingReached,
                        };
                    }

                    match page.next_cursor {
                        Some(next) if !next.is_empty() && !page_empty => {
                            WalkerState::HasCursor(next)
                        }
                        _ => WalkerState::Exhausted,
                    }
                }
            },

            WalkerState::Exhausted => {
                info!(%platform, saved = sink.saved_count(), pages = pages_fetched, "results exhausted");
                return WalkReport {
                    pages_fetched,
                    saved: sink.saved_count(),
                    outcome: WalkOutcome::Exhausted,
                };
            }

            WalkerState::Failed(reason) => {
                return WalkReport {
                    pages_fetched,
                    saved: sink.saved_count(),
                    outcome: WalkOutcome::Failed(reason),
                };
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchPage;
    use async_trait::async_trait;
    use chrono::Utc;
    use croplisten_core::{Platform, Post, StoreError};

    fn post(id: &str) -> Post {
        Post {
            post_id: id.to_string(),
            username: "u".to_string(),
            user_location: String::new(),
            content_text: "t".to_string(),
            url: String::new(),
            created_at: String::new(),
            likes: 0,
            comments: 0,
            platform: Platform::Reddit,
            topic_classification: "General".to_string(),
            collected_at: Utc::now(),
        }
    }

    struct ScriptedClient {
        pages: Vec<Result<FetchPage, PlatformApiError>>,
        calls: Vec<Option<String>>,
    }

    #[async_trait]
    impl FetchClient for ScriptedClient {
        fn platform(&self) -> Platform {
            Platform::Reddit
        }

        async fn fetch(
            &mut self,
            _query: &str,
            cursor: Option<&str>,
        ) -> Result<FetchPage, PlatformApiError> {
            self.calls.push(cursor.map(String::from));
            self.pages.remove(0)
        }
    }

    struct CountingSink {
        saved: Vec<Post>,
        flushes: u32,
        fail_flush: bool,
    }

    impl CountingSink {
        fn new() -> Self {
            Self {
                saved: Vec::new(),
                flushes: 0,
                fail_flush: false,
            }
        }
    }

    #[async_trait]
    impl PageSink for CountingSink {
        fn save(&mut self, post: Post) -> bool {
            self.saved.push(post);
            true
        }

        async fn flush(&mut self) -> Result<usize, StoreError> {
            self.flushes += 1;
            if self.fail_flush {
                Err(StoreError::BulkInsertFailed {
                    details: "store down".to_string(),
                })
            } else {
                Ok(self.saved.len())
            }
        }

        fn saved_count(&self) -> usize {
            self.saved.len()
        }
    }

    fn config(max_posts: usize) -> WalkConfig {
        WalkConfig {
            max_posts,
            pacing: PacingConfig::reddit(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_fetch_exhaustion() {
        let mut client = ScriptedClient {
            pages: vec![
                Ok(FetchPage {
                    posts: vec![post("a"), post("b")],
                    next_cursor: Some("c1".to_string()),
                }),
                Ok(FetchPage {
                    posts: vec![],
                    next_cursor: None,
                }),
            ],
            calls: Vec::new(),
        };
        let mut sink = CountingSink::new();
        let report = walk(&mut client, &mut sink, "q", &config(100))
            .await;
        assert_eq!(report.outcome, WalkOutcome::Exhausted);
        assert_eq!(report.pages_fetched, 2);
        assert_eq!(report.saved, 2);
        // First call with no cursor, second with the returned one
        assert_eq!(client.calls, vec![None, Some("c1".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_stops_walk() {
        let mut client = ScriptedClient {
            pages: vec![
                Ok(FetchPage {
                    posts: vec![post("a"), post("b")],
                    next_cursor: Some("c1".to_string()),
                }),
                Ok(FetchPage {
                    posts: vec![post("c"), post("d")],
                    next_cursor: Some("c2".to_string()),
                }),
            ],
            calls: Vec::new(),
        };
        let mut sink = CountingSink::new();
        let report = walk(&mut client, &mut sink, "q", &config(3)).await;
        assert_eq!(report.outcome, WalkOutcome::CeilingReached);
        assert_eq!(report.saved, 3);
        assert_eq!(report.pages_fetched, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_cursor_exhausts() {
        let mut client = ScriptedClient {
            pages: vec![Ok(FetchPage {
                posts: vec![post("a")],
                next_cursor: None,
            })],
            calls: Vec::new(),
        };
        let mut sink = CountingSink::new();
        let report = walk(&mut client, &mut sink, "q", &config(100))
            .await;
        assert_eq!(report.outcome, WalkOutcome::Exhausted);
        assert_eq!(report.saved, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_keeps_partial_results() {
        let mut client = ScriptedClient {
            pages: vec![
                Ok(FetchPage {
                    posts: vec![post("a")],
                    next_cursor: Some("c1".to_string()),
                }),
                Err(PlatformApiError::RetriesExhausted {
                    attempts: 3,
                    details: "gateway".to_string(),
                }),
            ],
            calls: Vec::new(),
        };
        let mut sink = CountingSink::new();
        let report = walk(&mut client, &mut sink, "q", &config(100))
            .await;
        assert!(matches!(report.outcome, WalkOutcome::Failed(_)));
        assert_eq!(report.saved, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_failure_does_not_abort() {
        let mut client = ScriptedClient {
            pages: vec![
                Ok(FetchPage {
                    posts: vec![post("a")],
                    next_cursor: Some("c1".to_string()),
                }),
                Ok(FetchPage {
                    posts: vec![post("b")],
                    next_cursor: None,
                }),
            ],
            calls: Vec::new(),
        };
        let mut sink = CountingSink::new();
        sink.fail_flush = true;
        let report = walk(&mut client, &mut sink, "q", &config(100))
            .await;
        assert_eq!(report.outcome, WalkOutcome::Exhausted);
        assert_eq!(sink.flushes, 2);
        assert_eq!(report.saved, 2);
    }
}
