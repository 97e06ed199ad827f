//! Identity resolution for resources created asynchronously
//!
//! Some remote operations (a clone, for instance) answer "accepted" before
//! the new object can be queried. [`poll_unique`] repeats a search filtered by
//! the expected key until it yields exactly one entry:
//!
//! | search result      | classification                      |
//! |--------------------|-------------------------------------|
//! | no entries         | not visible yet, retried            |
//! | exactly one entry  | success                             |
//! | several entries    | [`Error::AmbiguousMatch`], terminal |
//! | transient error    | retried                             |
//! | other error        | terminal                            |
//!
//! The loop, delays and budget are those of [`RetryPolicy::run_classified`].

use std::future::Future;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::retry::{Attempt, RetryPolicy};

/// Search repeatedly until exactly one entry matches `expected_key`.
///
/// On exhaustion the error is [`Error::NotVisible`] when the last search came
/// back empty, or the last transient search failure otherwise.
pub async fn poll_unique<T, F, Fut>(
    policy: &RetryPolicy,
    expected_key: &str,
    mut search: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut calls: u32 = 0;

    let found = policy
        .run_classified(|| {
            calls += 1;
            let attempts = calls;
            let key = expected_key.to_owned();
            let fut = search();
            async move { classify(fut.await, key, attempts) }
        })
        .await?;

    info!("Resolved '{}' to a single entry", expected_key);
    Ok(found)
}

fn classify<T>(result: Result<Vec<T>>, key: String, attempts: u32) -> Attempt<T> {
    let mut entries = match result {
        Ok(entries) => entries,
        Err(e) => return Attempt::from_result(Err(e)),
    };

    match entries.len() {
        0 => {
            debug!("'{}' not visible yet (search {})", key, attempts);
            Attempt::Retry(Error::NotVisible { key, attempts })
        }
        1 => Attempt::Done(entries.remove(0)),
        count => Attempt::Fail(Error::AmbiguousMatch { key, count }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::custom(Duration::from_millis(1), Duration::from_secs(5), max_attempts)
    }

    #[tokio::test]
    async fn test_resolves_after_empty_searches() {
        let mut calls = 0;
        let found = poll_unique(&quick(10), "clone-1", || {
            calls += 1;
            let n = calls;
            async move { Ok(if n < 3 { vec![] } else { vec![7_i64] }) }
        })
        .await;

        assert_eq!(found.unwrap(), 7);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_ambiguous_match_is_terminal() {
        let mut calls = 0;
        let found = poll_unique(&quick(10), "clone-1", || {
            calls += 1;
            async { Ok(vec![7_i64, 8]) }
        })
        .await;

        assert_eq!(calls, 1);
        match found {
            Err(Error::AmbiguousMatch { key, count }) => {
                assert_eq!(key, "clone-1");
                assert_eq!(count, 2);
            }
            other => panic!("expected ambiguous match, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_never_appeared_is_distinguished() {
        let mut calls = 0;
        let found: Result<i64> = poll_unique(&quick(4), "clone-1", || {
            calls += 1;
            async { Ok(vec![]) }
        })
        .await;

        assert_eq!(calls, 4);
        match found {
            Err(Error::NotVisible { key, attempts }) => {
                assert_eq!(key, "clone-1");
                assert_eq!(attempts, 4);
            }
            other => panic!("expected not visible, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transient_search_errors_are_retried() {
        let mut calls = 0;
        let found = poll_unique(&quick(5), "clone-1", || {
            calls += 1;
            let n = calls;
            async move {
                if n == 1 {
                    Err(Error::transient("gateway timeout"))
                } else {
                    Ok(vec![String::from("clone-1")])
                }
            }
        })
        .await;

        assert_eq!(found.unwrap(), "clone-1");
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_terminal_search_error_stops_polling() {
        let mut calls = 0;
        let found: Result<i64> = poll_unique(&quick(5), "clone-1", || {
            calls += 1;
            async { Err(Error::auth("token expired")) }
        })
        .await;

        assert_eq!(calls, 1);
        assert!(matches!(found, Err(Error::Authentication(_))));
    }
}
