//! `websearch:` effector

use deploy_core::Searcher;
use tracing::instrument;

use super::ToolResult;

/// Delegate the query to the search backend. Backend failures arrive as
/// text, so this always succeeds.
#[instrument(skip(searcher))]
pub async fn web_search(searcher: &dyn Searcher, query: &str) -> ToolResult {
    ToolResult::success(searcher.search(query).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoSearch;

    #[async_trait]
    impl Searcher for EchoSearch {
        fn status(&self) -> String {
            "echo search".to_string()
        }

        async fn search(&self, query: &str) -> String {
            format!("results for {}", query)
        }
    }

    #[tokio::test]
    async fn test_web_search_wraps_text() {
        let result = web_search(&EchoSearch, "aws lambda limits").await;
        assert!(result.success);
        assert_eq!(result.output, "results for aws lambda limits");
    }
}
