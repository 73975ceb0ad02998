#[cfg(test)]
mod tests {
    use crate::{
        CollectPolicy, CollectStatus, Collector, PostSource, RedditClient, RedditOAuth2Config,
        RedditToken,
    };
    use logipost_core::ShutdownState;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use logipost_core::{Classifier, KeywordTable, Topic};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::time::{Duration, SystemTime};

    fn create_test_config(token_url: String) -> RedditOAuth2Config {
        RedditOAuth2Config {
            client_id: "test_client_id".to_string(),
            client_secret: "test_client_secret".to_string(),
            user_agent: "logipost/1.0 by test_user".to_string(),
            token_url,
        }
    }

    async fn token(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
        let user_agent = headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !user_agent.starts_with("logipost/1.0") {
            return Err(StatusCode::TOO_MANY_REQUESTS);
        }
        Ok(Json(json!({
            "access_token": "test-token",
            "token_type": "bearer",
            "expires_in": 3600,
            "scope": "*"
        })))
    }

    fn post_child(id: &str, title: &str, score: i64) -> Value {
        json!({"kind": "t3", "data": {
            "id": id, "title": title, "selftext": "body of post", "author": "bob",
            "subreddit": "logistics", "url": format!("https://reddit.com/{id}"),
            "permalink": format!("/r/logistics/comments/{id}"), "created_utc": 1700000000.0,
            "score": score, "num_comments": 1, "stickied": false
        }})
    }

    /// Two pages of posts: p1..p2 then p3, linked by the `after` cursor.
    async fn new_posts(
        headers: HeaderMap,
        Query(params): Query<HashMap<String, String>>,
    ) -> Result<Json<Value>, StatusCode> {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer test-token")
        {
            return Err(StatusCode::UNAUTHORIZED);
        }
        let limit: usize = params
            .get("limit")
            .and_then(|l| l.parse().ok())
            .unwrap_or(100);
        let (children, after) = match params.get("after").map(String::as_str) {
            None => (
                vec![
                    post_child("p1", "Freight rates keep climbing", 10),
                    post_child("p2", "Warehouse staffing question", 4),
                ],
                Some("t3_p2"),
            ),
            Some("t3_p2") => (vec![post_child("p3", "Carrier pickup missed", 1)], None),
            Some(_) => (Vec::new(), None),
        };
        let children: Vec<Value> = children.into_iter().take(limit).collect();
        Ok(Json(json!({
            "kind": "Listing",
            "data": {"children": children, "after": after, "before": null}
        })))
    }

    /// First page succeeds, every later page is a 503.
    async fn flaky_posts(
        Query(params): Query<HashMap<String, String>>,
    ) -> Result<Json<Value>, StatusCode> {
        if params.contains_key("after") {
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        }
        Ok(Json(json!({
            "kind": "Listing",
            "data": {
                "children": [post_child("f1", "Port congestion update", 5), post_child("f2", "Reefer capacity", 2)],
                "after": "t3_f2",
                "before": null
            }
        })))
    }

    async fn comments(Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
        if id == "p2" {
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
        Ok(Json(json!([
            {"kind": "Listing", "data": {"children": [], "after": null, "before": null}},
            {"kind": "Listing", "data": {"after": null, "before": null, "children": [
                {"kind": "t1", "data": {"author": "alice", "body": "same here", "score": 2, "created_utc": 1700000100.0}},
                {"kind": "more", "data": {"count": 3, "children": ["a"]}}
            ]}}
        ])))
    }

    async fn spawn_reddit() -> String {
        let app = Router::new()
            .route("/api/v1/access_token", post(token))
            .route("/r/logistics/new", get(new_posts))
            .route("/r/flaky/new", get(flaky_posts))
            .route("/comments/{id}", get(comments));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn test_client() -> RedditClient {
        let base = spawn_reddit().await;
        RedditClient::new(create_test_config(format!("{base}/api/v1/access_token")))
            .unwrap()
            .with_api_base(&base)
    }

    #[test]
    fn test_token_freshness() {
        let fresh = RedditToken {
            access_token: "a".to_string(),
            expires_at: SystemTime::now() + Duration::from_secs(3600),
        };
        let stale = RedditToken {
            access_token: "b".to_string(),
            expires_at: SystemTime::now() + Duration::from_secs(10),
        };
        assert!(fresh.is_fresh());
        assert!(!stale.is_fresh());
    }

    #[tokio::test]
    async fn test_fetch_follows_pagination_and_attaches_comments() {
        let client = test_client().await;

        let posts = client.fetch_new("logistics", 10).await.unwrap();

        let titles: Vec<&str> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Freight rates keep climbing",
                "Warehouse staffing question",
                "Carrier pickup missed"
            ]
        );
        assert_eq!(posts[0].comments.len(), 1);
        assert_eq!(posts[0].comments[0].content, "same here");
        // Comment failure keeps the post with no comments.
        assert!(posts[1].comments.is_empty());
        assert_eq!(posts[2].upvotes, 1);
    }

    #[tokio::test]
    async fn test_fetch_respects_limit() {
        let client = test_client().await;

        let posts = client.fetch_new("logistics", 1).await.unwrap();
        assert_eq!(posts.len(), 1);

        let metrics = client.api().get_metrics().await;
        assert_eq!(metrics.requests_by_endpoint["listing"].request_count, 1);
    }

    #[tokio::test]
    async fn test_fetch_classifies_posts() {
        let classifier = Classifier::new(
            KeywordTable::new(vec![Topic::new("Freight Rates", &["freight"])]),
            "general",
        );
        let client = test_client().await.with_classifier(classifier);

        let posts = client.fetch_new("logistics", 2).await.unwrap();
        assert_eq!(posts[0].category.as_deref(), Some("Freight Rates"));
        assert_eq!(posts[1].category.as_deref(), Some("general"));
    }

    #[tokio::test]
    async fn test_unknown_subreddit_is_an_error_the_collector_skips() {
        let client = test_client().await;
        assert!(client.fetch_new("nosuchplace", 5).await.is_err());

        let policy = CollectPolicy {
            target: 2,
            initial_limit: 5,
            limit_step: None,
            max_limit: 5,
            max_rounds: 3,
        };
        let sources = vec!["nosuchplace".to_string(), "logistics".to_string()];
        let collector = Collector::new(&client, sources, policy);
        let mut posts = Vec::new();

        let report = collector.collect_into(&mut posts).await;
        assert_eq!(report.status, CollectStatus::Complete);
        assert_eq!(report.failed_fetches, 1);
        assert_eq!(posts.len(), 2);
    }

    #[tokio::test]
    async fn test_later_page_failure_keeps_fetched_posts() {
        let client = test_client().await;

        let posts = client.fetch_new("flaky", 10).await.unwrap();

        let titles: Vec<&str> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Port congestion update", "Reefer capacity"]);
        assert_eq!(posts[0].comments.len(), 1);

        let metrics = client.api().get_metrics().await;
        assert_eq!(metrics.requests_by_endpoint["listing"].request_count, 2);
    }

    #[tokio::test]
    async fn test_stop_request_skips_comment_lookups() {
        let shutdown = ShutdownState::new();
        let client = test_client().await.with_shutdown(shutdown.clone());
        shutdown.start_shutdown();

        let posts = client.fetch_new("logistics", 10).await.unwrap();
        assert!(posts.is_empty());

        let metrics = client.api().get_metrics().await;
        assert_eq!(metrics.requests_by_endpoint["listing"].request_count, 1);
        assert!(!metrics.requests_by_endpoint.contains_key("comments"));
    }
}
