//! WordPress REST API adapter (application-password auth).

use async_trait::async_trait;
use quillcast_domain::Platform;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{check_status, json_body, send_error};
use crate::infrastructure::config::WordPressCredentials;
use crate::infrastructure::ports::{ExternalPost, PlatformAdapter, PostRequest, PublishError};

pub struct WordPressAdapter {
    client: Client,
    credentials: WordPressCredentials,
}

#[derive(Debug, Serialize)]
struct CreatePost<'a> {
    title: &'a str,
    content: &'a str,
    excerpt: &'a str,
    status: &'static str,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: u64,
    #[serde(default)]
    link: Option<String>,
}

impl WordPressAdapter {
    pub fn new(client: Client, credentials: WordPressCredentials) -> Self {
        Self {
            client,
            credentials,
        }
    }

    fn posts_url(&self) -> String {
        format!(
            "{}/wp-json/wp/v2/posts",
            self.credentials.url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl PlatformAdapter for WordPressAdapter {
    fn platform(&self) -> Platform {
        Platform::Wordpress
    }

    async fn create_post(&self, post: &PostRequest) -> Result<ExternalPost, PublishError> {
        let response = self
            .client
            .post(self.posts_url())
            .basic_auth(&self.credentials.username, Some(&self.credentials.app_password))
            .json(&CreatePost {
                title: &post.title,
                content: &post.text,
                excerpt: &post.excerpt,
                status: "publish",
            })
            .send()
            .await
            .map_err(|e| send_error(Platform::Wordpress, e))?;

        let created: CreatedPost =
            json_body(Platform::Wordpress, check_status(Platform::Wordpress, response).await?)
                .await?;

        Ok(ExternalPost {
            external_id: created.id.to_string(),
            external_url: created.link,
        })
    }

    async fn delete_post(&self, external_id: &str) -> Result<(), PublishError> {
        let response = self
            .client
            .delete(format!("{}/{}", self.posts_url(), external_id))
            .query(&[("force", "true")])
            .basic_auth(&self.credentials.username, Some(&self.credentials.app_password))
            .send()
            .await
            .map_err(|e| send_error(Platform::Wordpress, e))?;

        check_status(Platform::Wordpress, response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_server;
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{delete, post};
    use axum::{Json, Router};
    use quillcast_domain::ContentType;
    use serde_json::{json, Value};

    fn post_request() -> PostRequest {
        PostRequest {
            title: "Spring Sale".into(),
            text: "Everything must go.".into(),
            excerpt: "Everything".into(),
            tags: vec![],
            content_type: ContentType::BlogPost,
        }
    }

    fn adapter(url: String) -> WordPressAdapter {
        WordPressAdapter::new(
            Client::new(),
            WordPressCredentials {
                url,
                username: "editor".into(),
                app_password: "app pw".into(),
            },
        )
    }

    #[tokio::test]
    async fn creates_post_with_basic_auth() {
        let router = Router::new().route(
            "/wp-json/wp/v2/posts",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let authorized = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|v| v.starts_with("Basic "));
                if !authorized || body["status"] != "publish" || body["title"] != "Spring Sale" {
                    return (StatusCode::BAD_REQUEST, Json(json!({})));
                }
                (
                    StatusCode::CREATED,
                    Json(json!({"id": 42, "link": "https://blog.example/spring-sale"})),
                )
            }),
        );
        let base = test_server::spawn(router).await;

        let created = adapter(base).create_post(&post_request()).await.unwrap();
        assert_eq!(created.external_id, "42");
        assert_eq!(
            created.external_url.as_deref(),
            Some("https://blog.example/spring-sale")
        );
    }

    #[tokio::test]
    async fn server_errors_are_transient_and_auth_errors_terminal() {
        let router = Router::new()
            .route(
                "/wp-json/wp/v2/posts",
                post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
            )
            .route(
                "/wp-json/wp/v2/posts/{id}",
                delete(|| async { (StatusCode::UNAUTHORIZED, "bad password") }),
            );
        let base = test_server::spawn(router).await;
        let adapter = adapter(base);

        let err = adapter.create_post(&post_request()).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("HTTP 503"));

        let err = adapter.delete_post("42").await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn unreachable_host_is_transient() {
        // Bind and drop a listener to get a port nobody serves.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = adapter(format!("http://{}", addr))
            .create_post(&post_request())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
