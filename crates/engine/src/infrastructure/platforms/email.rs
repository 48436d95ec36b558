//! Email delivery through Postmark.

use async_trait::async_trait;
use quillcast_domain::Platform;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{check_status, json_body, send_error};
use crate::infrastructure::config::PostmarkCredentials;
use crate::infrastructure::ports::{ExternalPost, PlatformAdapter, PostRequest, PublishError};

const POSTMARK_API: &str = "https://api.postmarkapp.com";

pub struct PostmarkAdapter {
    client: Client,
    credentials: PostmarkCredentials,
    api_base: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Email<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
    message_stream: &'static str,
}

#[derive(Debug, Deserialize)]
struct Sent {
    #[serde(rename = "MessageID")]
    message_id: String,
}

impl PostmarkAdapter {
    pub fn new(client: Client, credentials: PostmarkCredentials) -> Self {
        Self {
            client,
            credentials,
            api_base: POSTMARK_API.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl PlatformAdapter for PostmarkAdapter {
    fn platform(&self) -> Platform {
        Platform::Email
    }

    async fn create_post(&self, post: &PostRequest) -> Result<ExternalPost, PublishError> {
        let response = self
            .client
            .post(format!("{}/email", self.api_base))
            .header("X-Postmark-Server-Token", &self.credentials.server_token)
            .header("Accept", "application/json")
            .json(&Email {
                from: &self.credentials.from,
                to: &self.credentials.to,
                subject: &post.title,
                text_body: &post.text,
                message_stream: "outbound",
            })
            .send()
            .await
            .map_err(|e| send_error(Platform::Email, e))?;

        let sent: Sent =
            json_body(Platform::Email, check_status(Platform::Email, response).await?).await?;

        Ok(ExternalPost {
            external_id: sent.message_id,
            external_url: None,
        })
    }

    async fn delete_post(&self, _external_id: &str) -> Result<(), PublishError> {
        Err(PublishError::terminal(
            Platform::Email,
            "sent email cannot be recalled",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_server;
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use quillcast_domain::ContentType;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn sends_email_with_server_token() {
        let router = Router::new().route(
            "/email",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(
                    headers
                        .get("x-postmark-server-token")
                        .and_then(|v| v.to_str().ok()),
                    Some("pm-token")
                );
                assert_eq!(body["Subject"], "Spring Sale");
                assert_eq!(body["TextBody"], "Body");
                Json(json!({"MessageID": "msg-1", "ErrorCode": 0}))
            }),
        );
        let base = test_server::spawn(router).await;
        let adapter = PostmarkAdapter::new(
            Client::new(),
            PostmarkCredentials {
                server_token: "pm-token".into(),
                from: "news@example.com".into(),
                to: "list@example.com".into(),
            },
        )
        .with_api_base(base);

        let sent = adapter
            .create_post(&PostRequest {
                title: "Spring Sale".into(),
                text: "Body".into(),
                excerpt: "Body".into(),
                tags: vec![],
                content_type: ContentType::Email,
            })
            .await
            .unwrap();
        assert_eq!(sent.external_id, "msg-1");

        let err = adapter.delete_post("msg-1").await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
