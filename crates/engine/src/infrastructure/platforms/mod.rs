//! Publishing platform adapters.
//!
//! One adapter per platform, each a thin reqwest client over the platform's
//! REST API. Status codes are mapped to transient or terminal failures so
//! the dispatcher knows what to retry.

mod email;
mod social;
mod wordpress;

pub use email::PostmarkAdapter;
pub use social::{FacebookAdapter, LinkedInAdapter, TwitterAdapter};
pub use wordpress::WordPressAdapter;

use std::sync::Arc;
use std::time::Duration;

use quillcast_domain::Platform;
use reqwest::{Client, Response};

use crate::infrastructure::config::PlatformCredentials;
use crate::infrastructure::http_errors::{
    is_transient_send_error, is_transient_status, status_message,
};
use crate::infrastructure::ports::{PlatformAdapter, PublishError};

/// Adapters for every platform whose credentials are configured.
pub fn configured_adapters(
    credentials: &PlatformCredentials,
    timeout: Duration,
) -> Vec<Arc<dyn PlatformAdapter>> {
    let client = http_client(timeout);
    let mut adapters: Vec<Arc<dyn PlatformAdapter>> = Vec::new();

    if let Some(wp) = &credentials.wordpress {
        adapters.push(Arc::new(WordPressAdapter::new(client.clone(), wp.clone())));
    }
    if let Some(token) = &credentials.twitter_bearer_token {
        adapters.push(Arc::new(TwitterAdapter::new(client.clone(), token.clone())));
    }
    if let Some(fb) = &credentials.facebook {
        adapters.push(Arc::new(FacebookAdapter::new(client.clone(), fb.clone())));
    }
    if let Some(li) = &credentials.linkedin {
        adapters.push(Arc::new(LinkedInAdapter::new(client.clone(), li.clone())));
    }
    if let Some(pm) = &credentials.postmark {
        adapters.push(Arc::new(PostmarkAdapter::new(client, pm.clone())));
    }

    for platform in Platform::ALL {
        if !adapters.iter().any(|a| a.platform() == platform) {
            tracing::info!(platform = %platform, "Platform not configured");
        }
    }
    adapters
}

fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Map a send failure to a publish error.
fn send_error(platform: Platform, error: reqwest::Error) -> PublishError {
    if is_transient_send_error(&error) {
        PublishError::transient(platform, error)
    } else {
        PublishError::terminal(platform, error)
    }
}

/// Pass successful responses through; turn the rest into publish errors.
async fn check_status(platform: Platform, response: Response) -> Result<Response, PublishError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = status_message(status, &body);
    Err(if is_transient_status(status) {
        PublishError::transient(platform, message)
    } else {
        PublishError::terminal(platform, message)
    })
}

/// Decode a JSON body, treating a malformed one as a terminal failure.
async fn json_body<T: serde::de::DeserializeOwned>(
    platform: Platform,
    response: Response,
) -> Result<T, PublishError> {
    response
        .json()
        .await
        .map_err(|e| PublishError::terminal(platform, format!("unexpected response: {}", e)))
}

#[cfg(test)]
pub(crate) mod test_server {
    //! Local axum server standing in for a platform API.

    use axum::Router;

    /// Serve `router` on an ephemeral port and return its base URL.
    pub async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{}", addr)
    }
}
