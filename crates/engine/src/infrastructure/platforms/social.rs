//! Social network adapters: Twitter/X, Facebook pages, LinkedIn.

use async_trait::async_trait;
use quillcast_domain::Platform;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;

use super::{check_status, json_body, send_error};
use crate::infrastructure::config::{FacebookCredentials, LinkedInCredentials};
use crate::infrastructure::ports::{ExternalPost, PlatformAdapter, PostRequest, PublishError};

const TWITTER_API: &str = "https://api.twitter.com";
const FACEBOOK_GRAPH_API: &str = "https://graph.facebook.com/v18.0";
const LINKEDIN_API: &str = "https://api.linkedin.com";

// =============================================================================
// Twitter / X
// =============================================================================

pub struct TwitterAdapter {
    client: Client,
    bearer_token: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct TweetEnvelope {
    data: TweetData,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
}

impl TwitterAdapter {
    pub fn new(client: Client, bearer_token: String) -> Self {
        Self {
            client,
            bearer_token,
            api_base: TWITTER_API.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl PlatformAdapter for TwitterAdapter {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn create_post(&self, post: &PostRequest) -> Result<ExternalPost, PublishError> {
        let response = self
            .client
            .post(format!("{}/2/tweets", self.api_base))
            .bearer_auth(&self.bearer_token)
            .json(&json!({ "text": post.text }))
            .send()
            .await
            .map_err(|e| send_error(Platform::Twitter, e))?;

        let tweet: TweetEnvelope =
            json_body(Platform::Twitter, check_status(Platform::Twitter, response).await?).await?;

        Ok(ExternalPost {
            external_url: Some(format!("https://twitter.com/i/web/status/{}", tweet.data.id)),
            external_id: tweet.data.id,
        })
    }

    async fn delete_post(&self, external_id: &str) -> Result<(), PublishError> {
        let response = self
            .client
            .delete(format!("{}/2/tweets/{}", self.api_base, external_id))
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|e| send_error(Platform::Twitter, e))?;
        check_status(Platform::Twitter, response).await?;
        Ok(())
    }
}

// =============================================================================
// Facebook page feed
// =============================================================================

pub struct FacebookAdapter {
    client: Client,
    credentials: FacebookCredentials,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct GraphId {
    id: String,
}

impl FacebookAdapter {
    pub fn new(client: Client, credentials: FacebookCredentials) -> Self {
        Self {
            client,
            credentials,
            api_base: FACEBOOK_GRAPH_API.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl PlatformAdapter for FacebookAdapter {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    async fn create_post(&self, post: &PostRequest) -> Result<ExternalPost, PublishError> {
        let response = self
            .client
            .post(format!("{}/{}/feed", self.api_base, self.credentials.page_id))
            .json(&json!({
                "message": post.text,
                "access_token": self.credentials.access_token,
            }))
            .send()
            .await
            .map_err(|e| send_error(Platform::Facebook, e))?;

        let created: GraphId =
            json_body(Platform::Facebook, check_status(Platform::Facebook, response).await?)
                .await?;

        Ok(ExternalPost {
            external_url: Some(format!("https://www.facebook.com/{}", created.id)),
            external_id: created.id,
        })
    }

    async fn delete_post(&self, external_id: &str) -> Result<(), PublishError> {
        let response = self
            .client
            .delete(format!("{}/{}", self.api_base, external_id))
            .query(&[("access_token", self.credentials.access_token.as_str())])
            .send()
            .await
            .map_err(|e| send_error(Platform::Facebook, e))?;
        check_status(Platform::Facebook, response).await?;
        Ok(())
    }
}

// =============================================================================
// LinkedIn UGC posts
// =============================================================================

pub struct LinkedInAdapter {
    client: Client,
    credentials: LinkedInCredentials,
    api_base: String,
}

impl LinkedInAdapter {
    pub fn new(client: Client, credentials: LinkedInCredentials) -> Self {
        Self {
            client,
            credentials,
            api_base: LINKEDIN_API.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// `{api_base}/v2/ugcPosts[/{id}]`, with the post URN percent-encoded.
    fn ugc_url(&self, id: Option<&str>) -> Result<Url, PublishError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| PublishError::terminal(Platform::Linkedin, e))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| PublishError::terminal(Platform::Linkedin, "invalid API base"))?;
            segments.pop_if_empty().extend(["v2", "ugcPosts"]);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl PlatformAdapter for LinkedInAdapter {
    fn platform(&self) -> Platform {
        Platform::Linkedin
    }

    async fn create_post(&self, post: &PostRequest) -> Result<ExternalPost, PublishError> {
        let body = json!({
            "author": self.credentials.author_urn,
            "lifecycleState": "PUBLISHED",
            "specificContent": {
                "com.linkedin.ugc.ShareContent": {
                    "shareCommentary": { "text": post.text },
                    "shareMediaCategory": "NONE"
                }
            },
            "visibility": { "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC" }
        });

        let response = self
            .client
            .post(self.ugc_url(None)?)
            .bearer_auth(&self.credentials.access_token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(Platform::Linkedin, e))?;
        let response = check_status(Platform::Linkedin, response).await?;

        // The post URN comes back in a header; older API versions also echo it in the body.
        let header_id = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let id = match header_id {
            Some(id) => id,
            None => json_body::<GraphId>(Platform::Linkedin, response).await?.id,
        };

        Ok(ExternalPost {
            external_url: Some(format!("https://www.linkedin.com/feed/update/{}", id)),
            external_id: id,
        })
    }

    async fn delete_post(&self, external_id: &str) -> Result<(), PublishError> {
        let response = self
            .client
            .delete(self.ugc_url(Some(external_id))?)
            .bearer_auth(&self.credentials.access_token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .send()
            .await
            .map_err(|e| send_error(Platform::Linkedin, e))?;
        check_status(Platform::Linkedin, response).await?;
        Ok(())
    }
}
