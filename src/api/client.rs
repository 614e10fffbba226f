// SPDX-License-Identifier: MPL-2.0

use crate::api::types::{
    Ack, Envelope, ListQuery, LoginData, LoginResult, NewStory, PushSubscriptionPayload, Story,
    StoryData, StoryListData,
};
use crate::net::{Fetch, FormPart, Method, PartValue, Request, ResponseSource};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Nothing reachable (includes the cache layer's offline placeholder)
    #[error("network error: {0}")]
    Network(String),
    /// Reachable, but the server said no
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }
}

/// A decoded payload plus where it came from
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub value: T,
    pub message: String,
    pub source: ResponseSource,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Remote story API. All traffic goes through the supplied fetcher.
pub struct StoryClient<F> {
    fetcher: F,
    base: Url,
}

impl<F: Fetch> StoryClient<F> {
    pub fn new(fetcher: F, base: Url) -> Self {
        Self { fetcher, base }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<String, ClientError> {
        let request = Request::new(Method::POST, self.endpoint(&["register"])?).json(json!({
            "name": name,
            "email": email,
            "password": password,
        }));

        let fetched: Fetched<Ack> = self.send(request).await?;
        Ok(fetched.message)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResult, ClientError> {
        let request = Request::new(Method::POST, self.endpoint(&["login"])?).json(json!({
            "email": email,
            "password": password,
        }));

        let fetched: Fetched<LoginData> = self.send(request).await?;
        Ok(fetched.value.login_result)
    }

    pub async fn list_stories(
        &self,
        token: &str,
        query: &ListQuery,
    ) -> Result<Fetched<Vec<Story>>, ClientError> {
        let mut url = self.endpoint(&["stories"])?;
        url.query_pairs_mut()
            .append_pair("page", &query.page.to_string())
            .append_pair("size", &query.size.to_string())
            .append_pair("location", if query.with_location { "1" } else { "0" });

        let fetched: Fetched<StoryListData> =
            self.send(Request::get(url).bearer(Some(token))).await?;

        Ok(Fetched {
            value: fetched.value.list_story,
            message: fetched.message,
            source: fetched.source,
        })
    }

    pub async fn get_story(&self, token: &str, id: &str) -> Result<Fetched<Story>, ClientError> {
        let url = self.endpoint(&["stories", id])?;
        let fetched: Fetched<StoryData> = self.send(Request::get(url).bearer(Some(token))).await?;

        Ok(Fetched {
            value: fetched.value.story,
            message: fetched.message,
            source: fetched.source,
        })
    }

    pub async fn create_story(&self, token: &str, story: &NewStory) -> Result<String, ClientError> {
        let request = Request::new(Method::POST, self.endpoint(&["stories"])?)
            .bearer(Some(token))
            .multipart(Self::story_form(story));

        let fetched: Fetched<Ack> = self.send(request).await?;
        Ok(fetched.message)
    }

    /// Create a story without a session
    pub async fn create_story_guest(&self, story: &NewStory) -> Result<String, ClientError> {
        let request = Request::new(Method::POST, self.endpoint(&["stories", "guest"])?)
            .multipart(Self::story_form(story));

        let fetched: Fetched<Ack> = self.send(request).await?;
        Ok(fetched.message)
    }

    pub async fn subscribe_push(
        &self,
        token: &str,
        subscription: &PushSubscriptionPayload,
    ) -> Result<String, ClientError> {
        let body = serde_json::to_value(subscription)
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        let request = Request::new(Method::POST, self.endpoint(&["notifications", "subscribe"])?)
            .bearer(Some(token))
            .json(body);

        let fetched: Fetched<Ack> = self.send(request).await?;
        Ok(fetched.message)
    }

    pub async fn unsubscribe_push(&self, token: &str, endpoint: &str) -> Result<String, ClientError> {
        let request = Request::new(Method::DELETE, self.endpoint(&["notifications", "subscribe"])?)
            .bearer(Some(token))
            .json(json!({ "endpoint": endpoint }));

        let fetched: Fetched<Ack> = self.send(request).await?;
        Ok(fetched.message)
    }

    /// Append path segments to the base URL (which already ends in the API version)
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidResponse(format!("invalid API base: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn story_form(story: &NewStory) -> Vec<FormPart> {
        let mut parts = vec![
            FormPart::text("description", story.description.clone()),
            FormPart {
                name: "photo".to_string(),
                value: PartValue::File {
                    file_name: story.photo.file_name.clone(),
                    mime_type: story.photo.mime_type.clone(),
                    bytes: story.photo.bytes.clone(),
                },
            },
        ];

        if let Some(location) = story.location {
            parts.push(FormPart::text("lat", location.lat.to_string()));
            parts.push(FormPart::text("lon", location.lon.to_string()));
        }

        parts
    }

    async fn send<T: DeserializeOwned>(&self, request: Request) -> Result<Fetched<T>, ClientError> {
        let method = request.method.clone();
        let url = request.url.clone();

        let response = self
            .fetcher
            .fetch(request)
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if response.source() == ResponseSource::Offline {
            return Err(ClientError::Network("offline".to_string()));
        }

        let status = response.status();
        let source = response.source();
        let body = response.bytes();

        debug!(%method, %url, status = status.as_u16(), ?source, "api response");

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .map(|b| b.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope<T> = serde_json::from_slice(&body)
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        if envelope.error {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: envelope.message,
            });
        }

        Ok(Fetched {
            value: envelope.data,
            message: envelope.message,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{Body, StatusCode};
    use crate::testing::{ScriptedNetwork, new_story, story_json};
    use std::sync::Arc;

    fn client(network: &Arc<ScriptedNetwork>) -> StoryClient<Arc<ScriptedNetwork>> {
        StoryClient::new(
            network.clone(),
            Url::parse("https://api.example.com/v1").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_list_stories_builds_query_and_bearer() {
        let network = Arc::new(ScriptedNetwork::new());
        network.reply_json(
            Method::GET,
            "/v1/stories",
            StatusCode::OK,
            json!({"error": false, "message": "ok", "listStory": [story_json("a")]}),
        );

        let query = ListQuery {
            with_location: true,
            ..ListQuery::default()
        };
        let fetched = client(&network).list_stories("tok", &query).await.unwrap();

        assert_eq!(fetched.value.len(), 1);
        assert_eq!(fetched.source, ResponseSource::Network);

        let sent = network.requests();
        assert_eq!(sent[0].bearer.as_deref(), Some("tok"));
        assert_eq!(sent[0].url.query(), Some("page=1&size=20&location=1"));
    }

    #[tokio::test]
    async fn test_rejection_carries_server_message() {
        let network = Arc::new(ScriptedNetwork::new());
        network.reply_json(
            Method::POST,
            "/v1/login",
            StatusCode::UNAUTHORIZED,
            json!({"error": true, "message": "Invalid password"}),
        );

        let err = client(&network).login("a@b.co", "wrongpass").await.unwrap_err();
        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid password");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_is_network_error() {
        let network = Arc::new(ScriptedNetwork::new());
        network.set_offline(true);

        let err = client(&network).get_story("tok", "a").await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_create_story_sends_multipart_with_location() {
        let network = Arc::new(ScriptedNetwork::new());
        network.reply_json(
            Method::POST,
            "/v1/stories",
            StatusCode::CREATED,
            json!({"error": false, "message": "Story created successfully"}),
        );

        let mut story = new_story("sunset");
        story.location = Some(crate::api::Coordinates { lat: 1.5, lon: 2.5 });
        let message = client(&network).create_story("tok", &story).await.unwrap();
        assert_eq!(message, "Story created successfully");

        let sent = network.requests();
        let Body::Multipart(parts) = &sent[0].body else {
            panic!("expected multipart body");
        };
        let names: Vec<_> = parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["description", "photo", "lat", "lon"]);
    }

    #[tokio::test]
    async fn test_guest_story_has_no_bearer() {
        let network = Arc::new(ScriptedNetwork::new());
        network.reply_json(
            Method::POST,
            "/v1/stories/guest",
            StatusCode::CREATED,
            json!({"error": false, "message": "created"}),
        );

        client(&network)
            .create_story_guest(&new_story("guest post"))
            .await
            .unwrap();

        assert_eq!(network.requests()[0].bearer, None);
    }

    #[tokio::test]
    async fn test_unsubscribe_uses_delete_with_endpoint() {
        let network = Arc::new(ScriptedNetwork::new());
        network.reply_json(
            Method::DELETE,
            "/v1/notifications/subscribe",
            StatusCode::OK,
            json!({"error": false, "message": "unsubscribed"}),
        );

        client(&network)
            .unsubscribe_push("tok", "https://push.example/abc")
            .await
            .unwrap();

        let sent = network.requests();
        assert_eq!(
            sent[0].body,
            Body::Json(json!({"endpoint": "https://push.example/abc"}))
        );
    }
}
