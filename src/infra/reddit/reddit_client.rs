use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::core::platform::{
    BanRequest, CommentRequest, NewWidget, PlatformError, RedditPlatform, RequestContext, Widget,
};
use crate::core::submissions::{
    Author, CommentSubmit, Community, ContentRef, FeedItem, PostSubmit, SubmissionFeed,
};

const AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_URL: &str = "https://oauth.reddit.com";
const LISTING_LIMIT: &str = "50";

/// Refresh the token a minute before Reddit says it expires.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Credentials of a Reddit "script" app.
#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Minimal Reddit OAuth client. It only exposes the calls the core layer needs.
pub struct RedditApiClient {
    client: Client,
    credentials: RedditCredentials,
    token: RwLock<Option<AccessToken>>,
    auth_url: String,
    api_url: String,
}

fn api_error(e: reqwest::Error) -> PlatformError {
    PlatformError::Api(e.to_string())
}

impl RedditApiClient {
    pub fn new(credentials: RedditCredentials) -> Result<Self, PlatformError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&credentials.user_agent)
                .map_err(|e| PlatformError::Api(e.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(api_error)?;

        Ok(Self {
            client,
            credentials,
            token: RwLock::new(None),
            auth_url: AUTH_URL.to_string(),
            api_url: API_URL.to_string(),
        })
    }

    /// The account the bot runs as. Its fullname is what self-filtering compares against.
    pub async fn me(&self) -> Result<Author, PlatformError> {
        let resp = self
            .authorized(self.client.get(format!("{}/api/v1/me", self.api_url)))
            .await?;
        let me: ApiMe = resp.json().await.map_err(api_error)?;

        Ok(Author {
            id: format!("t2_{}", me.id),
            name: me.name,
        })
    }

    async fn bearer(&self) -> Result<String, PlatformError> {
        if let Some(token) = self.token.read().await.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.value.clone());
            }
        }

        let mut guard = self.token.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = guard.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.value.clone());
            }
        }

        let token = self.fetch_token().await?;
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }

    async fn fetch_token(&self) -> Result<AccessToken, PlatformError> {
        let creds = &self.credentials;
        let resp = self
            .client
            .post(&self.auth_url)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", creds.username.as_str()),
                ("password", creds.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PlatformError::Auth(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(PlatformError::Auth(format!(
                "token endpoint returned {}",
                resp.status()
            )));
        }

        let body: ApiToken = resp
            .json()
            .await
            .map_err(|e| PlatformError::Auth(e.to_string()))?;

        match (body.access_token, body.error) {
            (Some(value), _) => {
                let lifetime = body.expires_in.unwrap_or(3600) - TOKEN_EXPIRY_MARGIN_SECS;
                tracing::debug!(lifetime_secs = lifetime, "Fetched Reddit access token");
                Ok(AccessToken {
                    value,
                    expires_at: Utc::now() + Duration::seconds(lifetime.max(0)),
                })
            }
            (None, Some(error)) => Err(PlatformError::Auth(error)),
            (None, None) => Err(PlatformError::Auth("no access token in response".to_string())),
        }
    }

    /// Attach the bearer token, send, and turn non-2xx responses into errors.
    async fn authorized(&self, request: RequestBuilder) -> Result<Response, PlatformError> {
        let token = self.bearer().await?;
        let resp = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(api_error)?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(PlatformError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Form endpoints called with `api_type=json` answer 200 even when they
    /// fail and put the problems in `json.errors`.
    async fn expect_no_errors(resp: Response) -> Result<(), PlatformError> {
        let body: ApiJsonEnvelope = resp.json().await.map_err(api_error)?;
        let errors = body.json.map(|j| j.errors).unwrap_or_default();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PlatformError::Api(describe_errors(&errors)))
        }
    }

    async fn listing(&self, subreddit: &str, kind: &str) -> Result<Vec<ListedThing>, PlatformError> {
        let resp = self
            .authorized(
                self.client
                    .get(format!("{}/r/{}/{}", self.api_url, subreddit, kind))
                    .query(&[("limit", LISTING_LIMIT), ("raw_json", "1")]),
            )
            .await?;

        let listing: ApiListing = resp.json().await.map_err(api_error)?;
        Ok(listed_things(listing))
    }
}

#[async_trait]
impl RedditPlatform for RedditApiClient {
    async fn get_widgets(
        &self,
        subreddit: &str,
        _ctx: &RequestContext,
    ) -> Result<Vec<Widget>, PlatformError> {
        let resp = self
            .authorized(
                self.client
                    .get(format!("{}/r/{}/api/widgets", self.api_url, subreddit)),
            )
            .await?;

        let widgets: ApiWidgets = resp.json().await.map_err(api_error)?;
        Ok(map_widgets(widgets))
    }

    async fn delete_widget(
        &self,
        subreddit: &str,
        widget_id: &str,
        _ctx: &RequestContext,
    ) -> Result<(), PlatformError> {
        self.authorized(self.client.delete(format!(
            "{}/r/{}/api/widget/{}",
            self.api_url, subreddit, widget_id
        )))
        .await?;
        Ok(())
    }

    async fn add_widget(
        &self,
        widget: &NewWidget,
        _ctx: &RequestContext,
    ) -> Result<Widget, PlatformError> {
        let body = ApiNewWidget {
            kind: &widget.kind,
            short_name: &widget.short_name,
            text: &widget.text,
            styles: ApiWidgetStyles {
                background_color: &widget.styles.background_color,
                header_color: &widget.styles.header_color,
            },
        };

        let resp = self
            .authorized(
                self.client
                    .post(format!("{}/r/{}/api/widget", self.api_url, widget.subreddit))
                    .json(&body),
            )
            .await?;

        let created: ApiWidget = resp.json().await.map_err(api_error)?;
        Ok(Widget {
            id: created
                .id
                .ok_or_else(|| PlatformError::Api("created widget has no id".to_string()))?,
            kind: created.kind.unwrap_or_else(|| widget.kind.clone()),
            short_name: created
                .short_name
                .unwrap_or_else(|| widget.short_name.clone()),
        })
    }

    async fn ban_user(&self, ban: &BanRequest, _ctx: &RequestContext) -> Result<(), PlatformError> {
        let resp = self
            .authorized(
                self.client
                    .post(format!("{}/r/{}/api/friend", self.api_url, ban.subreddit))
                    .form(&[
                        ("api_type", "json"),
                        ("type", "banned"),
                        ("name", ban.username.as_str()),
                        ("ban_message", ban.message.as_str()),
                    ]),
            )
            .await?;

        Self::expect_no_errors(resp).await
    }

    async fn submit_comment(
        &self,
        comment: &CommentRequest,
        _ctx: &RequestContext,
    ) -> Result<(), PlatformError> {
        let resp = self
            .authorized(
                self.client
                    .post(format!("{}/api/comment", self.api_url))
                    .form(&[
                        ("api_type", "json"),
                        ("thing_id", comment.parent_id.as_str()),
                        ("text", comment.text.as_str()),
                    ]),
            )
            .await?;

        Self::expect_no_errors(resp).await
    }
}

#[async_trait]
impl SubmissionFeed for RedditApiClient {
    async fn latest_posts(
        &self,
        subreddit: &str,
        _ctx: &RequestContext,
    ) -> Result<Vec<FeedItem<PostSubmit>>, PlatformError> {
        Ok(self
            .listing(subreddit, "new")
            .await?
            .into_iter()
            .map(ListedThing::into_post)
            .collect())
    }

    async fn latest_comments(
        &self,
        subreddit: &str,
        _ctx: &RequestContext,
    ) -> Result<Vec<FeedItem<CommentSubmit>>, PlatformError> {
        Ok(self
            .listing(subreddit, "comments")
            .await?
            .into_iter()
            .map(ListedThing::into_comment)
            .collect())
    }
}

// ============================================================================
// RESPONSE MAPPING
// ============================================================================

/// A listing child reduced to the fields the entry points need.
#[derive(Debug, Clone, PartialEq)]
struct ListedThing {
    name: String,
    author: Option<Author>,
    subreddit: Option<String>,
    created_at: DateTime<Utc>,
}

impl ListedThing {
    fn into_post(self) -> FeedItem<PostSubmit> {
        FeedItem {
            id: self.name.clone(),
            created_at: self.created_at,
            event: PostSubmit {
                author: self.author,
                subreddit: self.subreddit.map(|name| Community { name }),
                post: Some(ContentRef { id: self.name }),
            },
        }
    }

    fn into_comment(self) -> FeedItem<CommentSubmit> {
        FeedItem {
            id: self.name.clone(),
            created_at: self.created_at,
            event: CommentSubmit {
                author: self.author,
                subreddit: self.subreddit.map(|name| Community { name }),
                comment: Some(ContentRef { id: self.name }),
            },
        }
    }
}

fn listed_things(listing: ApiListing) -> Vec<ListedThing> {
    listing
        .data
        .children
        .into_iter()
        .filter_map(|child| {
            let data = child.data;
            let name = data.name?;
            // Deleted accounts come back as "[deleted]" without a fullname.
            let author = match (data.author_fullname, data.author) {
                (Some(id), Some(name)) => Some(Author { id, name }),
                _ => None,
            };
            let created_at = data
                .created_utc
                .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single())
                .unwrap_or_else(Utc::now);

            Some(ListedThing {
                name,
                author,
                subreddit: data.subreddit,
                created_at,
            })
        })
        .collect()
}

fn map_widgets(widgets: ApiWidgets) -> Vec<Widget> {
    widgets
        .items
        .into_iter()
        .map(|(key, w)| Widget {
            id: w.id.unwrap_or(key),
            kind: w.kind.unwrap_or_default(),
            short_name: w.short_name.unwrap_or_default(),
        })
        .collect()
}

fn describe_errors(errors: &[Vec<serde_json::Value>]) -> String {
    errors
        .iter()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(": ")
        })
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// API TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiToken {
    access_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMe {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiJsonEnvelope {
    json: Option<ApiJsonBody>,
}

#[derive(Debug, Deserialize)]
struct ApiJsonBody {
    #[serde(default)]
    errors: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiWidgets {
    #[serde(default)]
    items: HashMap<String, ApiWidget>,
}

#[derive(Debug, Deserialize)]
struct ApiWidget {
    id: Option<String>,
    kind: Option<String>,
    #[serde(rename = "shortName")]
    short_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiNewWidget<'a> {
    kind: &'a str,
    #[serde(rename = "shortName")]
    short_name: &'a str,
    text: &'a str,
    styles: ApiWidgetStyles<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiWidgetStyles<'a> {
    background_color: &'a str,
    header_color: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiListing {
    data: ApiListingData,
}

#[derive(Debug, Deserialize)]
struct ApiListingData {
    #[serde(default)]
    children: Vec<ApiListingChild>,
}

#[derive(Debug, Deserialize)]
struct ApiListingChild {
    data: ApiThing,
}

#[derive(Debug, Deserialize)]
struct ApiThing {
    name: Option<String>,
    author: Option<String>,
    author_fullname: Option<String>,
    subreddit: Option<String>,
    created_utc: Option<f64>,
}
