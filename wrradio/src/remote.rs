//! Client of the control surface, used by the console commands
//!
//! ```no_run
//! use wrradio::remote::{RemoteClient, WaitOutcome};
//! use wrradio::DataStage;
//! use std::time::Duration;
//!
//! # async fn run() -> wrradio::Result<()> {
//! let client = RemoteClient::new("http://127.0.0.1:8765")?;
//! match client.wait(DataStage::ChannelsLoaded, Duration::from_secs(30)).await? {
//!     WaitOutcome::Reached(_) => println!("{} channels", client.find(&[] as &[&str]).await?.len()),
//!     WaitOutcome::StillLoading(stage) => println!("still loading (stage {stage})"),
//! }
//! # Ok(())
//! # }
//! ```

use crate::api_rest::{EqualizerResponse, FindRequest, PlayRequest, ProfileBody, StageResponse, WishRequest, WishResponse};
use crate::error::{Error, Result};
use crate::events::DataStage;
use crate::favorites::FavoriteEntry;
use crate::models::{ChannelMatch, StationInfo};
use crate::service::PlaybackState;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Mount point of the control surface
pub const API_PREFIX: &str = "/api/webradio";

/// Period of the data stage polling in [`RemoteClient::wait`]
pub const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Result of [`RemoteClient::wait`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The requested stage (or a later one) was reached
    Reached(DataStage),
    /// Timed out; the service is still at this stage
    StillLoading(DataStage),
}

#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: Client,
    base_url: String,
}

impl RemoteClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:8765`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    async fn check(url: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string));
        match (status.as_u16(), message) {
            (400, Some(message)) => Err(Error::configuration(message)),
            (code, _) => Err(Error::fetch(url, code)),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        let response = self.client.get(&url).send().await?;
        Ok(Self::check(&url, response).await?.json().await?)
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Response> {
        let url = self.url(path);
        debug!(url = %url, "POST");
        let response = self.client.post(&url).json(body).send().await?;
        Self::check(&url, response).await
    }

    async fn post_empty(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        let response = self.client.post(&url).send().await?;
        Self::check(&url, response).await?;
        Ok(())
    }

    pub async fn stations(&self) -> Result<Vec<StationInfo>> {
        self.get("/stations").await
    }

    /// Station `id`, or `None` when the service does not know it
    pub async fn station(&self, id: &str) -> Result<Option<StationInfo>> {
        let url = self.url(&format!("/stations/{id}"));
        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::check(&url, response).await?.json().await?))
    }

    pub async fn find<S: AsRef<str>>(&self, query: &[S]) -> Result<Vec<ChannelMatch>> {
        let request = FindRequest {
            query: query.iter().map(|q| q.as_ref().to_string()).collect(),
        };
        Ok(self.post("/find", &request).await?.json().await?)
    }

    pub async fn tags(&self) -> Result<Vec<String>> {
        self.get("/tags").await
    }

    pub async fn data_stage(&self) -> Result<DataStage> {
        let response: StageResponse = self.get("/stage").await?;
        DataStage::try_from(response.stage)
            .map_err(|v| Error::parse(self.url("/stage"), format!("invalid data stage {v}")))
    }

    pub async fn state(&self) -> Result<PlaybackState> {
        self.get("/state").await
    }

    pub async fn stream_tags(&self) -> Result<BTreeMap<String, String>> {
        self.get("/stream_tags").await
    }

    pub async fn play(&self, uri: &str) -> Result<()> {
        self.post(
            "/play",
            &PlayRequest {
                uri: uri.to_string(),
            },
        )
        .await?;
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        self.post_empty("/pause").await
    }

    pub async fn resume(&self) -> Result<()> {
        self.post_empty("/resume").await
    }

    pub async fn quit(&self) -> Result<()> {
        self.post_empty("/quit").await
    }

    pub async fn equalizer(&self) -> Result<EqualizerResponse> {
        self.get("/equalizer").await
    }

    pub async fn set_equalizer_profile(&self, profile: &str) -> Result<()> {
        self.post(
            "/equalizer/profile",
            &ProfileBody {
                profile: profile.to_string(),
            },
        )
        .await?;
        Ok(())
    }

    pub async fn favorites(&self) -> Result<Vec<FavoriteEntry>> {
        self.get("/favorites").await
    }

    pub async fn wishlist(&self) -> Result<Vec<String>> {
        self.get("/wishlist").await
    }

    /// Returns true when `title` is now in the wishlist
    pub async fn toggle_wishlist(&self, title: &str) -> Result<bool> {
        let response: WishResponse = self
            .post(
                "/wishlist/toggle",
                &WishRequest {
                    title: title.to_string(),
                },
            )
            .await?
            .json()
            .await?;
        Ok(response.wished)
    }

    /// Polls the data stage until it reaches `stage` or `timeout` expires
    pub async fn wait(&self, stage: DataStage, timeout: Duration) -> Result<WaitOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            let current = self.data_stage().await?;
            if current >= stage {
                return Ok(WaitOutcome::Reached(current));
            }
            if Instant::now() >= deadline {
                return Ok(WaitOutcome::StillLoading(current));
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// Channel holding the URI being played, if known
    pub async fn current_channel(&self) -> Result<Option<ChannelMatch>> {
        let state = self.state().await?;
        if state.current_uri.is_empty() {
            return Ok(None);
        }
        self.channel_containing(&state.current_uri).await
    }

    /// Channel whose playlist or one of whose streams is `uri`
    pub async fn channel_containing(&self, uri: &str) -> Result<Option<ChannelMatch>> {
        let all = self.find(&[] as &[&str]).await?;
        Ok(all.into_iter().find(|m| m.channel.contains_uri(uri)))
    }
}
