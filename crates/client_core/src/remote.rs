use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use shared::{
    domain::{Category, Joke, JokeId},
    error::{JokeError, JokeResult},
};
use tracing::debug;

pub const DEFAULT_API_BASE_URL: &str = "https://api.chucknorris.io/jokes";
const API_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Remote provider of jokes and categories.
#[async_trait]
pub trait JokeSource: Send + Sync {
    async fn fetch_random_joke(&self, category: &str) -> JokeResult<Joke>;
    async fn fetch_categories(&self) -> JokeResult<Vec<Category>>;
}

#[derive(Debug, Deserialize)]
struct JokePayload {
    id: String,
    value: String,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    icon_url: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

impl JokePayload {
    fn into_joke(self, requested_category: &str) -> Joke {
        let category = self
            .categories
            .into_iter()
            .next()
            .unwrap_or_else(|| requested_category.to_string());
        Joke {
            id: JokeId(self.id),
            text: self.value,
            category,
            url: self.url,
            icon_url: self.icon_url,
            created_at: self.created_at.as_deref().and_then(parse_api_timestamp),
            updated_at: self.updated_at.as_deref().and_then(parse_api_timestamp),
        }
    }
}

fn parse_api_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, API_TIMESTAMP_FORMAT).ok()
}

/// HTTP client for the chucknorris.io style joke API.
#[derive(Clone)]
pub struct JokesApi {
    http: Client,
    base_url: String,
}

impl JokesApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> JokeResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| JokeError::network(format!("failed to build http client: {err}")))?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> JokeResult<T> {
        let url = format!("{}{path}", self.base_url);
        let body = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|err| JokeError::network(format!("GET {url}: {err}")))?
            .text()
            .await
            .map_err(|err| JokeError::network(format!("GET {url}: {err}")))?;

        serde_json::from_str(&body).map_err(|err| JokeError::decode(format!("GET {url}: {err}")))
    }
}

#[async_trait]
impl JokeSource for JokesApi {
    async fn fetch_random_joke(&self, category: &str) -> JokeResult<Joke> {
        let payload: JokePayload = self
            .get_json("/random", &[("category", category)])
            .await?;
        let joke = payload.into_joke(category);
        debug!(joke_id = %joke.id, category = %joke.category, "remote: fetched joke");
        Ok(joke)
    }

    async fn fetch_categories(&self) -> JokeResult<Vec<Category>> {
        let categories: Vec<Category> = self.get_json("/categories", &[]).await?;
        debug!(count = categories.len(), "remote: fetched categories");
        Ok(categories)
    }
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
