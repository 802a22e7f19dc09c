use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::remote::{
    CollectionsDocument, FeatureSource, ItemsPage, RemoteCollection, RemoteError, RemoteResult,
    RootDocument, items_request_url, preferred_link, resolve_href,
};

/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const ACCEPT_JSON: &str = "application/geo+json, application/json;q=0.9";

/// Settings of the HTTP client.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Bound on every request, from connect to the last body byte.
    /// Expiry counts as a failure of the dataset or collection being fetched.
    pub timeout: Option<Duration>,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// OGC API Features client over HTTP.
#[derive(Clone, Debug)]
pub struct OgcClient {
    http: reqwest::Client,
}

impl OgcClient {
    /// Build a client with the given options.
    pub fn new(options: &ClientOptions) -> RemoteResult<Self> {
        let mut builder = reqwest::Client::builder().user_agent(options.user_agent.clone());
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(RemoteError::ClientBuildError)?;
        Ok(Self { http })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> RemoteResult<T> {
        debug!("GET {url}");
        let response = self
            .http
            .get(url.clone())
            .header(ACCEPT, HeaderValue::from_static(ACCEPT_JSON))
            .send()
            .await
            .map_err(|e| RemoteError::RequestError(e, url.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::StatusError(status, url.to_string()));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| RemoteError::RequestError(e, url.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| RemoteError::DecodeError(e, url.to_string()))
    }
}

fn parse_url(url: &str) -> RemoteResult<Url> {
    Url::parse(url).map_err(|e| RemoteError::InvalidUrl(e, url.to_string()))
}

/// Make every link target of a collection absolute.
fn absolutize(base: &Url, collection: &mut RemoteCollection) -> RemoteResult<()> {
    for link in &mut collection.links {
        link.href = resolve_href(base, &link.href)?.to_string();
    }
    Ok(())
}

#[async_trait]
impl FeatureSource for OgcClient {
    async fn root(&self, url: &str) -> RemoteResult<RootDocument> {
        self.get_json(&parse_url(url)?).await
    }

    async fn collections(
        &self,
        root_url: &str,
        root: &RootDocument,
    ) -> RemoteResult<Vec<RemoteCollection>> {
        let base = parse_url(root_url)?;
        let href = preferred_link(&root.links, "data")
            .ok_or_else(|| RemoteError::MissingLink("data", root_url.to_string()))?;
        let url = resolve_href(&base, href)?;
        let mut doc: CollectionsDocument = self.get_json(&url).await?;
        for collection in &mut doc.collections {
            absolutize(&url, collection)?;
        }
        Ok(doc.collections)
    }

    async fn items(&self, items_url: &str, limit: Option<u64>) -> RemoteResult<ItemsPage> {
        self.get_json(&items_request_url(items_url, limit)?).await
    }
}
