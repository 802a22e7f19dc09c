//! Client for the subset of OGC API Features used for mirroring:
//! the landing page, the collections list and single-page items requests.

use async_trait::async_trait;

mod client;
pub use client::{ClientOptions, DEFAULT_TIMEOUT, OgcClient};

mod error;
pub use error::{RemoteError, RemoteResult};

mod model;
pub use model::{
    CollectionsDocument, ITEMS_MEDIA_TYPES, ItemsPage, Link, RemoteCollection, RootDocument,
    items_link, items_request_url, preferred_link, resolve_href,
};

/// A remote source of feature collections.
///
/// Implemented by [`OgcClient`] over HTTP; tests substitute canned responses.
#[async_trait]
pub trait FeatureSource: Send + Sync {
    /// Fetch the landing page at `url`.
    async fn root(&self, url: &str) -> RemoteResult<RootDocument>;

    /// Follow the `rel=data` link of a landing page fetched from `root_url`.
    ///
    /// Link targets in the returned collections are absolute.
    async fn collections(
        &self,
        root_url: &str,
        root: &RootDocument,
    ) -> RemoteResult<Vec<RemoteCollection>>;

    /// Fetch one page of items, sized to `limit` when known.
    async fn items(&self, items_url: &str, limit: Option<u64>) -> RemoteResult<ItemsPage>;
}
