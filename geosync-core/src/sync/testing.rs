//! Canned remote responses for synchronizer and refresher tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};

use crate::remote::{
    FeatureSource, ItemsPage, Link, RemoteCollection, RemoteError, RemoteResult, RootDocument,
};

#[derive(Debug, Default)]
pub struct FakeSource {
    roots: HashMap<String, RootDocument>,
    collections: HashMap<String, Vec<RemoteCollection>>,
    items: Mutex<HashMap<String, Result<ItemsPage, StatusCode>>>,
    pub requests: Mutex<Vec<(String, Option<u64>)>>,
}

impl FakeSource {
    pub fn with_api(mut self, url: &str, title: &str, collections: Vec<RemoteCollection>) -> Self {
        self.roots.insert(
            url.to_string(),
            RootDocument {
                title: Some(title.to_string()),
                description: Some(format!("{title} description")),
                links: vec![link("data", Some("application/json"), &format!("{url}/collections"))],
            },
        );
        self.collections.insert(url.to_string(), collections);
        self
    }

    /// Landing page works, but listing collections fails.
    pub fn with_broken_collections(mut self, url: &str, title: &str) -> Self {
        self = self.with_api(url, title, vec![]);
        self.collections.remove(url);
        self
    }

    pub fn with_items(self, items_url: &str, features: Vec<Value>) -> Self {
        self.set_items(items_url, Ok(features));
        self
    }

    pub fn with_failing_items(self, items_url: &str, status: StatusCode) -> Self {
        self.set_items(items_url, Err(status));
        self
    }

    pub fn set_items(&self, items_url: &str, response: Result<Vec<Value>, StatusCode>) {
        let page = response.map(|features| ItemsPage {
            number_returned: Some(features.len() as u64),
            features,
            ..ItemsPage::default()
        });
        self.items
            .lock()
            .unwrap()
            .insert(items_url.to_string(), page);
    }
}

#[async_trait]
impl FeatureSource for FakeSource {
    async fn root(&self, url: &str) -> RemoteResult<RootDocument> {
        self.roots
            .get(url)
            .cloned()
            .ok_or_else(|| RemoteError::StatusError(StatusCode::SERVICE_UNAVAILABLE, url.into()))
    }

    async fn collections(
        &self,
        root_url: &str,
        _root: &RootDocument,
    ) -> RemoteResult<Vec<RemoteCollection>> {
        self.collections.get(root_url).cloned().ok_or_else(|| {
            RemoteError::StatusError(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{root_url}/collections"),
            )
        })
    }

    async fn items(&self, items_url: &str, limit: Option<u64>) -> RemoteResult<ItemsPage> {
        self.requests
            .lock()
            .unwrap()
            .push((items_url.to_string(), limit));
        match self.items.lock().unwrap().get(items_url) {
            Some(Ok(page)) => Ok(page.clone()),
            Some(Err(status)) => Err(RemoteError::StatusError(*status, items_url.into())),
            None => Err(RemoteError::StatusError(StatusCode::NOT_FOUND, items_url.into())),
        }
    }
}

pub fn link(rel: &str, media_type: Option<&str>, href: &str) -> Link {
    Link {
        href: href.to_string(),
        rel: rel.to_string(),
        media_type: media_type.map(ToString::to_string),
        title: None,
    }
}

/// A remote collection with a JSON items link at `{api}/collections/{id}/items?f=json`.
pub fn remote_collection(api: &str, id: &str, title: &str, count: u64) -> RemoteCollection {
    let base = format!("{api}/collections/{id}");
    RemoteCollection {
        id: id.to_string(),
        title: Some(title.to_string()),
        description: None,
        item_count: Some(count),
        links: vec![
            link("self", Some("application/json"), &base),
            link("items", Some("text/html"), &format!("{base}/items?f=html")),
            link("items", Some("application/geo+json"), &items_url(api, id)),
        ],
    }
}

pub fn items_url(api: &str, id: &str) -> String {
    format!("{api}/collections/{id}/items?f=json")
}

pub fn point(x: f64, y: f64, properties: Value) -> Value {
    json!({
        "type": "Feature",
        "geometry": {"type": "Point", "coordinates": [x, y]},
        "properties": properties,
    })
}

pub fn null_geometry(properties: Value) -> Value {
    json!({"type": "Feature", "geometry": null, "properties": properties})
}
