use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::remote::{RemoteError, RemoteResult};

/// Media types accepted for the items endpoint of a collection.
pub const ITEMS_MEDIA_TYPES: [&str; 2] = ["application/json", "application/geo+json"];

/// A hypermedia link of an OGC API document.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Target URL. Relative targets are resolved by the client.
    pub href: String,
    /// Relation type.
    #[serde(default)]
    pub rel: String,
    /// Media type of the target.
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    /// Human readable label.
    pub title: Option<String>,
}

impl Link {
    /// Media type without parameters, lowercased.
    #[must_use]
    pub fn essence(&self) -> Option<String> {
        self.media_type.as_deref().map(|t| {
            t.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    fn is_json(&self) -> bool {
        self.essence()
            .is_some_and(|e| ITEMS_MEDIA_TYPES.contains(&e.as_str()))
    }
}

/// Landing page of an OGC API.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RootDocument {
    /// API title.
    pub title: Option<String>,
    /// API description.
    pub description: Option<String>,
    /// Links, including `rel=data` pointing at the collections.
    #[serde(default)]
    pub links: Vec<Link>,
}

/// Response of the collections endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionsDocument {
    /// Available collections.
    pub collections: Vec<RemoteCollection>,
    /// Links of the document itself.
    #[serde(default)]
    pub links: Vec<Link>,
}

/// A collection as described by the remote.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteCollection {
    /// Remote identifier, matched against the configured collections.
    pub id: String,
    /// Display title.
    pub title: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Number of items the remote reports.
    #[serde(rename = "itemCount")]
    pub item_count: Option<u64>,
    /// Links, including `rel=items` and `rel=self`.
    #[serde(default)]
    pub links: Vec<Link>,
}

impl RemoteCollection {
    /// Items endpoint serving JSON or `GeoJSON`.
    #[must_use]
    pub fn items_url(&self) -> Option<&str> {
        items_link(&self.links)
    }

    /// Collection endpoint, the first `rel=self` link whatever its media type.
    #[must_use]
    pub fn self_url(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel == "self")
            .map(|l| l.href.as_str())
    }
}

/// One page of a collection's items.
///
/// Features are kept as raw JSON so a single malformed feature can be rejected
/// without losing the rest of the page. A body without a `features` array is not a page.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemsPage {
    /// Raw `GeoJSON` features.
    pub features: Vec<Value>,
    /// Number of features in this page, as reported.
    #[serde(rename = "numberReturned")]
    pub number_returned: Option<u64>,
    /// Number of features matching the request, as reported.
    #[serde(rename = "numberMatched")]
    pub number_matched: Option<u64>,
    /// Non-standard total reported by some servers.
    #[serde(rename = "totalFeatures")]
    pub total_features: Option<u64>,
}

/// The `rel=items` link whose media type is JSON or `GeoJSON`.
#[must_use]
pub fn items_link(links: &[Link]) -> Option<&str> {
    links
        .iter()
        .find(|l| l.rel == "items" && l.is_json())
        .map(|l| l.href.as_str())
}

/// A link with the given relation, preferring JSON targets, then untyped ones, then any.
#[must_use]
pub fn preferred_link<'a>(links: &'a [Link], rel: &str) -> Option<&'a str> {
    let candidates: Vec<&Link> = links.iter().filter(|l| l.rel == rel).collect();
    let best = candidates
        .iter()
        .copied()
        .find(|l| l.is_json())
        .or_else(|| candidates.iter().copied().find(|l| l.media_type.is_none()))
        .or_else(|| candidates.first().copied())?;
    Some(best.href.as_str())
}

/// Resolve a possibly relative link target against the document it came from.
pub fn resolve_href(base: &Url, href: &str) -> RemoteResult<Url> {
    base.join(href)
        .map_err(|e| RemoteError::InvalidUrl(e, href.to_string()))
}

/// URL of a single-page items request, with `limit` set to the known entry count.
///
/// Any `limit` already present is replaced. Without a count, the server default applies.
pub fn items_request_url(items_url: &str, limit: Option<u64>) -> RemoteResult<Url> {
    let mut url =
        Url::parse(items_url).map_err(|e| RemoteError::InvalidUrl(e, items_url.to_string()))?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "limit")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.set_query(None);
    if !kept.is_empty() || limit.is_some() {
        let mut query = url.query_pairs_mut();
        query.extend_pairs(kept);
        if let Some(limit) = limit {
            query.append_pair("limit", &limit.to_string());
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;

    fn link(rel: &str, media_type: Option<&str>, href: &str) -> Link {
        Link {
            href: href.to_string(),
            rel: rel.to_string(),
            media_type: media_type.map(ToString::to_string),
            title: None,
        }
    }

    #[test]
    fn items_link_skips_html() {
        let links = [
            link("items", Some("text/html"), "U2"),
            link("items", Some("application/json"), "U1"),
        ];
        assert_eq!(items_link(&links), Some("U1"));
    }

    #[rstest]
    #[case::geojson(Some("application/geo+json"), Some("U"))]
    #[case::with_params(Some("application/geo+json; charset=utf-8"), Some("U"))]
    #[case::upper(Some("Application/JSON"), Some("U"))]
    #[case::html(Some("text/html"), None)]
    #[case::untyped(None, None)]
    fn items_link_media_types(#[case] media_type: Option<&str>, #[case] expected: Option<&str>) {
        assert_eq!(items_link(&[link("items", media_type, "U")]), expected);
    }

    #[test]
    fn items_link_missing() {
        let links = [link("self", Some("application/json"), "S")];
        assert_eq!(items_link(&links), None);
    }

    #[test]
    fn preferred_link_order() {
        let html = link("self", Some("text/html"), "html");
        let bare = link("self", None, "bare");
        let json = link("self", Some("application/json"), "json");
        assert_eq!(preferred_link(&[html.clone()], "self"), Some("html"));
        assert_eq!(preferred_link(&[html.clone(), bare.clone()], "self"), Some("bare"));
        assert_eq!(preferred_link(&[html, bare, json], "self"), Some("json"));
        assert_eq!(preferred_link(&[], "self"), None);
    }

    #[rstest]
    #[case::appended("https://x.org/c/items?f=json", Some(3), "https://x.org/c/items?f=json&limit=3")]
    #[case::replaced("https://x.org/c/items?limit=10&f=json", Some(25), "https://x.org/c/items?f=json&limit=25")]
    #[case::no_query("https://x.org/c/items", Some(5), "https://x.org/c/items?limit=5")]
    #[case::unknown_count("https://x.org/c/items?f=json", None, "https://x.org/c/items?f=json")]
    #[case::nothing("https://x.org/c/items", None, "https://x.org/c/items")]
    fn items_request_limit(#[case] url: &str, #[case] limit: Option<u64>, #[case] expected: &str) {
        assert_eq!(items_request_url(url, limit).unwrap().as_str(), expected);
    }

    #[test]
    fn relative_href() {
        let base = Url::parse("https://x.org/ogc/").unwrap();
        assert_eq!(
            resolve_href(&base, "collections?f=json").unwrap().as_str(),
            "https://x.org/ogc/collections?f=json"
        );
        assert_eq!(
            resolve_href(&base, "https://y.org/c").unwrap().as_str(),
            "https://y.org/c"
        );
    }

    #[test]
    fn parse_collections_document() {
        let doc: CollectionsDocument = serde_json::from_str(indoc! {r#"
            {
              "collections": [
                {
                  "id": "flood_zones",
                  "title": "Flood zones",
                  "itemCount": 12,
                  "links": [
                    {"rel": "self", "type": "application/json", "href": "https://x.org/collections/flood_zones"},
                    {"rel": "items", "type": "text/html", "href": "https://x.org/collections/flood_zones/items?f=html"},
                    {"rel": "items", "type": "application/geo+json", "href": "https://x.org/collections/flood_zones/items?f=json"}
                  ]
                },
                {"id": "bare"}
              ]
            }
        "#})
        .unwrap();
        let flood = &doc.collections[0];
        assert_eq!(flood.item_count, Some(12));
        assert_eq!(
            flood.items_url(),
            Some("https://x.org/collections/flood_zones/items?f=json")
        );
        assert_eq!(flood.self_url(), Some("https://x.org/collections/flood_zones"));

        let bare = &doc.collections[1];
        assert_eq!(bare.items_url(), None);
        assert_eq!(bare.self_url(), None);
        assert_eq!(bare.item_count, None);
    }

    #[test]
    fn self_url_is_first_self_link() {
        let collection = RemoteCollection {
            id: "gauges".to_string(),
            links: vec![
                link("items", Some("application/json"), "items"),
                link("self", Some("text/html"), "html"),
                link("self", Some("application/json"), "json"),
            ],
            ..RemoteCollection::default()
        };
        assert_eq!(collection.self_url(), Some("html"));
    }

    #[test]
    fn items_page_needs_features() {
        let page: ItemsPage = serde_json::from_str(
            r#"{"type": "FeatureCollection", "features": [], "numberMatched": 0}"#,
        )
        .unwrap();
        assert!(page.features.is_empty());
        assert_eq!(page.number_matched, Some(0));

        let exception = serde_json::from_str::<ItemsPage>(
            r#"{"code": "NotFound", "description": "no such collection"}"#,
        );
        assert!(exception.is_err());
    }
}
