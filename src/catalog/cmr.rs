//! NASA Common Metadata Repository search client.
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::{as_base, http_client, CatalogClient};
use crate::error::{RecipeError, Result};
use crate::query::QueryParameters;

pub const CMR_ENDPOINT: &str = "https://cmr.earthdata.nasa.gov";

const SEARCH_AFTER_HEADER: &str = "CMR-Search-After";
const DEFAULT_PAGE_SIZE: usize = 2000;
const DATA_REL_SUFFIX: &str = "/data#";

#[derive(Deserialize, Debug)]
struct Feed<T> {
    feed: FeedBody<T>,
}

#[derive(Deserialize, Debug)]
struct FeedBody<T> {
    #[serde(default = "Vec::new")]
    entry: Vec<T>,
}

#[derive(Deserialize, Debug)]
struct CollectionEntry {
    id: String,
}

#[derive(Deserialize, Debug)]
struct GranuleEntry {
    #[serde(default)]
    title: String,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Deserialize, Debug)]
struct Link {
    rel: String,
    href: String,
    #[serde(default)]
    inherited: bool,
}

impl GranuleEntry {
    /// The first direct-download http(s) link of the granule itself.
    fn data_url(&self) -> Option<Url> {
        self.links
            .iter()
            .filter(|l| !l.inherited && l.rel.ends_with(DATA_REL_SUFFIX))
            .filter_map(|l| Url::parse(&l.href).ok())
            .find(|u| u.scheme() == "https" || u.scheme() == "http")
    }
}

pub struct CmrCatalog {
    client: reqwest::Client,
    endpoint: Url,
    page_size: usize,
}

impl CmrCatalog {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: as_base(endpoint),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    async fn collection_id(self: &Self, params: &QueryParameters) -> Result<String> {
        let url = self.endpoint.join("search/collections.json")?;
        let feed: Feed<CollectionEntry> = self
            .client
            .get(url)
            .query(&[
                ("short_name", params.short_name()),
                ("version", params.version()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let collection = feed
            .feed
            .entry
            .into_iter()
            .next()
            .ok_or_else(|| RecipeError::CatalogLookup {
                short_name: params.short_name().to_string(),
                version: params.version().to_string(),
            })?;
        Ok(collection.id)
    }

    async fn granules(self: &Self, params: &QueryParameters) -> Result<Vec<GranuleEntry>> {
        let url = self.endpoint.join("search/granules.json")?;
        let page_size = self.page_size.to_string();
        let mut granules = vec![];
        let mut search_after: Option<String> = None;

        loop {
            let mut request = self.client.get(url.clone()).query(&[
                ("short_name", params.short_name()),
                ("version", params.version()),
                ("page_size", page_size.as_str()),
                ("sort_key", "start_date"),
            ]);
            if let Some(token) = search_after.as_deref() {
                request = request.header(SEARCH_AFTER_HEADER, token);
            }

            let response = request.send().await?.error_for_status()?;
            let next = response
                .headers()
                .get(SEARCH_AFTER_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let page: Feed<GranuleEntry> = response.json().await?;

            let count = page.feed.entry.len();
            tracing::debug!(count, total = granules.len() + count, "Fetched granule page");
            granules.extend(page.feed.entry);

            if count < self.page_size || next.is_none() {
                break;
            }
            search_after = next;
        }

        Ok(granules)
    }
}

impl CatalogClient for CmrCatalog {
    async fn search(self: &Self, params: &QueryParameters) -> Result<Vec<Url>> {
        let collection = self.collection_id(params).await?;
        tracing::debug!(%collection, "Resolved CMR collection");

        let granules = self.granules(params).await?;
        let mut urls = Vec::with_capacity(granules.len());
        for granule in granules.iter() {
            match granule.data_url() {
                Some(url) => urls.push(url),
                None => tracing::warn!(granule = %granule.title, "Granule has no data link"),
            }
        }
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DATA_REL: &str = "http://esipfed.org/ns/fedsearch/1.1/data#";

    fn granule(day: u32) -> serde_json::Value {
        serde_json::json!({
            "title": format!("3B-DAY-L.MS.MRG.3IMERG.202001{day:02}-S000000-E235959.V06.nc4"),
            "links": [
                {
                    "rel": DATA_REL,
                    "href": "https://disc.gsfc.nasa.gov/datasets/GPM_3IMERGDL_06/summary",
                    "inherited": true
                },
                {
                    "rel": DATA_REL,
                    "href": format!("s3://gesdisc-cumulus-protected/GPM_L3/3B-DAY-L.202001{day:02}.nc4")
                },
                {
                    "rel": DATA_REL,
                    "href": format!("https://data.gesdisc.earthdata.nasa.gov/data/GPM_L3/GPM_3IMERGDL.06/2020/01/3B-DAY-L.MS.MRG.3IMERG.202001{day:02}-S000000-E235959.V06.nc4")
                },
                {
                    "rel": "http://esipfed.org/ns/fedsearch/1.1/metadata#",
                    "href": "https://cmr.earthdata.nasa.gov/search/concepts/G1.xml"
                }
            ]
        })
    }

    fn feed(entries: Vec<serde_json::Value>) -> serde_json::Value {
        serde_json::json!({"feed": {"entry": entries}})
    }

    async fn mount_collection(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/search/collections.json"))
            .and(query_param("short_name", "GPM_3IMERGDL"))
            .and(query_param("version", "06"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(feed(vec![serde_json::json!({"id": "C1598621096-GES_DISC"})])),
            )
            .mount(server)
            .await;
    }

    fn catalog(server: &MockServer) -> CmrCatalog {
        let endpoint = Url::parse(&server.uri()).unwrap();
        CmrCatalog::new(endpoint, Duration::from_secs(5)).unwrap()
    }

    fn params() -> QueryParameters {
        QueryParameters::new("GPM_3IMERGDL", "06", 1, "time").unwrap()
    }

    #[tokio::test]
    async fn test_search_single_page() {
        let server = MockServer::start().await;
        mount_collection(&server).await;
        Mock::given(method("GET"))
            .and(path("/search/granules.json"))
            .and(query_param("sort_key", "start_date"))
            .respond_with(ResponseTemplate::new(200).set_body_json(feed(vec![granule(1), granule(2)])))
            .mount(&server)
            .await;

        let urls = catalog(&server).search(&params()).await.unwrap();
        assert_eq!(urls.len(), 2);
        assert!(urls[0].as_str().ends_with("20200101-S000000-E235959.V06.nc4"));
        assert!(urls[0].as_str().starts_with("https://data.gesdisc.earthdata.nasa.gov/"));
        assert!(urls[1].as_str().ends_with("20200102-S000000-E235959.V06.nc4"));
    }

    #[tokio::test]
    async fn test_search_follows_search_after() {
        let server = MockServer::start().await;
        mount_collection(&server).await;

        // Second page: requested with the token handed out by the first
        Mock::given(method("GET"))
            .and(path("/search/granules.json"))
            .and(header(SEARCH_AFTER_HEADER, "[\"token-1\"]"))
            .respond_with(ResponseTemplate::new(200).set_body_json(feed(vec![granule(3)])))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search/granules.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(SEARCH_AFTER_HEADER, "[\"token-1\"]")
                    .set_body_json(feed(vec![granule(1), granule(2)])),
            )
            .with_priority(2)
            .mount(&server)
            .await;

        let urls = catalog(&server)
            .with_page_size(2)
            .search(&params())
            .await
            .unwrap();
        assert_eq!(urls.len(), 3);
        assert!(urls[2].as_str().ends_with("20200103-S000000-E235959.V06.nc4"));
    }

    #[tokio::test]
    async fn test_unknown_collection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/collections.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(feed(vec![])))
            .mount(&server)
            .await;

        let err = catalog(&server).search(&params()).await.unwrap_err();
        assert!(matches!(err, RecipeError::CatalogLookup { .. }));
    }

    #[tokio::test]
    async fn test_collection_without_granules() {
        let server = MockServer::start().await;
        mount_collection(&server).await;
        Mock::given(method("GET"))
            .and(path("/search/granules.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(feed(vec![])))
            .mount(&server)
            .await;

        let urls = catalog(&server).search(&params()).await.unwrap();
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_catalog_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = catalog(&server).search(&params()).await.unwrap_err();
        assert!(matches!(err, RecipeError::Catalog(_)));
    }

    #[test]
    fn test_data_url_skips_inherited_and_s3_links() {
        let entry: GranuleEntry = serde_json::from_value(granule(7)).unwrap();
        let url = entry.data_url().unwrap();
        assert_eq!(url.host_str(), Some("data.gesdisc.earthdata.nasa.gov"));
    }
}
