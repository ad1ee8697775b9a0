//! STAC API search client. Collections are addressed as
//! `{short_name}_{version}`, the convention used by CMR-STAC.
use reqwest::StatusCode;
use serde::Deserialize;
use stac::Item;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

use super::{as_base, http_client, CatalogClient};
use crate::error::{RecipeError, Result};
use crate::query::QueryParameters;

const DATA_ASSET: &str = "data";
const DEFAULT_LIMIT: usize = 250;

#[derive(Deserialize, Debug)]
struct SearchPage {
    #[serde(default)]
    features: Vec<Item>,
    #[serde(default)]
    links: Vec<serde_json::Value>,
}

impl SearchPage {
    fn next_url(&self) -> Option<Url> {
        let next = self
            .links
            .iter()
            .find(|l| l.get("rel").and_then(|r| r.as_str()) == Some("next"))?;
        // Only GET pagination can be followed by url alone
        if let Some(method) = next.get("method").and_then(|m| m.as_str()) {
            if !method.eq_ignore_ascii_case("GET") {
                return None;
            }
        }
        Url::parse(next.get("href")?.as_str()?).ok()
    }
}

fn data_url(item: &Item) -> Option<Url> {
    let asset = item.assets.get(DATA_ASSET)?;
    Url::parse(&asset.href).ok()
}

pub fn collection_id(params: &QueryParameters) -> String {
    format!("{}_{}", params.short_name(), params.version())
}

pub struct StacCatalog {
    client: reqwest::Client,
    endpoint: Url,
    limit: usize,
}

impl StacCatalog {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: as_base(endpoint),
            limit: DEFAULT_LIMIT,
        })
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    async fn ensure_collection(self: &Self, params: &QueryParameters) -> Result<()> {
        let url = self
            .endpoint
            .join(&format!("collections/{}", collection_id(params)))?;
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RecipeError::CatalogLookup {
                short_name: params.short_name().to_string(),
                version: params.version().to_string(),
            });
        }
        response.error_for_status()?;
        Ok(())
    }
}

impl CatalogClient for StacCatalog {
    async fn search(self: &Self, params: &QueryParameters) -> Result<Vec<Url>> {
        self.ensure_collection(params).await?;

        let mut url = self.endpoint.join("search")?;
        url.query_pairs_mut()
            .append_pair("collections", &collection_id(params))
            .append_pair("limit", &self.limit.to_string());

        let mut urls = vec![];
        let mut fetched = HashSet::new();
        let mut next = Some(url);
        while let Some(page_url) = next.take() {
            // A server that keeps linking back to a fetched page ends the search
            if !fetched.insert(page_url.clone()) {
                tracing::warn!(url = %page_url, "STAC next link repeats a fetched page");
                break;
            }
            let page: SearchPage = self
                .client
                .get(page_url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            tracing::debug!(count = page.features.len(), "Fetched STAC item page");

            for item in page.features.iter() {
                match data_url(item) {
                    Some(url) => urls.push(url),
                    None => tracing::warn!(item = %item.id, "Item has no data asset"),
                }
            }
            if !page.features.is_empty() {
                next = page.next_url();
            }
        }

        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn item(day: u32) -> serde_json::Value {
        serde_json::json!({
            "type": "Feature",
            "stac_version": "1.0.0",
            "id": format!("GPM_3IMERGDL.06:3B-DAY-L.MS.MRG.3IMERG.202001{day:02}"),
            "geometry": null,
            "properties": {"datetime": format!("2020-01-{day:02}T00:00:00Z")},
            "links": [],
            "assets": {
                "data": {
                    "href": format!("https://data.gesdisc.earthdata.nasa.gov/data/GPM_L3/GPM_3IMERGDL.06/2020/01/3B-DAY-L.MS.MRG.3IMERG.202001{day:02}-S000000-E235959.V06.nc4")
                }
            }
        })
    }

    fn catalog(server: &MockServer) -> StacCatalog {
        let endpoint = Url::parse(&format!("{}/stac/GES_DISC", server.uri())).unwrap();
        StacCatalog::new(endpoint, Duration::from_secs(5)).unwrap()
    }

    fn params() -> QueryParameters {
        QueryParameters::new("GPM_3IMERGDL", "06", 1, "time").unwrap()
    }

    async fn mount_collection(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/stac/GES_DISC/collections/GPM_3IMERGDL_06"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "GPM_3IMERGDL_06"})))
            .mount(server)
            .await;
    }

    #[test]
    fn test_collection_id() {
        assert_eq!(collection_id(&params()), "GPM_3IMERGDL_06");
    }

    #[tokio::test]
    async fn test_search_follows_next_link() {
        let server = MockServer::start().await;
        mount_collection(&server).await;

        let next = format!("{}/stac/GES_DISC/search?collections=GPM_3IMERGDL_06&limit=2&page=2", server.uri());
        Mock::given(method("GET"))
            .and(path("/stac/GES_DISC/search"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "FeatureCollection",
                "features": [item(3)],
                "links": []
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/stac/GES_DISC/search"))
            .and(query_param("collections", "GPM_3IMERGDL_06"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "FeatureCollection",
                "features": [item(1), item(2)],
                "links": [{"rel": "next", "href": next, "method": "GET"}]
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let urls = catalog(&server).with_limit(2).search(&params()).await.unwrap();
        assert_eq!(urls.len(), 3);
        assert!(urls[0].as_str().ends_with("20200101-S000000-E235959.V06.nc4"));
        assert!(urls[2].as_str().ends_with("20200103-S000000-E235959.V06.nc4"));
    }

    #[tokio::test]
    async fn test_search_stops_on_repeated_next_link() {
        let server = MockServer::start().await;
        mount_collection(&server).await;

        let same = format!("{}/stac/GES_DISC/search?collections=GPM_3IMERGDL_06&limit=2", server.uri());
        Mock::given(method("GET"))
            .and(path("/stac/GES_DISC/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "FeatureCollection",
                "features": [item(1), item(2)],
                "links": [{"rel": "next", "href": same}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let urls = catalog(&server).with_limit(2).search(&params()).await.unwrap();
        assert_eq!(urls.len(), 2);
        assert!(urls[1].as_str().ends_with("20200102-S000000-E235959.V06.nc4"));
    }

    #[tokio::test]
    async fn test_unknown_collection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stac/GES_DISC/collections/GPM_3IMERGDL_06"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = catalog(&server).search(&params()).await.unwrap_err();
        assert!(matches!(err, RecipeError::CatalogLookup { .. }));
    }

    #[test]
    fn test_post_next_link_is_not_followed() {
        let page: SearchPage = serde_json::from_value(serde_json::json!({
            "features": [],
            "links": [{"rel": "next", "href": "https://example.com/search", "method": "POST"}]
        }))
        .unwrap();
        assert!(page.next_url().is_none());
    }
}
