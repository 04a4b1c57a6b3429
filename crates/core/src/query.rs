//! Catalog search: build the request URL, fetch, parse.

use reqwest::Url;

use crate::config::{ApiConfig, DEFAULT_MAX_RESULTS};
use crate::error::QueryError;
use crate::fetch::HttpFetcher;
use crate::parse::parse_volumes;
use crate::volume::Volume;

/// Turns a search string into volumes. Every failure ends up as an empty
/// result plus a log entry; callers never see an error.
#[derive(Debug, Clone)]
pub struct QueryService {
    fetcher: HttpFetcher,
    base_url: String,
    max_results: u32,
}

impl QueryService {
    pub fn new(fetcher: HttpFetcher, api: &ApiConfig) -> Self {
        Self {
            fetcher,
            base_url: api.base_url.clone(),
            max_results: if api.max_results == 0 { DEFAULT_MAX_RESULTS } else { api.max_results },
        }
    }

    pub async fn search(&self, query: &str) -> Vec<Volume> {
        self.search_at(&self.base_url, query).await
    }

    pub async fn search_at(&self, base_url: &str, query: &str) -> Vec<Volume> {
        if query.trim().is_empty() {
            tracing::debug!("blank query, skipping request");
            return Vec::new();
        }
        let url = match build_request_url(base_url, query, self.max_results) {
            Ok(u) => u,
            Err(e) => {
                tracing::error!(error = %e, "problem building the URL");
                return Vec::new();
            }
        };
        match self.fetcher.get_text(url).await {
            Ok(body) => {
                let volumes = parse_volumes(Some(&body));
                tracing::info!(query, count = volumes.len(), "search complete");
                volumes
            }
            Err(e) => {
                tracing::error!(query, error = %e, "problem making the HTTP request");
                Vec::new()
            }
        }
    }
}

/// `<base_url>?q=<query>&maxResults=<n>`, keeping any query pairs the base
/// URL already carries.
pub fn build_request_url(base_url: &str, query: &str, max_results: u32) -> Result<Url, QueryError> {
    let mut url = Url::parse(base_url).map_err(|e| QueryError::MalformedUrl {
        url: base_url.to_string(),
        detail: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(QueryError::MalformedUrl {
            url: base_url.to_string(),
            detail: "not a hierarchical URL".to_string(),
        });
    }
    url.query_pairs_mut()
        .append_pair("q", query)
        .append_pair("maxResults", &max_results.to_string());
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_url_encodes_query() {
        let url = build_request_url("https://www.googleapis.com/books/v1/volumes", "rust & c++", 20).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/books/v1/volumes?q=rust+%26+c%2B%2B&maxResults=20"
        );
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("q".to_string(), "rust & c++".to_string()),
                ("maxResults".to_string(), "20".to_string()),
            ]
        );
    }

    #[test]
    fn request_url_keeps_existing_params() {
        let url = build_request_url("https://example.com/v?key=abc", "android", 20).unwrap();
        assert_eq!(url.as_str(), "https://example.com/v?key=abc&q=android&maxResults=20");
    }

    #[test]
    fn malformed_base_url() {
        assert!(matches!(
            build_request_url("not a url", "x", 20),
            Err(QueryError::MalformedUrl { .. })
        ));
        assert!(matches!(
            build_request_url("mailto:someone@example.com", "x", 20),
            Err(QueryError::MalformedUrl { .. })
        ));
    }

    #[tokio::test]
    async fn bad_base_url_yields_empty_result() {
        let fetcher = crate::fetch::HttpFetcher::new(&Default::default()).unwrap();
        let svc = QueryService::new(fetcher, &ApiConfig::default());
        assert!(svc.search_at("::::", "android").await.is_empty());
    }

    #[tokio::test]
    async fn blank_query_skips_request() {
        let fetcher = crate::fetch::HttpFetcher::new(&Default::default()).unwrap();
        let api = ApiConfig {
            base_url: "http://127.0.0.1:9/never".to_string(),
            max_results: 20,
        };
        let svc = QueryService::new(fetcher, &api);
        assert!(svc.search("   ").await.is_empty());
    }
}
