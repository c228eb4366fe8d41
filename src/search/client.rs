// src/search/client.rs
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use super::backoff::Backoff;
use super::query::{Query, Response};
use super::transport::{Transport, TransportConfig, TransportError};
use crate::certificate::Certificate;
use crate::stats::StatsCollector;

pub const DEFAULT_BASE_URL: &str = "https://certs-io1.p.rapidapi.com/certificates";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("api client: {0}")]
    Transport(#[from] TransportError),
    #[error("api client: failed to encode query: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("api client: failed to decode page {page}: {source}")]
    Decode {
        page: u64,
        #[source]
        source: serde_json::Error,
    },
    #[error("api client: search cancelled")]
    Cancelled,
    #[error("api client: result channel closed")]
    ChannelClosed,
}

/// Search client for the certs.io API
pub struct Client {
    transport: Transport,
    transport_config: TransportConfig,
    base_url: String,
    max_pages: u64,
    stats: Option<StatsCollector>,
}

impl Client {
    pub fn new(api_key: impl Into<String>) -> Result<Self, SearchError> {
        let transport_config = TransportConfig {
            api_key: api_key.into(),
            ..Default::default()
        };

        Ok(Self {
            transport: Transport::new(transport_config.clone())?,
            transport_config,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_pages: 0,
            stats: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Maximum number of pages to fetch, 0 for all pages
    pub fn with_max_pages(mut self, max_pages: u64) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Record the expected page count in `stats` as pages arrive
    pub fn with_stats(mut self, stats: StatsCollector) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, SearchError> {
        self.rebuild(|cfg| cfg.timeout = timeout)
    }

    pub fn with_retries(self, max_retries: u32) -> Result<Self, SearchError> {
        self.rebuild(|cfg| cfg.max_retries = max_retries)
    }

    pub fn with_backoff(self, backoff: Arc<dyn Backoff>) -> Result<Self, SearchError> {
        self.rebuild(|cfg| cfg.backoff = backoff)
    }

    fn rebuild(mut self, update: impl FnOnce(&mut TransportConfig)) -> Result<Self, SearchError> {
        update(&mut self.transport_config);
        self.transport = Transport::new(self.transport_config.clone())?;
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn max_pages(&self) -> u64 {
        self.max_pages
    }

    /// Collect every page of a search into memory.
    pub async fn search(
        &self,
        query: Query,
        cancel: watch::Receiver<bool>,
    ) -> Result<Vec<Certificate>, SearchError> {
        let (tx, mut rx) = mpsc::channel(1);

        let collect = async {
            let mut results = Vec::new();
            while let Some(page) = rx.recv().await {
                results.extend(page);
            }
            results
        };

        let (streamed, results) = tokio::join!(self.stream(query, tx, cancel), collect);
        streamed?;
        Ok(results)
    }

    /// Stream a search page by page into `out`.
    ///
    /// Pages are requested one at a time in increasing order and each page's
    /// certificates are sent as soon as it is decoded. The loop ends after the
    /// last page, or after page `max_pages - 1` when a cap is set. `out` is
    /// dropped on return, which closes the channel for the consumer.
    pub async fn stream(
        &self,
        mut query: Query,
        out: mpsc::Sender<Vec<Certificate>>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<(), SearchError> {
        loop {
            if *cancel.borrow() {
                return Err(SearchError::Cancelled);
            }

            let body = serde_json::to_vec(&query).map_err(SearchError::Encode)?;

            debug!("Requesting {} page {}", query.field, query.page);

            let response = tokio::select! {
                res = self.fetch_page(body, query.page) => res?,
                _ = cancelled(&mut cancel) => return Err(SearchError::Cancelled),
            };

            let current_page = response.current_page;
            let total_pages = response.pages;

            debug!(
                "Received page {}/{} ({} certificates, {} total)",
                current_page,
                total_pages,
                response.certificates.len(),
                response.total
            );

            if let Some(ref stats) = self.stats {
                stats.set_total_pages(self.expected_pages(total_pages));
            }

            tokio::select! {
                sent = out.send(response.certificates) => {
                    sent.map_err(|_| SearchError::ChannelClosed)?;
                }
                _ = cancelled(&mut cancel) => return Err(SearchError::Cancelled),
            }

            if self.is_last_page(query.page, current_page, total_pages) {
                info!(
                    "Search for {}={} finished at page {}/{}",
                    query.field, query.value, current_page, total_pages
                );
                return Ok(());
            }

            query.page += 1;
        }
    }

    async fn fetch_page(&self, body: Vec<u8>, page: u64) -> Result<Response, SearchError> {
        let response = self.transport.post(&self.base_url, body).await?;
        let bytes = response.bytes().await.map_err(TransportError::from)?;

        serde_json::from_slice(&bytes).map_err(|source| SearchError::Decode { page, source })
    }

    /// Number of pages the loop will fetch; `total_pages` is the last page index
    fn expected_pages(&self, total_pages: u64) -> u64 {
        let available = total_pages.saturating_add(1);
        if self.max_pages > 0 {
            available.min(self.max_pages)
        } else {
            available
        }
    }

    /// `requested` is the page we asked for, `current_page` the page the
    /// server says it returned. Either reaching a bound ends the loop, so a
    /// server that never advances its page number still terminates.
    fn is_last_page(&self, requested: u64, current_page: u64, total_pages: u64) -> bool {
        let page = requested.max(current_page);
        page >= total_pages || (self.max_pages > 0 && page.saturating_add(1) >= self.max_pages)
    }
}

/// Resolves once the watch value turns true. A dropped sender never cancels.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::query::Field;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// Serves `total_pages` pages; page N holds one certificate named pN.example.com
    struct PagedResponder {
        total_pages: u64,
    }

    impl Respond for PagedResponder {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            let page = body.get("page").and_then(|p| p.as_u64()).unwrap_or(0);

            ResponseTemplate::new(200).set_body_json(json!({
                "total_certificates": self.total_pages + 1,
                "total_pages": self.total_pages,
                "page": page,
                "certificates": [
                    {"server": "1.2.3.4:443", "ssl_names": [format!("p{}.example.com", page)]}
                ]
            }))
        }
    }

    async fn paged_server(total_pages: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(PagedResponder { total_pages })
            .mount(&server)
            .await;
        server
    }

    fn client(server: &MockServer) -> Client {
        Client::new("test-key")
            .unwrap()
            .with_base_url(server.uri())
            .with_backoff(Arc::new(|_: u32| Duration::from_millis(1)))
            .unwrap()
    }

    fn not_cancelled() -> watch::Receiver<bool> {
        let (_tx, rx) = watch::channel(false);
        rx
    }

    async fn drain(mut rx: mpsc::Receiver<Vec<Certificate>>) -> Vec<Vec<Certificate>> {
        let mut pages = Vec::new();
        while let Some(page) = rx.recv().await {
            pages.push(page);
        }
        pages
    }

    #[tokio::test]
    async fn test_stream_all_pages_in_order() {
        let server = paged_server(3).await;
        let client = client(&server);
        let (tx, rx) = mpsc::channel(1);

        let (res, pages) = tokio::join!(
            client.stream(Query::new(Field::Domain, "example.com"), tx, not_cancelled()),
            drain(rx)
        );

        res.unwrap();
        let names: Vec<String> = pages.iter().map(|p| p[0].names[0].clone()).collect();
        assert_eq!(
            names,
            vec!["p0.example.com", "p1.example.com", "p2.example.com", "p3.example.com"]
        );
        assert_eq!(server.received_requests().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_page_cap_stops_early() {
        let server = paged_server(10).await;
        let client = client(&server).with_max_pages(2);
        let (tx, rx) = mpsc::channel(1);

        let (res, pages) = tokio::join!(
            client.stream(Query::new(Field::Org, "Example Inc"), tx, not_cancelled()),
            drain(rx)
        );

        res.unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_single_page_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_certificates": 1,
                "total_pages": 0,
                "page": 0,
                "certificates": [{"server": "5.6.7.8:443", "ssl_names": ["only.example.com"]}]
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let certs = client
            .search(Query::new(Field::Serial, "01"), not_cancelled())
            .await
            .unwrap();

        assert_eq!(certs.len(), 1);
        assert_eq!(certs[0].server, "5.6.7.8:443");
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_collects_pages() {
        let server = paged_server(2).await;
        let client = client(&server);

        let certs = client
            .search(Query::new(Field::Domain, "example.com"), not_cancelled())
            .await
            .unwrap();

        assert_eq!(certs.len(), 3);
    }

    #[tokio::test]
    async fn test_decode_error_aborts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let client = client(&server);
        let err = client
            .search(Query::new(Field::Domain, "example.com"), not_cancelled())
            .await
            .unwrap_err();

        assert!(matches!(err, SearchError::Decode { page: 0, .. }));
    }

    #[tokio::test]
    async fn test_bad_api_key_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client(&server);
        let err = client
            .search(Query::new(Field::Domain, "example.com"), not_cancelled())
            .await
            .unwrap_err();

        assert!(matches!(err, SearchError::Transport(TransportError::Unauthorized)));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_request() {
        let server = paged_server(5).await;
        let client = client(&server);
        let (cancel_tx, cancel_rx) = watch::channel(true);

        let err = client
            .search(Query::new(Field::Domain, "example.com"), cancel_rx)
            .await
            .unwrap_err();

        assert!(matches!(err, SearchError::Cancelled));
        assert!(server.received_requests().await.unwrap().is_empty());
        drop(cancel_tx);
    }

    #[tokio::test]
    async fn test_stuck_page_number_still_terminates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_certificates": 9,
                "total_pages": 3,
                "page": 0,
                "certificates": [{"server": "1.2.3.4:443", "ssl_names": ["same.example.com"]}]
            })))
            .mount(&server)
            .await;

        let capped = client(&server).with_max_pages(2);
        let certs = tokio::time::timeout(
            Duration::from_secs(5),
            capped.search(Query::new(Field::Domain, "example.com"), not_cancelled()),
        )
        .await
        .expect("capped search should terminate")
        .unwrap();
        assert_eq!(certs.len(), 2);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);

        server.reset().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_certificates": 9,
                "total_pages": 3,
                "page": 0,
                "certificates": []
            })))
            .mount(&server)
            .await;

        let uncapped = client(&server);
        tokio::time::timeout(
            Duration::from_secs(5),
            uncapped.search(Query::new(Field::Domain, "example.com"), not_cancelled()),
        )
        .await
        .expect("uncapped search should terminate")
        .unwrap();
        assert_eq!(server.received_requests().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_cancel_during_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "total_certificates": 0,
                        "total_pages": 0,
                        "page": 0,
                        "certificates": []
                    }))
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let client = client(&server);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let started = std::time::Instant::now();

        let cancel = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel_tx.send(true).unwrap();
        };
        let (res, ()) = tokio::join!(
            client.search(Query::new(Field::Domain, "example.com"), cancel_rx),
            cancel
        );

        assert!(matches!(res, Err(SearchError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_while_consumer_is_stalled() {
        let server = paged_server(10).await;
        let client = client(&server);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        // Capacity 1 and nobody reading: the second page blocks on send
        let (tx, rx) = mpsc::channel(1);

        let cancel = async {
            while server.received_requests().await.unwrap().len() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel_tx.send(true).unwrap();
        };
        let (res, ()) = tokio::join!(
            client.stream(Query::new(Field::Domain, "example.com"), tx, cancel_rx),
            cancel
        );

        assert!(matches!(res, Err(SearchError::Cancelled)));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
        drop(rx);
    }

    #[tokio::test]
    async fn test_closed_channel_aborts() {
        let server = paged_server(5).await;
        let client = client(&server);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let err = client
            .stream(Query::new(Field::Domain, "example.com"), tx, not_cancelled())
            .await
            .unwrap_err();

        assert!(matches!(err, SearchError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_stats_record_expected_pages() {
        let server = paged_server(9).await;
        let stats = StatsCollector::new();
        let capped = client(&server).with_max_pages(3).with_stats(stats.clone());

        capped
            .search(Query::new(Field::Domain, "example.com"), not_cancelled())
            .await
            .unwrap();
        assert_eq!(stats.snapshot().total_pages, 3);

        let all = client(&server).with_stats(stats.clone());
        all.search(Query::new(Field::Domain, "example.com"), not_cancelled())
            .await
            .unwrap();
        assert_eq!(stats.snapshot().total_pages, 10);
    }

    #[test]
    fn test_is_last_page() {
        let client = Client::new("key").unwrap();
        assert!(client.is_last_page(3, 3, 3));
        assert!(!client.is_last_page(2, 2, 3));
        assert!(client.is_last_page(3, 0, 3));
        assert!(client.is_last_page(0, 4, 3));

        let capped = Client::new("key").unwrap().with_max_pages(1);
        assert!(capped.is_last_page(0, 0, 3));

        let capped = Client::new("key").unwrap().with_max_pages(2);
        assert!(!capped.is_last_page(0, 0, 3));
        assert!(capped.is_last_page(1, 0, 3));
    }
}
