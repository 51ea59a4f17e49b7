use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::Service;
use tracing::info;

use crate::config::CrawlerConfig;
use crate::crawler::{Crawler, CrawlSummary};
use crate::error::ScraperError;

/// クロールリクエスト
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub webflow_token: String,
    pub collection_id: String,
    pub cloud_name: String,
    pub upload_preset: String,
    pub category_id: String,
    pub district_id: String,
    pub output_dir: PathBuf,
    pub checkpoint_path: PathBuf,
    pub start_page: u64,
    pub headless: bool,
}

impl CrawlRequest {
    pub fn new(
        webflow_token: impl Into<String>,
        collection_id: impl Into<String>,
        cloud_name: impl Into<String>,
        upload_preset: impl Into<String>,
    ) -> Self {
        let defaults = CrawlerConfig::default();
        Self {
            webflow_token: webflow_token.into(),
            collection_id: collection_id.into(),
            cloud_name: cloud_name.into(),
            upload_preset: upload_preset.into(),
            category_id: String::new(),
            district_id: String::new(),
            output_dir: defaults.output_dir,
            checkpoint_path: defaults.checkpoint_path,
            start_page: defaults.start_page,
            headless: true,
        }
    }

    pub fn with_references(
        mut self,
        category_id: impl Into<String>,
        district_id: impl Into<String>,
    ) -> Self {
        self.category_id = category_id.into();
        self.district_id = district_id.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_start_page(mut self, page: u64) -> Self {
        self.start_page = page;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }
}

impl From<CrawlRequest> for CrawlerConfig {
    fn from(req: CrawlRequest) -> Self {
        CrawlerConfig::new(
            req.webflow_token,
            req.collection_id,
            req.cloud_name,
            req.upload_preset,
        )
        .with_references(req.category_id, req.district_id)
        .with_output_dir(req.output_dir)
        .with_checkpoint_path(req.checkpoint_path)
        .with_start_page(req.start_page)
        .with_headless(req.headless)
    }
}

/// tower::Serviceを実装したクロールサービス
#[derive(Debug, Clone, Default)]
pub struct IngestService {
    // 将来的な拡張用（レートリミットなど）
}

impl IngestService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<CrawlRequest> for IngestService {
    type Response = CrawlSummary;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: CrawlRequest) -> Self::Future {
        info!(
            "クロールリクエスト受信: collection={}, start_page={}",
            req.collection_id, req.start_page
        );

        Box::pin(async move {
            let config: CrawlerConfig = req.into();
            let mut crawler = Crawler::new(config)?;

            let summary = crawler.run().await?;

            info!(
                "クロール完了: published={}, skipped={}, last_page={}",
                summary.published, summary.skipped, summary.last_page
            );

            Ok(summary)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawl_request_builder() {
        let req = CrawlRequest::new("token", "coll", "cloud", "preset")
            .with_output_dir("/tmp/out")
            .with_start_page(12001)
            .with_headless(false);

        assert_eq!(req.webflow_token, "token");
        assert_eq!(req.collection_id, "coll");
        assert_eq!(req.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(req.start_page, 12001);
        assert!(!req.headless);
    }

    #[test]
    fn test_crawl_request_to_config() {
        let req = CrawlRequest::new("token", "coll", "cloud", "preset")
            .with_references("cat", "dist");
        let config: CrawlerConfig = req.into();

        assert_eq!(config.webflow_token, "token");
        assert_eq!(config.cloud_name, "cloud");
        assert_eq!(config.category_id, "cat");
        assert_eq!(config.district_id, "dist");
    }
}
