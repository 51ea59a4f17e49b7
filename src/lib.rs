//! 物件スクレイパーライブラリ
//!
//! - デザイナーズ大阪賃貸の物件詳細ページを巡回して抽出
//! - 画像をCDNに再ホストし、Webflow CMSにupsert登録
//! - チェックポイントファイルで中断・再開可能
//!
//! # クローラー使用例
//!
//! ```rust,ignore
//! use chintai_scraper::{Crawler, CrawlerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = CrawlerConfig::from_env().unwrap();
//!     let mut crawler = Crawler::new(config).unwrap();
//!     let summary = crawler.run().await.unwrap();
//!     println!("published: {}", summary.published);
//! }
//! ```
//!
//! # tower Service 使用例
//!
//! ```rust,ignore
//! use chintai_scraper::{IngestService, CrawlRequest};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = IngestService::new();
//!
//!     let request = CrawlRequest::new("token", "collection", "cloud", "preset")
//!         .with_start_page(12001)
//!         .with_output_dir("./scraped_data");
//!
//!     let summary = service.call(request).await.unwrap();
//!     println!("published: {}", summary.published);
//! }
//! ```

pub mod assets;
pub mod checkpoint;
pub mod config;
pub mod crawler;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod publisher;
pub mod record;
pub mod retry;
pub mod service;
pub mod traits;

// 主要な型をリエクスポート
pub use checkpoint::CheckpointStore;
pub use config::{CrawlerConfig, TitlePolicy};
pub use crawler::{CrawlSummary, Crawler};
pub use error::ScraperError;
pub use record::{ImageAsset, PageRecord};
pub use service::{CrawlRequest, IngestService};
pub use traits::{CmsClient, Fetched, ImageHost, PageSource};
