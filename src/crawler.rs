//! クロールループ
//!
//! チェックポイントの次のページIDから fetch → extract → assets → publish を
//! 1ページずつ回す。連続無効ページが閾値に達したら「リスト終端」とみなして
//! 停止する。ページ内のエラーはすべてページ境界で捕捉して分類に変換し、
//! ループ自体は止めない。

use std::path::Path;

use tracing::{error, info, warn};

use crate::assets::{AssetPipeline, CloudinaryHost};
use crate::checkpoint::CheckpointStore;
use crate::config::CrawlerConfig;
use crate::error::ScraperError;
use crate::extract::extract;
use crate::fetcher::PageFetcher;
use crate::publisher::{Publisher, WebflowClient};
use crate::record::PageRecord;
use crate::traits::{Fetched, PageSource};

/// 連続無効ページの停止閾値
const INVALID_THRESHOLD: u32 = 10;

/// 1ページ処理の分類結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageOutcome {
    /// 有効ページでCMS登録も成功
    Published,
    /// 有効ページだがCMS登録がリトライ上限まで失敗。
    /// チェックポイントを進めず次回実行で再訪する。
    PublishFailed,
    /// リダイレクト・通信エラー・タイトルなし等のコンテンツなしページ
    Invalid,
}

#[derive(Debug, Default, Clone)]
pub struct CrawlSummary {
    pub published: u64,
    pub skipped: u64,
    pub publish_failures: u64,
    /// 最後に処理を試みたページID（1ページも処理しなければ0）
    pub last_page: u64,
}

pub struct Crawler {
    config: CrawlerConfig,
    source: Box<dyn PageSource>,
    assets: AssetPipeline,
    publisher: Publisher,
    checkpoint: CheckpointStore,
}

impl Crawler {
    /// 本番構成（ヘッドレスブラウザ + Cloudinary + Webflow）
    pub fn new(config: CrawlerConfig) -> Result<Self, ScraperError> {
        let source = Box::new(PageFetcher::new(config.clone()));
        let assets = AssetPipeline::new(&config, Box::new(CloudinaryHost::new(&config)?))?;
        let publisher = Publisher::new(&config, Box::new(WebflowClient::new(&config)?));
        let checkpoint = CheckpointStore::new(&config.checkpoint_path);

        Ok(Self {
            config,
            source,
            assets,
            publisher,
            checkpoint,
        })
    }

    /// クロール実行。ブラウザは中断・エラーを含むすべての経路で閉じる。
    pub async fn run(&mut self) -> Result<CrawlSummary, ScraperError> {
        self.source.initialize().await?;

        let result = self.crawl_loop().await;

        if let Err(e) = self.source.close().await {
            warn!("Failed to close browser: {}", e);
        }

        result
    }

    async fn crawl_loop(&mut self) -> Result<CrawlSummary, ScraperError> {
        let mut page_id = match self.checkpoint.read() {
            Some(done) => {
                info!("Resuming from checkpoint: last completed page {}", done);
                done + 1
            }
            None => {
                info!("No checkpoint, starting at page {}", self.config.start_page);
                self.config.start_page
            }
        };

        let mut consecutive_invalid = 0u32;
        let mut summary = CrawlSummary::default();
        // 最初の未完了ページ（登録失敗またはスキップ）。チェックポイントは
        // このページの手前で止め、後続ページが成功しても追い越さない。
        let mut revisit_from: Option<u64> = None;

        while consecutive_invalid < INVALID_THRESHOLD {
            let outcome = tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupt received, closing session...");
                    break;
                }
                outcome = self.ingest_page(page_id) => outcome,
            };

            match outcome {
                PageOutcome::Published => {
                    consecutive_invalid = 0;
                    summary.published += 1;
                    match revisit_from {
                        None => self.checkpoint.write(page_id)?,
                        Some(pending) => {
                            info!(
                                "Checkpoint held before page {}, not advancing to {}",
                                pending, page_id
                            );
                        }
                    }
                }
                PageOutcome::PublishFailed => {
                    consecutive_invalid = 0;
                    summary.publish_failures += 1;
                    revisit_from.get_or_insert(page_id);
                }
                PageOutcome::Invalid => {
                    consecutive_invalid += 1;
                    summary.skipped += 1;
                    revisit_from.get_or_insert(page_id);
                }
            }

            summary.last_page = page_id;
            page_id += 1;
        }

        if consecutive_invalid >= INVALID_THRESHOLD {
            info!(
                "{} consecutive invalid pages, assuming end of listings",
                consecutive_invalid
            );
        }
        info!(
            "Crawl finished: published={}, skipped={}, publish_failures={}, last_page={}",
            summary.published, summary.skipped, summary.publish_failures, summary.last_page
        );

        Ok(summary)
    }

    /// ページ境界。ここより内側のエラーは分類に変換され、外へ漏れない。
    async fn ingest_page(&self, page_id: u64) -> PageOutcome {
        let html = match self.source.fetch(page_id).await {
            Ok(Fetched::Page(html)) => html,
            Ok(Fetched::Redirected) => return PageOutcome::Invalid,
            Err(e) => {
                // 通信エラーはリダイレクトと同じ「コンテンツなし」扱い
                warn!("Fetch failed for page {}: {}", page_id, e);
                return PageOutcome::Invalid;
            }
        };

        let mut record = match extract(page_id, &html, self.config.title_policy) {
            Ok(record) => record,
            Err(e) => {
                info!("Page {} not usable: {}", page_id, e);
                return PageOutcome::Invalid;
            }
        };

        let page_dir = self.config.output_dir.join(page_id.to_string());
        if let Err(e) = self.assets.process(&mut record, &page_dir).await {
            warn!("Asset pipeline failed for page {}: {}", page_id, e);
            return PageOutcome::Invalid;
        }

        self.write_snapshot(&record, &page_dir);

        match self.publisher.publish(&record).await {
            Ok(()) => PageOutcome::Published,
            Err(e) => {
                error!("Publish failed for page {}: {}", page_id, e);
                PageOutcome::PublishFailed
            }
        }
    }

    /// 抽出結果のJSONスナップショット。失敗してもログのみ。
    fn write_snapshot(&self, record: &PageRecord, page_dir: &Path) {
        let path = page_dir.join("record.json");
        match serde_json::to_string_pretty(record) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    error!("Failed to save snapshot {:?}: {}", path, e);
                } else {
                    info!("Saved snapshot to {:?}", path);
                }
            }
            Err(e) => error!("Failed to serialize record {}: {}", record.page_id, e),
        }
    }
}
