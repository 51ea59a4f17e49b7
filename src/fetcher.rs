//! ページ取得
//!
//! chromiumoxideで物件詳細ページを開き、解決後URLがホームページなら
//! 「コンテンツなし」と分類する。固定のセトル待機のみで
//! セレクタ待機は行わない（サイト側レイアウトへの割り切り）。

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::CrawlerConfig;
use crate::error::ScraperError;
use crate::traits::{Fetched, PageSource};

/// 物件詳細ページのベースURL（末尾にページIDを連結）
pub const BASE_URL: &str = "https://www.designers-osaka-chintai.info/detail/id/";
/// リダイレクト判定に使うホームページURL
pub const HOMEPAGE_URL: &str = "https://www.designers-osaka-chintai.info/";

/// 末尾スラッシュの有無を無視してホームページと比較する
pub fn is_homepage(url: &str) -> bool {
    url.trim_end_matches('/') == HOMEPAGE_URL.trim_end_matches('/')
}

pub fn detail_url(page_id: u64) -> String {
    format!("{}{}", BASE_URL, page_id)
}

pub struct PageFetcher {
    config: CrawlerConfig,
    browser: Option<Browser>,
}

impl PageFetcher {
    pub fn new(config: CrawlerConfig) -> Self {
        Self {
            config,
            browser: None,
        }
    }

    fn get_browser(&self) -> Result<&Browser, ScraperError> {
        self.browser
            .as_ref()
            .ok_or_else(|| ScraperError::BrowserInit("ブラウザが初期化されていません".into()))
    }

    async fn eval_string(&self, page: &Page, script: &str) -> Result<String, ScraperError> {
        let result = page
            .evaluate(script)
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?;
        Ok(result.into_value::<String>().unwrap_or_default())
    }

    async fn debug_screenshot(&self, page: &Page, page_id: u64) {
        if !self.config.debug {
            return;
        }
        if let Ok(screenshot) = page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            use base64::Engine;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&screenshot);
            debug!(
                "Page {} screenshot: data:image/png;base64,{}",
                page_id, encoded
            );
        }
    }
}

#[async_trait]
impl PageSource for PageFetcher {
    async fn initialize(&mut self) -> Result<(), ScraperError> {
        info!("Initializing browser for listing fetcher...");

        // ユニークなユーザーデータディレクトリを生成
        let unique_id = format!(
            "{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let user_data_dir = std::env::temp_dir().join(format!("chintai-{}", unique_id));

        // Chrome パスを取得
        let chrome_path = std::env::var("CHROME_PATH")
            .or_else(|_| std::env::var("CHROMIUM_PATH"))
            .unwrap_or_else(|_| "chromium".to_string());

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(&user_data_dir);

        if !self.config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .no_sandbox()
            .request_timeout(Duration::from_secs(60))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        if self.config.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        // ハンドラータスクを起動
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        self.browser = Some(browser);
        info!("Browser initialized successfully");

        Ok(())
    }

    async fn fetch(&self, page_id: u64) -> Result<Fetched, ScraperError> {
        let url = detail_url(page_id);
        info!("Fetching page {}: {}", page_id, url);

        let page = self
            .get_browser()?
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        let outcome = self.fetch_on(&page, page_id, &url).await;

        if let Err(e) = page.close().await {
            debug!("Failed to close page: {}", e);
        }

        outcome
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.browser = None;
        Ok(())
    }
}

impl PageFetcher {
    async fn fetch_on(
        &self,
        page: &Page,
        page_id: u64,
        url: &str,
    ) -> Result<Fetched, ScraperError> {
        page.goto(url)
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;

        // 固定セトル待機
        sleep(self.config.settle_delay).await;

        let resolved = self.eval_string(page, "window.location.href").await?;
        if is_homepage(&resolved) {
            info!("Page {} redirected to homepage, no content", page_id);
            return Ok(Fetched::Redirected);
        }

        self.debug_screenshot(page, page_id).await;

        let html = self
            .eval_string(page, "document.documentElement.outerHTML")
            .await?;
        if html.is_empty() {
            return Err(ScraperError::Navigation(format!(
                "ページ {} のHTMLが取得できません",
                page_id
            )));
        }

        debug!("Page {} captured, {} bytes", page_id, html.len());
        Ok(Fetched::Page(html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_homepage_with_and_without_trailing_slash() {
        assert!(is_homepage("https://www.designers-osaka-chintai.info/"));
        assert!(is_homepage("https://www.designers-osaka-chintai.info"));
    }

    #[test]
    fn test_detail_pages_are_not_homepage() {
        assert!(!is_homepage("https://www.designers-osaka-chintai.info/detail/id/12345"));
        assert!(!is_homepage("https://example.com/"));
    }

    #[test]
    fn test_detail_url_appends_page_id() {
        assert_eq!(
            detail_url(12449),
            "https://www.designers-osaka-chintai.info/detail/id/12449"
        );
    }
}
