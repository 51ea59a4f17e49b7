use std::path::PathBuf;
use std::time::Duration;

use crate::error::ScraperError;

/// タイトルが取れなかったページの扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitlePolicy {
    /// ページをスキップ（無効ページ扱い）
    SkipPage,
    /// プレースホルダータイトルで続行
    Placeholder,
}

#[derive(Debug, Clone)]
pub struct CrawlerConfig {
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
    pub debug: bool,
    pub title_policy: TitlePolicy,
    pub settle_delay: Duration,
    pub http_timeout: Duration,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            webflow_token: String::new(),
            collection_id: String::new(),
            cloud_name: String::new(),
            upload_preset: String::new(),
            category_id: String::new(),
            district_id: String::new(),
            output_dir: PathBuf::from("./scraped_data"),
            checkpoint_path: PathBuf::from("./last_page.txt"),
            start_page: 12001,
            headless: true,
            debug: false,
            title_policy: TitlePolicy::SkipPage,
            settle_delay: Duration::from_secs(3),
            http_timeout: Duration::from_secs(30),
        }
    }
}

fn required_env(key: &str) -> Result<String, ScraperError> {
    std::env::var(key)
        .map_err(|_| ScraperError::Config(format!("環境変数 {} が設定されていません", key)))
}

impl CrawlerConfig {
    pub fn new(
        webflow_token: impl Into<String>,
        collection_id: impl Into<String>,
        cloud_name: impl Into<String>,
        upload_preset: impl Into<String>,
    ) -> Self {
        Self {
            webflow_token: webflow_token.into(),
            collection_id: collection_id.into(),
            cloud_name: cloud_name.into(),
            upload_preset: upload_preset.into(),
            ..Default::default()
        }
    }

    /// 環境変数から設定を構築（必須クレデンシャル欠落は即エラー）
    pub fn from_env() -> Result<Self, ScraperError> {
        let mut config = Self::new(
            required_env("WEBFLOW_API_TOKEN")?,
            required_env("WEBFLOW_COLLECTION_ID")?,
            required_env("CLOUDINARY_CLOUD_NAME")?,
            required_env("CLOUDINARY_UPLOAD_PRESET")?,
        );

        config.category_id = std::env::var("CATEGORY_ID").unwrap_or_default();
        config.district_id = std::env::var("DISTRICT_ID").unwrap_or_default();

        if let Ok(dir) = std::env::var("OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("CHECKPOINT_FILE") {
            config.checkpoint_path = PathBuf::from(path);
        }
        if let Ok(page) = std::env::var("START_PAGE") {
            config.start_page = page
                .parse()
                .map_err(|_| ScraperError::Config(format!("START_PAGE が不正です: {}", page)))?;
        }

        Ok(config)
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = path.into();
        self
    }

    pub fn with_start_page(mut self, page: u64) -> Self {
        self.start_page = page;
        self
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

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_title_policy(mut self, policy: TitlePolicy) -> Self {
        self.title_policy = policy;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = CrawlerConfig::new("token", "coll", "cloud", "preset")
            .with_output_dir("/tmp/out")
            .with_start_page(12345)
            .with_references("cat", "dist")
            .with_headless(false)
            .with_title_policy(TitlePolicy::Placeholder);

        assert_eq!(config.webflow_token, "token");
        assert_eq!(config.collection_id, "coll");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.start_page, 12345);
        assert_eq!(config.category_id, "cat");
        assert!(!config.headless);
        assert_eq!(config.title_policy, TitlePolicy::Placeholder);
    }

    #[test]
    fn test_default_knobs() {
        let config = CrawlerConfig::default();
        assert_eq!(config.checkpoint_path, PathBuf::from("./last_page.txt"));
        assert_eq!(config.title_policy, TitlePolicy::SkipPage);
        assert_eq!(config.settle_delay, Duration::from_secs(3));
    }
}
