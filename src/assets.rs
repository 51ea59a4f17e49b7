//! 画像パイプライン
//!
//! 候補画像をローカルへダウンロードし、CDNへ再アップロードする。
//! アップロードはリトライ上限まで試し、失敗した画像は最終リストから
//! 取り除くだけでページ処理は止めない。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;
use tracing::{info, warn};

use crate::config::CrawlerConfig;
use crate::error::ScraperError;
use crate::record::{ImageAsset, PageRecord};
use crate::retry::bounded_retry;
use crate::traits::ImageHost;

/// ローカル画像ファイル名の固定プレフィックス
const IMAGE_PREFIX: &str = "Maido";

/// Cloudinary unsigned upload (upload_preset方式)
pub struct CloudinaryHost {
    client: reqwest::Client,
    upload_url: String,
    upload_preset: String,
}

impl CloudinaryHost {
    pub fn new(config: &CrawlerConfig) -> Result<Self, ScraperError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self {
            client,
            upload_url: format!(
                "https://api.cloudinary.com/v1_1/{}/image/upload",
                config.cloud_name
            ),
            upload_preset: config.upload_preset.clone(),
        })
    }
}

#[async_trait]
impl ImageHost for CloudinaryHost {
    async fn publish(&self, local_path: &Path) -> Result<String, ScraperError> {
        let bytes = tokio::fs::read(local_path).await?;
        let filename = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.jpg".to_string());

        let form = reqwest::multipart::Form::new()
            .text("upload_preset", self.upload_preset.clone())
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(filename),
            );

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScraperError::Upload(format!(
                "status={}, body={}",
                status, body
            )));
        }

        let json: serde_json::Value = response.json().await?;
        json.get("secure_url")
            .and_then(|url| url.as_str())
            .map(|url| url.to_string())
            .ok_or_else(|| ScraperError::Upload("レスポンスに secure_url がありません".into()))
    }
}

pub struct AssetPipeline {
    client: reqwest::Client,
    host: Box<dyn ImageHost>,
}

impl AssetPipeline {
    pub fn new(config: &CrawlerConfig, host: Box<dyn ImageHost>) -> Result<Self, ScraperError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self { client, host })
    }

    /// record内の候補画像を順にダウンロード→アップロードする。
    /// どちらかに失敗した画像は images から落ちる（出現順は保たれる）。
    pub async fn process(
        &self,
        record: &mut PageRecord,
        page_dir: &Path,
    ) -> Result<(), ScraperError> {
        std::fs::create_dir_all(page_dir)?;

        let candidates: Vec<ImageAsset> = record.images.drain(..).collect();
        let mut localized = Vec::with_capacity(candidates.len());
        let date = Local::now().format("%Y%m%d");

        for (index, mut image) in candidates.into_iter().enumerate() {
            // 同日再実行時の名前衝突は上書きで許容
            let filename = format!("{}{}_{}.jpg", IMAGE_PREFIX, date, index + 1);
            let local_path = page_dir.join(filename);

            match self.localize(&image.source_url, &local_path).await {
                Ok(()) => {
                    image.local_path = local_path;
                    localized.push(image);
                }
                Err(e) => {
                    warn!("Image download failed, dropping {}: {}", image.source_url, e);
                }
            }
        }

        record.images = self.publish_all(localized).await;
        info!(
            "Page {}: {} images hosted",
            record.page_id,
            record.images.len()
        );
        Ok(())
    }

    async fn localize(&self, url: &str, local_path: &Path) -> Result<(), ScraperError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ScraperError::Download(format!(
                "{}: status={}",
                url,
                response.status()
            )));
        }
        let bytes = response.bytes().await?;
        tokio::fs::write(local_path, &bytes).await?;
        Ok(())
    }

    /// ローカル化済み画像をCDNへ。リトライ尽きた画像は除外。
    async fn publish_all(&self, images: Vec<ImageAsset>) -> Vec<ImageAsset> {
        let mut hosted = Vec::with_capacity(images.len());

        for mut image in images {
            let path = image.local_path.clone();
            match bounded_retry("cdn upload", || self.host.publish(&path)).await {
                Ok(url) => {
                    image.hosted_url = Some(url);
                    hosted.push(image);
                }
                Err(e) => {
                    warn!("Upload exhausted retries, dropping {:?}: {}", path, e);
                }
            }
        }

        hosted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyHost {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl ImageHost for FlakyHost {
        async fn publish(&self, local_path: &Path) -> Result<String, ScraperError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_first {
                Err(ScraperError::Upload(format!("transient {}", n)))
            } else {
                Ok(format!("https://cdn.example.com/{}", local_path.display()))
            }
        }
    }

    fn pipeline_with(host: Box<dyn ImageHost>) -> AssetPipeline {
        AssetPipeline {
            client: reqwest::Client::new(),
            host,
        }
    }

    fn asset(name: &str) -> ImageAsset {
        ImageAsset {
            source_url: format!("https://example.com/{}", name),
            local_path: PathBuf::from(name),
            hosted_url: None,
        }
    }

    #[tokio::test]
    async fn test_third_attempt_success_keeps_image() {
        let pipeline = pipeline_with(Box::new(FlakyHost {
            calls: AtomicU32::new(0),
            fail_first: 2,
        }));

        let hosted = pipeline.publish_all(vec![asset("1.jpg")]).await;
        assert_eq!(hosted.len(), 1);
        assert_eq!(
            hosted[0].hosted_url.as_deref(),
            Some("https://cdn.example.com/1.jpg")
        );
    }

    #[tokio::test]
    async fn test_exhausted_retries_drop_image_only() {
        let pipeline = pipeline_with(Box::new(FlakyHost {
            calls: AtomicU32::new(0),
            fail_first: 3,
        }));

        // 1枚目はリトライ3回とも失敗、2枚目は即成功
        let hosted = pipeline
            .publish_all(vec![asset("1.jpg"), asset("2.jpg")])
            .await;
        assert_eq!(hosted.len(), 1);
        assert!(hosted[0].local_path.ends_with("2.jpg"));
    }

    #[tokio::test]
    async fn test_source_order_preserved() {
        let pipeline = pipeline_with(Box::new(FlakyHost {
            calls: AtomicU32::new(0),
            fail_first: 0,
        }));

        let hosted = pipeline
            .publish_all(vec![asset("a.jpg"), asset("b.jpg"), asset("c.jpg")])
            .await;
        let names: Vec<_> = hosted
            .iter()
            .map(|img| img.local_path.display().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg", "c.jpg"]);
    }
}
