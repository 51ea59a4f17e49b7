//! CMS登録
//!
//! PageRecord をWebflow v1形式のフィールド群に組み立て、
//! 安定スラグ `property-{page_id}` でupsertする。
//! 同じページを二度publishしてもコレクション内のアイテムは1つ。

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::config::CrawlerConfig;
use crate::error::ScraperError;
use crate::record::PageRecord;
use crate::retry::bounded_retry;
use crate::traits::CmsClient;

/// コラボレータ側の上限: multi-imageは25枚まで
const MULTI_IMAGE_CAP: usize = 25;

const API_VERSION: &str = "1.0.0";

/// Webflow Collection Items API (v1)
pub struct WebflowClient {
    client: reqwest::Client,
    token: String,
    items_url: String,
}

impl WebflowClient {
    pub fn new(config: &CrawlerConfig) -> Result<Self, ScraperError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self {
            client,
            token: config.webflow_token.clone(),
            items_url: format!(
                "https://api.webflow.com/collections/{}/items",
                config.collection_id
            ),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("accept-version", API_VERSION)
    }

    async fn check(&self, response: reqwest::Response) -> Result<Value, ScraperError> {
        let status = response.status();
        if status == reqwest::StatusCode::OK || status == reqwest::StatusCode::CREATED {
            return Ok(response.json().await.unwrap_or(Value::Null));
        }
        // 診断用にボディを残す
        let body = response.text().await.unwrap_or_default();
        Err(ScraperError::Publish {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl CmsClient for WebflowClient {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<String>, ScraperError> {
        // v1 APIはスラグ検索を持たないためページスキャンで探す
        let mut offset = 0usize;
        loop {
            let offset_param = offset.to_string();
            let response = self
                .authorize(self.client.get(&self.items_url))
                .query(&[("limit", "100"), ("offset", offset_param.as_str())])
                .send()
                .await?;
            let json = self.check(response).await?;

            let items = json
                .get("items")
                .and_then(|items| items.as_array())
                .cloned()
                .unwrap_or_default();

            for item in &items {
                if item.get("slug").and_then(|s| s.as_str()) == Some(slug) {
                    let item_id = item
                        .get("_id")
                        .and_then(|id| id.as_str())
                        .map(|id| id.to_string());
                    return Ok(item_id);
                }
            }

            if items.len() < 100 {
                return Ok(None);
            }
            offset += 100;
        }
    }

    async fn create(&self, payload: &Value) -> Result<(), ScraperError> {
        let response = self
            .authorize(self.client.post(&self.items_url))
            .json(&json!({ "fields": payload }))
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    async fn update(&self, item_id: &str, payload: &Value) -> Result<(), ScraperError> {
        let url = format!("{}/{}", self.items_url, item_id);
        let response = self
            .authorize(self.client.put(&url))
            .json(&json!({ "fields": payload }))
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }
}

pub struct Publisher {
    cms: Box<dyn CmsClient>,
    category_id: String,
    district_id: String,
}

impl Publisher {
    pub fn new(config: &CrawlerConfig, cms: Box<dyn CmsClient>) -> Self {
        Self {
            cms,
            category_id: config.category_id.clone(),
            district_id: config.district_id.clone(),
        }
    }

    /// CMSフィールドを組み立てる。抽出済み属性はキーごとに平坦化し、
    /// 画像は25枚で打ち切る。
    pub fn build_fields(&self, record: &PageRecord) -> Value {
        let images: Vec<Value> = record
            .hosted_urls()
            .into_iter()
            .take(MULTI_IMAGE_CAP)
            .map(|url| json!({ "url": url }))
            .collect();

        let mut fields = json!({
            "name": record.title,
            "slug": record.slug(),
            "_archived": false,
            "_draft": false,
            "description": record.description,
            "multi-image": images,
        });

        let map = fields.as_object_mut().expect("fields is an object");

        for (key, value) in record
            .property_attributes
            .iter()
            .chain(record.room_attributes.iter())
        {
            map.insert(key.clone(), Value::String(value.clone()));
        }

        if !record.equipment.is_empty() {
            map.insert(
                "equipment".to_string(),
                Value::String(record.equipment.join(" ")),
            );
        }
        if let Some(link) = &record.map_link {
            map.insert("map-link".to_string(), Value::String(link.clone()));
        }
        if !self.category_id.is_empty() {
            map.insert("category".to_string(), Value::String(self.category_id.clone()));
        }
        if !self.district_id.is_empty() {
            map.insert("district".to_string(), Value::String(self.district_id.clone()));
        }

        fields
    }

    async fn upsert(&self, slug: &str, fields: &Value) -> Result<(), ScraperError> {
        match self.cms.find_by_slug(slug).await? {
            Some(item_id) => self.cms.update(&item_id, fields).await,
            None => self.cms.create(fields).await,
        }
    }

    /// upsert: スラグ一致アイテムがあれば更新、なければ作成。
    /// 共通リトライ方針（3回・即時）を適用する。
    pub async fn publish(&self, record: &PageRecord) -> Result<(), ScraperError> {
        let fields = self.build_fields(record);
        let slug = record.slug();

        bounded_retry("cms publish", || self.upsert(&slug, &fields)).await?;

        info!("Published: {} (page {})", record.title, record.page_id);
        Ok(())
    }
}
