use std::path::Path;

use async_trait::async_trait;

use crate::error::ScraperError;

/// 1ページ取得の分類結果
#[derive(Debug, Clone)]
pub enum Fetched {
    /// レンダリング済みHTML
    Page(String),
    /// ホームページへリダイレクトされた（= コンテンツなし）
    Redirected,
}

/// ページ取得元（本番はヘッドレスブラウザ）
#[async_trait]
pub trait PageSource: Send + Sync {
    /// ブラウザ初期化
    async fn initialize(&mut self) -> Result<(), ScraperError>;

    /// ページIDに対応するページを取得して分類
    async fn fetch(&self, page_id: u64) -> Result<Fetched, ScraperError>;

    /// リソース解放
    async fn close(&mut self) -> Result<(), ScraperError>;
}

/// 画像CDN（ローカルファイル → ホスト済みURL）
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn publish(&self, local_path: &Path) -> Result<String, ScraperError>;
}

/// CMSコレクションAPI。スラグで既存アイテムを引けることが
/// publish の冪等性（upsert）の前提。
#[async_trait]
pub trait CmsClient: Send + Sync {
    /// スラグ一致するアイテムのIDを返す
    async fn find_by_slug(&self, slug: &str) -> Result<Option<String>, ScraperError>;

    /// アイテム新規作成
    async fn create(&self, payload: &serde_json::Value) -> Result<(), ScraperError>;

    /// 既存アイテム更新
    async fn update(&self, item_id: &str, payload: &serde_json::Value)
        -> Result<(), ScraperError>;
}
