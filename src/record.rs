//! 抽出結果の型定義

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 属性キー（抽出とCMSフィールド名で共用）
pub mod keys {
    // 物件概要テーブル
    pub const PROPERTY_TYPE: &str = "type";
    pub const LOCATION: &str = "location";
    pub const STRUCTURE: &str = "structure";
    pub const FLOORS: &str = "floors";
    pub const PARKING: &str = "parking";
    pub const LAYOUT: &str = "layout";
    pub const ELEVATOR: &str = "elevator";
    pub const COMPLETED: &str = "completed";
    pub const UNITS: &str = "units";

    // 部屋テーブル
    pub const RENT: &str = "rent";
    pub const AREA: &str = "area";
    pub const DEPOSIT: &str = "deposit";
    pub const KEY_MONEY: &str = "key-money";
    pub const UTILITIES: &str = "utilities";
    pub const YEAR_BUILT: &str = "year-built";
    pub const BALCONY: &str = "balcony";
}

/// 1枚の画像。hosted_url はCDNアップロード成功まで None。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAsset {
    pub source_url: String,
    pub local_path: PathBuf,
    pub hosted_url: Option<String>,
}

/// 1物件ページの抽出結果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub page_id: u64,
    pub title: String,
    pub description: String,
    /// 物件概要テーブル由来の属性（レイアウト次第で部分的）
    pub property_attributes: BTreeMap<String, String>,
    /// 部屋テーブル由来の属性（同上）
    pub room_attributes: BTreeMap<String, String>,
    /// 設備リスト（空白区切りトークン）
    pub equipment: Vec<String>,
    pub map_link: Option<String>,
    /// ページ内出現順。CDNアップロード失敗分は最終的に取り除かれる。
    pub images: Vec<ImageAsset>,
}

impl PageRecord {
    pub fn new(page_id: u64) -> Self {
        Self {
            page_id,
            title: String::new(),
            description: String::new(),
            property_attributes: BTreeMap::new(),
            room_attributes: BTreeMap::new(),
            equipment: Vec::new(),
            map_link: None,
            images: Vec::new(),
        }
    }

    /// CMSアイテムのスラグ。ページIDに対して安定（再実行で同じ値）。
    pub fn slug(&self) -> String {
        format!("property-{}", self.page_id)
    }

    /// CDNに載った画像URLのみ、出現順で返す
    pub fn hosted_urls(&self) -> Vec<&str> {
        self.images
            .iter()
            .filter_map(|img| img.hosted_url.as_deref())
            .collect()
    }
}
