//! フィールド抽出
//!
//! fetcherが捕捉したレンダリング済みHTMLから PageRecord を組み立てる。
//! テーブルはヘッダ行のマーカーラベルで分類し、行・列は位置で読む。
//! 位置指定はサイト側のレイアウト契約そのもので、変更時は
//! 下のカラムマップ（データ）だけを直せばよい。

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::config::TitlePolicy;
use crate::error::ScraperError;
use crate::record::{keys, ImageAsset, PageRecord};

/// サイト共通のバナー見出し（タイトルとしては無効）
const SITE_BANNER: &str = "デザイナーズ大阪賃貸";
/// 物件説明文のコンテナ
const DESCRIPTION_SELECTOR: &str = "div.detail_comment";
/// 地図リンクのアンカーテキスト
const MAP_LINK_LABEL: &str = "地図を見る";
/// 設備行の部分一致マーカー
const EQUIPMENT_ROW_MARKER: &str = "設備";

/// UI画像を除外する部分文字列デニリスト
const IMAGE_DENYLIST: &[&str] = &["btn_", "icon_", "logo", "spacer", "blank", "menu"];

/// セルの書き込み先
#[derive(Debug, Clone, Copy)]
enum CellTarget {
    Attr(&'static str),
    /// セル内改行で2属性に分割（例: 構造・階数）
    SplitNewline(&'static str, &'static str),
}

struct RowMap {
    /// 0始まりの行インデックス
    row: usize,
    cells: &'static [CellTarget],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableKind {
    Property,
    Room,
}

struct TableSpec {
    /// ヘッダ行にこのラベルが含まれればこの種別
    marker: &'static str,
    kind: TableKind,
    rows: &'static [RowMap],
}

/// サイトのテーブルレイアウト契約。見出し行（0,2行目）の直下に
/// データ行（1,3行目）が来る交互レイアウト。
const TABLE_LAYOUT: &[TableSpec] = &[
    TableSpec {
        marker: "物件種別",
        kind: TableKind::Property,
        rows: &[
            RowMap {
                row: 1,
                cells: &[
                    CellTarget::Attr(keys::PROPERTY_TYPE),
                    CellTarget::Attr(keys::LOCATION),
                    CellTarget::SplitNewline(keys::STRUCTURE, keys::FLOORS),
                    CellTarget::Attr(keys::PARKING),
                ],
            },
            RowMap {
                row: 3,
                cells: &[
                    CellTarget::Attr(keys::LAYOUT),
                    CellTarget::Attr(keys::ELEVATOR),
                    CellTarget::Attr(keys::COMPLETED),
                    CellTarget::Attr(keys::UNITS),
                ],
            },
        ],
    },
    TableSpec {
        marker: "賃料",
        kind: TableKind::Room,
        rows: &[
            RowMap {
                row: 1,
                cells: &[
                    CellTarget::Attr(keys::RENT),
                    CellTarget::Attr(keys::AREA),
                    CellTarget::Attr(keys::DEPOSIT),
                    CellTarget::Attr(keys::KEY_MONEY),
                ],
            },
            RowMap {
                row: 3,
                cells: &[
                    CellTarget::Attr(keys::UTILITIES),
                    CellTarget::Attr(keys::YEAR_BUILT),
                    CellTarget::Attr(keys::BALCONY),
                ],
            },
        ],
    },
];

/// コンテンツ画像かどうかの統一判定:
/// 絶対http(s) URL かつ ファイル名が数字始まり かつ デニリスト非該当
pub fn is_content_image(src: &str) -> bool {
    if !(src.starts_with("http://") || src.starts_with("https://")) {
        return false;
    }
    let basename = src.rsplit('/').next().unwrap_or("");
    let starts_with_digit = basename
        .chars()
        .next()
        .map(|c| c.is_ascii_digit())
        .unwrap_or(false);
    if !starts_with_digit {
        return false;
    }
    !IMAGE_DENYLIST.iter().any(|deny| basename.contains(deny))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// レンダリング済みHTMLを PageRecord に変換する。
/// タイトルが見つからない場合の挙動は `TitlePolicy` に従う。
pub fn extract(
    page_id: u64,
    html: &str,
    policy: TitlePolicy,
) -> Result<PageRecord, ScraperError> {
    let document = Html::parse_document(html);
    let mut record = PageRecord::new(page_id);

    // タイトル: バナー見出しを除いた最初の非空 h1
    let h1_selector = Selector::parse("h1").unwrap();
    let title = document
        .select(&h1_selector)
        .map(element_text)
        .find(|text| !text.is_empty() && text != SITE_BANNER);

    record.title = match (title, policy) {
        (Some(title), _) => title,
        (None, TitlePolicy::Placeholder) => format!("物件 {}", page_id),
        (None, TitlePolicy::SkipPage) => {
            return Err(ScraperError::Extraction(format!(
                "ページ {} にタイトルがありません",
                page_id
            )));
        }
    };

    // 説明文
    let description_selector = Selector::parse(DESCRIPTION_SELECTOR).unwrap();
    record.description = document
        .select(&description_selector)
        .next()
        .map(element_text)
        .unwrap_or_default();

    extract_tables(&document, &mut record);

    // 地図リンク
    let anchor_selector = Selector::parse("a").unwrap();
    record.map_link = document
        .select(&anchor_selector)
        .find(|a| element_text(*a) == MAP_LINK_LABEL)
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.to_string());

    // 画像候補（出現順）
    let img_selector = Selector::parse("img").unwrap();
    record.images = document
        .select(&img_selector)
        .filter_map(|img| img.value().attr("src"))
        .filter(|src| is_content_image(src))
        .map(|src| ImageAsset {
            source_url: src.to_string(),
            local_path: Default::default(),
            hosted_url: None,
        })
        .collect();

    debug!(
        "Page {} extracted: {} property attrs, {} room attrs, {} images",
        page_id,
        record.property_attributes.len(),
        record.room_attributes.len(),
        record.images.len()
    );

    Ok(record)
}

fn extract_tables(document: &Html, record: &mut PageRecord) {
    let table_selector = Selector::parse("table").unwrap();
    let row_selector = Selector::parse("tr").unwrap();
    let cell_selector = Selector::parse("th, td").unwrap();

    for table in document.select(&table_selector) {
        let rows: Vec<ElementRef<'_>> = table.select(&row_selector).collect();
        let Some(header) = rows.first() else { continue };
        let header_text = element_text(*header);

        if let Some(spec) = TABLE_LAYOUT
            .iter()
            .find(|spec| header_text.contains(spec.marker))
        {
            apply_column_map(spec, &rows, &cell_selector, record);
        }

        // 設備行: 先頭セルの部分一致で特定し、末尾セルを空白分割
        if record.equipment.is_empty() {
            for row in &rows {
                let cells: Vec<String> = row.select(&cell_selector).map(element_text).collect();
                if cells.len() >= 2 && cells[0].contains(EQUIPMENT_ROW_MARKER) {
                    record.equipment = cells[cells.len() - 1]
                        .split_whitespace()
                        .map(|token| token.to_string())
                        .collect();
                    break;
                }
            }
        }
    }
}

fn apply_column_map(
    spec: &TableSpec,
    rows: &[ElementRef<'_>],
    cell_selector: &Selector,
    record: &mut PageRecord,
) {
    let attrs = match spec.kind {
        TableKind::Property => &mut record.property_attributes,
        TableKind::Room => &mut record.room_attributes,
    };

    for row_map in spec.rows {
        let Some(row) = rows.get(row_map.row) else { continue };
        let cells: Vec<String> = row.select(cell_selector).map(element_text).collect();

        // セル数がマップより少ない行は末尾の属性を黙って省略する
        for (cell, target) in cells.iter().zip(row_map.cells.iter()) {
            match target {
                CellTarget::Attr(key) => {
                    if !cell.is_empty() {
                        attrs.insert((*key).to_string(), cell.clone());
                    }
                }
                CellTarget::SplitNewline(first_key, second_key) => {
                    let mut parts = cell.splitn(2, '\n');
                    if let Some(first) = parts.next() {
                        let first = first.trim();
                        if !first.is_empty() {
                            attrs.insert((*first_key).to_string(), first.to_string());
                        }
                    }
                    if let Some(second) = parts.next() {
                        let second = second.trim();
                        if !second.is_empty() {
                            attrs.insert((*second_key).to_string(), second.to_string());
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_predicate() {
        assert!(is_content_image("https://example.com/img/12345_photo.jpg"));
        assert!(is_content_image("http://example.com/1.jpg"));

        // UI画像は除外
        assert!(!is_content_image("https://example.com/img/btn_close.png"));
        assert!(!is_content_image("https://example.com/img/logo.png"));
        assert!(!is_content_image("https://example.com/img/12_menu_open.png"));

        // 相対URLは除外
        assert!(!is_content_image("/img/1.jpg"));
        // 数字始まりでないファイル名は除外
        assert!(!is_content_image("https://example.com/img/photo.jpg"));
    }

    #[test]
    fn test_property_table_positional_parse() {
        let html = r#"
            <html><body>
            <h1>グランドメゾン南堀江</h1>
            <table>
              <tr><th>物件種別</th><th>所在地</th><th>構造・階数</th><th>駐車場</th></tr>
              <tr><td>Apartment</td><td>Osaka</td><td>RC
3F</td><td>Available</td></tr>
            </table>
            </body></html>
        "#;

        let record = extract(1, html, TitlePolicy::SkipPage).unwrap();
        assert_eq!(record.property_attributes["type"], "Apartment");
        assert_eq!(record.property_attributes["location"], "Osaka");
        assert_eq!(record.property_attributes["structure"], "RC");
        assert_eq!(record.property_attributes["floors"], "3F");
        assert_eq!(record.property_attributes["parking"], "Available");
    }

    #[test]
    fn test_short_row_omits_tail_attributes() {
        let html = r#"
            <html><body>
            <h1>テスト物件</h1>
            <table>
              <tr><th>物件種別</th></tr>
              <tr><td>マンション</td><td>大阪市西区</td></tr>
            </table>
            </body></html>
        "#;

        let record = extract(2, html, TitlePolicy::SkipPage).unwrap();
        assert_eq!(record.property_attributes["type"], "マンション");
        assert_eq!(record.property_attributes["location"], "大阪市西区");
        assert!(!record.property_attributes.contains_key("structure"));
        assert!(!record.property_attributes.contains_key("parking"));
    }

    #[test]
    fn test_room_table_and_equipment() {
        let html = r#"
            <html><body>
            <h1>テスト物件</h1>
            <table>
              <tr><th>賃料</th><th>専有面積</th><th>敷金</th><th>礼金</th></tr>
              <tr><td>85,000円</td><td>40.5m²</td><td>1ヶ月</td><td>なし</td></tr>
              <tr><th>共益費</th><th>築年</th><th>バルコニー</th></tr>
              <tr><td>5,000円</td><td>2015年</td><td>南向き</td></tr>
              <tr><th>設備・条件</th><td>エアコン オートロック 宅配ボックス</td></tr>
            </table>
            </body></html>
        "#;

        let record = extract(3, html, TitlePolicy::SkipPage).unwrap();
        assert_eq!(record.room_attributes["rent"], "85,000円");
        assert_eq!(record.room_attributes["area"], "40.5m²");
        assert_eq!(record.room_attributes["deposit"], "1ヶ月");
        assert_eq!(record.room_attributes["key-money"], "なし");
        assert_eq!(record.room_attributes["utilities"], "5,000円");
        assert_eq!(record.room_attributes["year-built"], "2015年");
        assert_eq!(record.room_attributes["balcony"], "南向き");
        assert_eq!(
            record.equipment,
            vec!["エアコン", "オートロック", "宅配ボックス"]
        );
    }

    #[test]
    fn test_banner_heading_is_not_a_title() {
        let html = format!(
            "<html><body><h1>{}</h1><h1>本当のタイトル</h1></body></html>",
            SITE_BANNER
        );
        let record = extract(4, &html, TitlePolicy::SkipPage).unwrap();
        assert_eq!(record.title, "本当のタイトル");
    }

    #[test]
    fn test_missing_title_policies() {
        let html = format!("<html><body><h1>{}</h1></body></html>", SITE_BANNER);

        let skipped = extract(5, &html, TitlePolicy::SkipPage);
        assert!(skipped.is_err());

        let placeholder = extract(5, &html, TitlePolicy::Placeholder).unwrap();
        assert_eq!(placeholder.title, "物件 5");
    }

    #[test]
    fn test_map_link_and_images_in_source_order() {
        let html = r#"
            <html><body>
            <h1>テスト物件</h1>
            <a href="/about">会社概要</a>
            <a href="https://maps.example.com/?q=osaka">地図を見る</a>
            <img src="https://example.com/photos/201_main.jpg">
            <img src="https://example.com/ui/logo.png">
            <img src="https://example.com/photos/202_kitchen.jpg">
            </body></html>
        "#;

        let record = extract(6, html, TitlePolicy::SkipPage).unwrap();
        assert_eq!(
            record.map_link.as_deref(),
            Some("https://maps.example.com/?q=osaka")
        );
        let sources: Vec<&str> = record.images.iter().map(|i| i.source_url.as_str()).collect();
        assert_eq!(
            sources,
            vec![
                "https://example.com/photos/201_main.jpg",
                "https://example.com/photos/202_kitchen.jpg"
            ]
        );
    }

    #[test]
    fn test_description_absent_is_empty() {
        let html = "<html><body><h1>タイトル</h1></body></html>";
        let record = extract(7, html, TitlePolicy::SkipPage).unwrap();
        assert_eq!(record.description, "");
    }
}
