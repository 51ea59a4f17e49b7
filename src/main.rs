use chintai_scraper::{Crawler, CrawlerConfig};

#[tokio::main]
async fn main() {
    // ログ設定
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,chintai_scraper=debug")),
        )
        .init();

    // 必須クレデンシャル欠落は即終了
    let config = match CrawlerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    };

    let mut crawler = match Crawler::new(config) {
        Ok(crawler) => crawler,
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    };

    match crawler.run().await {
        Ok(summary) => {
            println!("=== クロール結果 ===");
            println!("登録: {}件", summary.published);
            println!("スキップ: {}件", summary.skipped);
            println!("登録失敗: {}件", summary.publish_failures);
            println!("最終ページ: {}", summary.last_page);
        }
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    }
}
