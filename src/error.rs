use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("抽出エラー: {0}")]
    Extraction(String),

    #[error("HTTP通信エラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("画像ダウンロードエラー: {0}")]
    Download(String),

    #[error("CDNアップロードエラー: {0}")]
    Upload(String),

    #[error("CMS登録エラー: status={status}, body={body}")]
    Publish { status: u16, body: String },

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("タイムアウト: {0}")]
    Timeout(String),
}

impl ScraperError {
    /// リトライで回復しうるエラーか
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Download(_) | Self::Upload(_) | Self::Timeout(_) => true,
            Self::Publish { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_retryable_classification() {
        let server_err = ScraperError::Publish {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert!(server_err.is_retryable());

        let rate_limited = ScraperError::Publish {
            status: 429,
            body: "too many requests".to_string(),
        };
        assert!(rate_limited.is_retryable());

        let validation = ScraperError::Publish {
            status: 400,
            body: "ValidationError".to_string(),
        };
        assert!(!validation.is_retryable());
    }

    #[test]
    fn test_fatal_errors_not_retryable() {
        assert!(!ScraperError::Config("WEBFLOW_API_TOKEN".into()).is_retryable());
        assert!(!ScraperError::BrowserInit("launch failed".into()).is_retryable());
        assert!(ScraperError::Upload("cdn down".into()).is_retryable());
    }
}
