//! チェックポイントストア
//!
//! 最後に完了したページIDを10進整数1つだけのテキストファイルに保持する。
//! 単一プロセス・単一ライターを前提とし、ロックは行わない。

use std::path::PathBuf;

use tracing::{info, warn};

use crate::error::ScraperError;

pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 記録済みページIDを読む。ファイルが無い・数値でない場合は None。
    pub fn read(&self) -> Option<u64> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return None,
        };

        match content.trim().parse::<u64>() {
            Ok(page_id) => Some(page_id),
            Err(_) => {
                warn!(
                    "チェックポイントファイルの内容が不正です: {:?}",
                    self.path
                );
                None
            }
        }
    }

    /// ページIDを上書き保存する（追記ではない）。
    pub fn write(&self, page_id: u64) -> Result<(), ScraperError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, page_id.to_string())?;
        info!("チェックポイント更新: page={}", page_id);
        Ok(())
    }
}
