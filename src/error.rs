use thiserror::Error;

#[derive(Error, Debug)]
pub enum DealScoutError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("スナップショットファイルが見つかりません: {0}")]
    SnapshotNotFound(String),

    #[error("スナップショットが不正: {0}")]
    InvalidSnapshot(String),

    #[error("スクリプトが不正: {0}")]
    InvalidScript(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("入力エラー: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error(transparent)]
    Common(#[from] deal_scout_common::Error),
}

pub type Result<T> = std::result::Result<T, DealScoutError>;
