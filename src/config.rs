use crate::error::{DealScoutError, Result};
use deal_scout_common::{SortOrder, ViewMode, FRAME_DELAY};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// コマンド出力の形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output: {}. Use text or json", s)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 公開をまとめる時間窓（ミリ秒）
    pub flush_delay_ms: u64,
    pub view: ViewMode,
    pub sort: SortOrder,
    pub output: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flush_delay_ms: FRAME_DELAY.as_millis() as u64,
            view: ViewMode::List,
            sort: SortOrder::Original,
            output: OutputFormat::Text,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// 指定パスから読み込み（なければデフォルト）
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| DealScoutError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("deal-scout").join("config.json"))
    }

    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_ms)
    }

    pub fn set_flush_delay_ms(&mut self, ms: u64) -> Result<()> {
        if ms == 0 {
            return Err(DealScoutError::Config(
                "flush_delay_ms は1以上を指定してください".into(),
            ));
        }
        self.flush_delay_ms = ms;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.flush_delay(), Duration::from_millis(16));
        assert_eq!(config.view, ViewMode::List);
        assert_eq!(config.sort, SortOrder::Original);
        assert_eq!(config.output, OutputFormat::Text);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"view": "grid"}"#).expect("デシリアライズ失敗");
        assert_eq!(config.view, ViewMode::Grid);
        assert_eq!(config.flush_delay_ms, 16);
    }

    #[test]
    fn test_zero_flush_delay_rejected() {
        let mut config = Config::default();
        assert!(config.set_flush_delay_ms(0).is_err());
        config.set_flush_delay_ms(32).expect("設定失敗");
        assert_eq!(config.flush_delay_ms, 32);
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
