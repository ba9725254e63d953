use crate::config::OutputFormat;
use clap::{Parser, Subcommand};
use deal_scout_common::{SortOrder, ViewMode};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "deal-scout")]
#[command(about = "ディール一覧の閲覧・インタラクション分類ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 出力形式 (text/json)。省略時は設定値
    #[arg(long, global = true)]
    pub output: Option<OutputFormat>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// スナップショットのディールを絞り込んで表示
    List {
        /// スナップショットJSONファイル
        #[arg(required = true)]
        input: PathBuf,

        /// 検索語（タイトル・説明・価格）
        #[arg(short, long, default_value = "")]
        query: String,

        /// カテゴリで絞り込み（複数指定可）
        #[arg(short, long)]
        category: Vec<String>,

        /// 表示モード (list/grid)
        #[arg(long)]
        view: Option<ViewMode>,

        /// 並び順 (original/newest/price-asc/price-desc/title)
        #[arg(short, long)]
        sort: Option<SortOrder>,
    },

    /// スナップショットのカテゴリ一覧
    Categories {
        /// スナップショットJSONファイル
        #[arg(required = true)]
        input: PathBuf,
    },

    /// インタラクションスクリプトを分類器で再生
    Replay {
        /// スナップショットJSONファイル
        #[arg(required = true)]
        input: PathBuf,

        /// スクリプトJSONファイル
        #[arg(required = true)]
        script: PathBuf,

        /// 公開をまとめる時間窓（ミリ秒）
        #[arg(long)]
        flush_ms: Option<u64>,
    },

    /// 対話的にディールを操作して分類を確認
    Session {
        /// スナップショットJSONファイル
        #[arg(required = true)]
        input: PathBuf,
    },

    /// 設定を表示/編集
    Config {
        /// 設定を表示
        #[arg(long)]
        show: bool,

        /// 公開の時間窓（ミリ秒）を設定
        #[arg(long)]
        set_flush_ms: Option<u64>,

        /// 表示モードを設定
        #[arg(long)]
        set_view: Option<ViewMode>,

        /// 並び順を設定
        #[arg(long)]
        set_sort: Option<SortOrder>,

        /// 出力形式を設定
        #[arg(long)]
        set_output: Option<OutputFormat>,
    },
}
