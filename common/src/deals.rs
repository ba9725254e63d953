//! 商品（ディール）データ型
//!
//! バックエンドのキャッシュ済みエンドポイントが返す形式:
//! - Deal: 1件のディール（snake_case / camelCase どちらのキーも受け付ける）
//! - DealSnapshot: カテゴリ名 → ディール一覧

use crate::error::{Error, Result};
use crate::identity::{Identify, ItemKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// リンクから導出するキーの長さ（16進文字数）
const LINK_KEY_LEN: usize = 16;

/// ディール
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Deal {
    #[serde(alias = "article_id", alias = "articleId", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub link: String,
    pub title: String,
    pub price: String,
    #[serde(alias = "shipping_price")]
    pub shipping_price: String,
    pub description: String,
    pub image: String,
    /// バックエンドが付けたカテゴリ名
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// 作成日時（RFC 3339）
    #[serde(alias = "created_at", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Identify for Deal {
    /// 明示的な `id` を優先し、なければリンクのハッシュから安定キーを作る
    fn item_key(&self) -> Option<ItemKey> {
        if let Some(id) = self.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return Some(ItemKey::from(id));
        }
        let link = self.link.trim();
        if link.is_empty() {
            return None;
        }
        let digest = hex::encode(Sha256::digest(link.as_bytes()));
        Some(ItemKey::Str(format!("link-{}", &digest[..LINK_KEY_LEN])))
    }
}

/// カテゴリ分け済みディールのスナップショット
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DealSnapshot {
    pub categorized_articles: BTreeMap<String, Vec<Deal>>,
    pub articles: Vec<Deal>,
    pub from_cache: bool,
    pub from_pepper: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DealSnapshot {
    /// JSON文字列から読み込み
    ///
    /// バックエンドがエラーを返しディールが1件もない場合はエラーにする。
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        if let Some(message) = &snapshot.error {
            if snapshot.is_empty() {
                return Err(Error::Snapshot(message.clone()));
            }
        }
        Ok(snapshot)
    }

    /// JSONファイルから読み込み（非WASM環境のみ）
    #[cfg(not(feature = "wasm"))]
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty() && self.categorized_articles.values().all(Vec::is_empty)
    }

    /// カテゴリ名 → ディール
    ///
    /// カテゴリ分けがない場合は `articles` を各ディールの `category`
    /// （なければ "inne"）でまとめ直す。
    pub fn sections(&self) -> BTreeMap<String, Vec<Deal>> {
        if !self.categorized_articles.is_empty() {
            return self.categorized_articles.clone();
        }
        let mut sections: BTreeMap<String, Vec<Deal>> = BTreeMap::new();
        for deal in &self.articles {
            let category = deal.category.clone().unwrap_or_else(|| "inne".to_string());
            sections.entry(category).or_default().push(deal.clone());
        }
        sections
    }

    /// 全ディールをカテゴリ名順に平坦化（`category` を埋める）
    pub fn deals(&self) -> Vec<Deal> {
        self.sections()
            .into_iter()
            .flat_map(|(category, deals)| {
                deals.into_iter().map(move |mut deal| {
                    deal.category.get_or_insert_with(|| category.clone());
                    deal
                })
            })
            .collect()
    }

    /// データの取得元ラベル
    pub fn source_label(&self) -> &'static str {
        if self.from_cache {
            "Załadowano z Cache"
        } else {
            "Dane z Pepper.pl"
        }
    }
}
