//! バッチ更新スケジューラ
//!
//! 短い時間窓（約1フレーム）に届いたカテゴリ変更を1回の公開にまとめる。
//! 同じキーへの変更は窓内で後勝ち。タイマーそのものは持たず、期限だけを管理する
//! ので、シングルスレッドのイベントループでもスレッド＋チャネル構成でも使える。

use crate::category::Category;
use crate::identity::ItemKey;
use std::collections::HashMap;
use std::time::Duration;

/// 1フレーム相当の遅延（1000ms / 60）
pub const FRAME_DELAY: Duration = Duration::from_millis(16);

/// 公開待ちの変更バッファと期限
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    delay: Duration,
    pending: HashMap<ItemKey, Category>,
    deadline: Option<Duration>,
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new(FRAME_DELAY)
    }
}

impl BatchScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 変更をバッファに積み、未予約ならフラッシュを予約する
    ///
    /// このバッファ追加で新たに予約した場合のみ期限を返す。
    pub fn enqueue(&mut self, key: ItemKey, category: Category, now: Duration) -> Option<Duration> {
        self.pending.insert(key, category);
        self.schedule(now)
    }

    /// フラッシュを予約する。予約済みなら何もしない
    pub fn schedule(&mut self, now: Duration) -> Option<Duration> {
        if self.deadline.is_some() {
            return None;
        }
        let deadline = now + self.delay;
        self.deadline = Some(deadline);
        Some(deadline)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn is_scheduled(&self) -> bool {
        self.deadline.is_some()
    }

    /// 予約済みで期限を過ぎている
    pub fn is_due(&self, now: Duration) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    pub fn pending(&self) -> &HashMap<ItemKey, Category> {
        &self.pending
    }

    /// 破棄されたキーの保留中変更を捨てる
    pub fn forget(&mut self, key: &ItemKey) {
        self.pending.remove(key);
    }

    /// 即時フラッシュ
    ///
    /// バッファを取り出して予約を解除する。空なら `None`（公開しない）。
    pub fn flush_now(&mut self) -> Option<HashMap<ItemKey, Category>> {
        self.deadline = None;
        if self.pending.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.pending))
    }

    /// 予約を取り消し、バッファを適用せずに破棄する
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.pending.clear();
    }
}
