//! 時計の抽象化
//!
//! スケジューラはホストが与える単調時刻（起点からの経過時間）で動く。
//! 実時間の実装はホスト側（tokio / performance.now）が持つ。

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

/// 単調時刻の供給元
pub trait Clock {
    /// 起点からの経過時間
    fn now(&self) -> Duration;
}

/// 手動で進める時計（テスト・リプレイ用）
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// 指定時刻へ進める（巻き戻しはしない）
    pub fn set(&self, to: Duration) {
        if to > self.now.get() {
            self.now.set(to);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let view = clock.clone();
        clock.advance(Duration::from_millis(16));
        assert_eq!(view.now(), Duration::from_millis(16));
    }

    #[test]
    fn test_manual_clock_never_rewinds() {
        let clock = ManualClock::new();
        clock.set(Duration::from_millis(50));
        clock.set(Duration::from_millis(10));
        assert_eq!(clock.now(), Duration::from_millis(50));
    }
}
