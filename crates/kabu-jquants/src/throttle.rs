//! API 呼び出し間隔の制御。
//!
//! J-Quants API はプランごとに呼び出しレート上限があるため、全リクエストを
//! 単一のスロットルに通して最小間隔を保証します。

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// 最小呼び出し間隔を保証するスロットル。
///
/// 最後の通過時刻をスロットル自身が所有します。`Arc` で複数の取得タスクに
/// 共有しても、待機中はロックを保持するため同時に呼んだタスクは順番に
/// 間隔を空けて通過します。
pub struct Throttle {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Throttle {
    /// 最小間隔を指定してスロットルを生成。
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// 前回の通過から最小間隔が経過するまで待機し、通過時刻を記録。
    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }

    /// 設定された最小間隔。
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_calls_are_spaced() {
        let throttle = Throttle::new(Duration::from_millis(100));

        let start = Instant::now();
        throttle.wait().await;
        throttle.wait().await;
        throttle.wait().await;

        // 1 回目は即時、2 回目以降は 100ms ずつ空く
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_passes_immediately() {
        let throttle = Throttle::new(Duration::ZERO);

        let start = Instant::now();
        throttle.wait().await;
        throttle.wait().await;

        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_interval_already_elapsed() {
        let throttle = Throttle::new(Duration::from_millis(50));

        throttle.wait().await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        let start = Instant::now();
        throttle.wait().await;
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_throttle_serializes_tasks() {
        let throttle = Arc::new(Throttle::new(Duration::from_millis(100)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let throttle = Arc::clone(&throttle);
            handles.push(tokio::spawn(async move {
                throttle.wait().await;
                start.elapsed()
            }));
        }

        let mut elapsed: Vec<Duration> = Vec::new();
        for handle in handles {
            elapsed.push(handle.await.unwrap());
        }
        elapsed.sort();

        // 3 タスクの通過時刻は 100ms 以上ずつ離れる
        assert!(elapsed[1] - elapsed[0] >= Duration::from_millis(100));
        assert!(elapsed[2] - elapsed[1] >= Duration::from_millis(100));
    }
}
