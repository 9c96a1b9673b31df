//! データベースの起動待機モジュール
//!
//! コンテナのログに起動完了の文字列が現れるまで一定間隔でポーリングします。
//! バックオフや途中キャンセルはなく、待機時間の上限だけを持ちます。

use crate::error::{ContainerError, Result};
use crate::runtime::ContainerRuntime;
use std::time::Duration;
use tokio::time::sleep;

/// MySQL が接続を受け付け始めたときにログへ出る文字列
pub const READY_SENTINEL: &str = "ready for connections";

/// 待機設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessConfig {
    /// 待機時間の上限
    pub timeout: Duration,
    /// ログを確認する間隔
    pub poll_interval: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// データベースコンテナの起動完了を待機
///
/// # Returns
/// * `Ok(())` - ログに READY_SENTINEL が現れた
/// * `Err(ContainerError::ReadinessTimeout)` - 上限時間内に現れなかった
pub async fn wait_until_ready<R: ContainerRuntime>(
    runtime: &R,
    container: &str,
    config: &ReadinessConfig,
) -> Result<()> {
    let step = config.poll_interval.max(Duration::from_millis(1));
    let mut remaining = config.timeout;

    while !remaining.is_zero() {
        match runtime.logs(container).await {
            Ok(output) => {
                // MySQL のログは stderr に出る
                if contains_sentinel(&output.stderr) || contains_sentinel(&output.stdout) {
                    tracing::info!(container, "Database is ready for connections");
                    return Ok(());
                }
            }
            Err(e @ ContainerError::RuntimeNotFound(_)) => return Err(e),
            Err(e) => {
                // コンテナがまだ作成されていない場合など
                tracing::debug!(container, "Failed to fetch logs: {}", e);
            }
        }

        sleep(step).await;
        remaining = remaining.saturating_sub(step);
    }

    Err(ContainerError::ReadinessTimeout {
        container: container.to_string(),
        timeout_secs: config.timeout.as_secs(),
    })
}

fn contains_sentinel(bytes: &[u8]) -> bool {
    String::from_utf8_lossy(bytes).contains(READY_SENTINEL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ExecStdout, OneOffOptions, ProcessOutput};
    use std::cell::Cell;
    use tokio::time::Instant;

    /// 指定回数目のログ取得で起動完了を返すランタイム
    struct LogSource {
        ready_on_call: Option<usize>,
        calls: Cell<usize>,
    }

    impl LogSource {
        fn ready_on(call: usize) -> Self {
            Self {
                ready_on_call: Some(call),
                calls: Cell::new(0),
            }
        }

        fn never() -> Self {
            Self {
                ready_on_call: None,
                calls: Cell::new(0),
            }
        }
    }

    impl ContainerRuntime for LogSource {
        async fn bring_down(&self) -> Result<ProcessOutput> {
            unreachable!()
        }

        async fn bring_up(&self) -> Result<ProcessOutput> {
            unreachable!()
        }

        async fn run_one_off(
            &self,
            _service: &str,
            _command: &[&str],
            _options: &OneOffOptions,
        ) -> Result<ProcessOutput> {
            unreachable!()
        }

        async fn exec_in_service(
            &self,
            _container: &str,
            _shell_command: &str,
            _stdin: Option<&[u8]>,
            _stdout: ExecStdout,
        ) -> Result<ProcessOutput> {
            unreachable!()
        }

        async fn logs(&self, _container: &str) -> Result<ProcessOutput> {
            let call = self.calls.get() + 1;
            self.calls.set(call);

            let mut stderr = b"[Note] InnoDB: Started; log sequence number 0\n".to_vec();
            if self.ready_on_call.is_some_and(|n| call >= n) {
                stderr.extend_from_slice(b"[Note] mysqld: ready for connections.\n");
            }

            Ok(ProcessOutput {
                code: Some(0),
                stdout: Vec::new(),
                stderr,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_within_timeout() {
        let source = LogSource::ready_on(5);
        let config = ReadinessConfig::default();

        let start = Instant::now();
        wait_until_ready(&source, "app_mysql_1", &config).await.unwrap();

        assert_eq!(source.calls.get(), 5);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(4) && elapsed < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_immediately() {
        let source = LogSource::ready_on(1);
        wait_until_ready(&source, "app_mysql_1", &ReadinessConfig::default())
            .await
            .unwrap();
        assert_eq!(source.calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let source = LogSource::never();
        let config = ReadinessConfig {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
        };

        let start = Instant::now();
        let err = wait_until_ready(&source, "app_mysql_1", &config)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ContainerError::ReadinessTimeout { timeout_secs: 10, .. }
        ));
        assert_eq!(source.calls.get(), 10);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_fails_without_polling() {
        let source = LogSource::ready_on(1);
        let config = ReadinessConfig {
            timeout: Duration::ZERO,
            poll_interval: Duration::from_secs(1),
        };

        let result = wait_until_ready(&source, "app_mysql_1", &config).await;
        assert!(result.is_err());
        assert_eq!(source.calls.get(), 0);
    }
}
