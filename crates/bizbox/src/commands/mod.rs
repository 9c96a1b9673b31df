pub mod backup;
pub mod migrate;
pub mod recover;
pub mod start;
pub mod status;
pub mod stop;

use crate::progress::Spinner;
use bizbox_container::{ComposeCli, MysqlTransfer};
use bizbox_core::StackHandle;
use bizbox_stack::StackEvent;
use colored::Colorize;
use std::path::Path;

/// コマンド実行の対象となるデプロイメント
pub struct Deployment {
    pub handle: StackHandle,
    pub runtime: ComposeCli,
}

impl Deployment {
    pub fn discover(base_dir: Option<&Path>) -> anyhow::Result<Self> {
        let base_dir = bizbox_core::find_base_dir(base_dir)?;
        let handle = StackHandle::new(base_dir)?;
        let runtime = ComposeCli::from_env(&handle);
        Ok(Self { handle, runtime })
    }

    pub fn transfer(&self) -> MysqlTransfer<'_, ComposeCli> {
        MysqlTransfer::new(&self.runtime, self.handle.db_container())
    }
}

/// 進捗イベントをスピナーと標準出力に反映
pub fn render_event(spinner: &Spinner, event: &StackEvent) {
    match event {
        StackEvent::StateChanged(state) => {
            tracing::debug!(%state, "State changed");
        }
        StackEvent::Patched(report) => {
            if report.connection.applied() {
                spinner.println("✓ 接続設定をコンテナ向けに書き換えました".green());
            }
            if report.server_config.applied() {
                spinner.println("✓ MySQL 設定ファイルを生成しました".green());
            }
        }
        StackEvent::PermissionRepairFailed(reason) => {
            spinner.println(format!("⚠ データディレクトリの権限修正に失敗しました: {}", reason).yellow());
        }
        StackEvent::WaitingForDatabase => {
            spinner.println("ℹ データディレクトリが空のため、データベースを初期化します".cyan());
            spinner.set_message("MySQL の起動を待機中...");
        }
        StackEvent::DatabaseReady => {
            spinner.println("✓ MySQL が起動しました".green());
        }
        StackEvent::Settling(wait) => {
            spinner.set_message(format!("root パスワードの反映を待機中（{}秒）...", wait.as_secs()));
        }
        StackEvent::Importing(path) => {
            spinner.set_message(format!("{} を取り込み中...", path.display()));
        }
        StackEvent::DefaultSchemaImported => {
            spinner.println("✓ 既定スキーマを取り込みました".green());
            spinner.set_message("スタックを再起動中...");
        }
        StackEvent::Dumping(path) => {
            spinner.set_message(format!("{} へダンプ中...", path.display()));
        }
        StackEvent::Compressing(path) => {
            spinner.set_message(format!("{} を作成中...", path.display()));
        }
        StackEvent::Extracting(path) => {
            spinner.set_message(format!("{} を展開中...", path.display()));
        }
        StackEvent::StageStarted { source, target } => {
            spinner.set_message(format!("{} → {} をコピー中...", source, target));
        }
        StackEvent::StageFinished(stage) => {
            if stage.outcome.is_completed() {
                spinner.println(format!("✓ {} → {}", stage.source, stage.target).green());
            } else {
                spinner.println(
                    format!("✗ {} → {}: {}", stage.source, stage.target, stage.outcome).red(),
                );
            }
        }
    }
}
