//! スタックのライフサイクル管理
//!
//! 起動（初回のみデータベース初期化を含む）、停止、バックアップ、
//! リストア、本番系→テスト系コピーを順序付きのステップとして実行します。
//!
//! 状態遷移:
//! ```text
//! Down → Starting → AwaitingFirstInit → Initializing → Up
//!                 ↘ (初期化済み) ─────────────────────↗
//! ```

use crate::archive::{self, BackupNames};
use crate::databases::{BACKUP_DATABASES, MIGRATION_STAGES};
use crate::error::{Result, StackError};
use crate::migration::{MigrationReport, StageOutcome, StageReport};
use bizbox_container::{
    ContainerError, ContainerRuntime, DatabaseTransfer, OneOffOptions, ProcessOutput,
    ReadinessConfig, SqlSource, wait_until_ready,
};
use bizbox_core::{CONTAINER_DATA_DIR, DB_SERVICE, PatchReport, StackHandle, data_dir_initialized};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// データディレクトリの所有者
const DATA_DIR_OWNER: &str = "mysql:mysql";

/// 待機時間の設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub readiness: ReadinessConfig,
    /// 起動完了後、root パスワードが使えるようになるまでの待ち時間
    pub credential_settle: Duration,
    /// 既定スキーマ取り込み後、停止するまでの待ち時間
    pub post_import_pause: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            readiness: ReadinessConfig::default(),
            credential_settle: Duration::from_secs(10),
            post_import_pause: Duration::from_secs(5),
        }
    }
}

/// スタックの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackState {
    Down,
    Starting,
    AwaitingFirstInit,
    Initializing,
    Up,
}

impl fmt::Display for StackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StackState::Down => "停止",
            StackState::Starting => "起動準備中",
            StackState::AwaitingFirstInit => "初期化待ち",
            StackState::Initializing => "初期化中",
            StackState::Up => "稼働中",
        };
        write!(f, "{}", label)
    }
}

/// 進捗通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackEvent {
    StateChanged(StackState),
    Patched(PatchReport),
    /// 権限修正の失敗（起動は続行する）
    PermissionRepairFailed(String),
    WaitingForDatabase,
    DatabaseReady,
    Settling(Duration),
    Importing(PathBuf),
    DefaultSchemaImported,
    Dumping(PathBuf),
    Compressing(PathBuf),
    Extracting(PathBuf),
    StageStarted { source: String, target: String },
    StageFinished(StageReport),
}

type Reporter<'a> = Box<dyn Fn(&StackEvent) + 'a>;

/// スタックオーケストレーター
pub struct StackOrchestrator<'a, R, T> {
    handle: &'a StackHandle,
    runtime: &'a R,
    transfer: &'a T,
    timings: Timings,
    scratch_dir: Option<PathBuf>,
    reporter: Option<Reporter<'a>>,
    state: StackState,
}

impl<'a, R: ContainerRuntime, T: DatabaseTransfer> StackOrchestrator<'a, R, T> {
    pub fn new(handle: &'a StackHandle, runtime: &'a R, transfer: &'a T) -> Self {
        Self {
            handle,
            runtime,
            transfer,
            timings: Timings::default(),
            scratch_dir: None,
            reporter: None,
            state: StackState::Down,
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    /// 一時ファイルを作る場所（未指定ならシステムの一時ディレクトリ）
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn with_reporter(mut self, reporter: impl Fn(&StackEvent) + 'a) -> Self {
        self.reporter = Some(Box::new(reporter));
        self
    }

    pub fn state(&self) -> StackState {
        self.state
    }

    fn emit(&self, event: StackEvent) {
        if let Some(reporter) = &self.reporter {
            reporter(&event);
        }
    }

    fn transition(&mut self, state: StackState) {
        tracing::debug!(from = ?self.state, to = ?state, "State transition");
        self.state = state;
        self.emit(StackEvent::StateChanged(state));
    }

    /// スタックを起動
    ///
    /// データディレクトリが未初期化なら、一度起動して既定スキーマを取り込み、
    /// 停止してから改めて起動します。失敗した場合の状態は失敗したステップのままです。
    #[tracing::instrument(skip(self), fields(project = %self.handle.project_name()))]
    pub async fn start(&mut self) -> Result<()> {
        self.transition(StackState::Starting);

        let env = self.handle.load_env()?;
        let data_dir = self.handle.data_dir(&env)?;

        let patches = bizbox_core::apply_all(self.handle)?;
        tracing::info!(?patches, "Configuration patched");
        self.emit(StackEvent::Patched(patches));

        // 権限修正の前に止めておく
        if let Err(e) = self.runtime.bring_down().await?.check("docker-compose down") {
            tracing::warn!("Failed to stop stack before start: {}", e);
        }
        self.repair_permissions(&data_dir).await?;

        if data_dir_initialized(&data_dir)? {
            tracing::info!(data_dir = %data_dir.display(), "Data directory already initialized");
        } else {
            self.transition(StackState::AwaitingFirstInit);
            self.transition(StackState::Initializing);
            self.initialize().await?;
        }

        self.runtime.bring_up().await?.check("docker-compose up")?;
        self.transition(StackState::Up);
        Ok(())
    }

    /// データディレクトリの所有者を単発コンテナで修正（失敗しても続行）
    async fn repair_permissions(&self, data_dir: &Path) -> Result<()> {
        let mount_point = CONTAINER_DATA_DIR.trim_end_matches('/');
        let options = OneOffOptions {
            volumes: vec![format!("{}:{}", data_dir.display(), mount_point)],
            user: Some("root".to_string()),
            entrypoint: Some("chown".to_string()),
        };

        let result = self
            .runtime
            .run_one_off(DB_SERVICE, &["-R", DATA_DIR_OWNER, mount_point], &options)
            .await
            .and_then(|output| output.check("chown"));

        match result {
            Ok(_) => tracing::debug!("Data directory ownership repaired"),
            Err(e @ ContainerError::RuntimeNotFound(_)) => return Err(e.into()),
            Err(e) => {
                tracing::warn!("Permission repair failed: {}", e);
                self.emit(StackEvent::PermissionRepairFailed(e.to_string()));
            }
        }
        Ok(())
    }

    /// 初回起動時のデータベース初期化
    async fn initialize(&self) -> Result<()> {
        let schema = self.handle.default_schema();
        if !schema.is_file() {
            return Err(StackError::Io {
                path: schema,
                message: "既定スキーマが見つかりません".to_string(),
            });
        }

        self.runtime.bring_up().await?.check("docker-compose up")?;

        self.emit(StackEvent::WaitingForDatabase);
        wait_until_ready(
            self.runtime,
            self.handle.db_container(),
            &self.timings.readiness,
        )
        .await?;
        self.emit(StackEvent::DatabaseReady);

        self.emit(StackEvent::Settling(self.timings.credential_settle));
        sleep(self.timings.credential_settle).await;

        self.emit(StackEvent::Importing(schema.clone()));
        self.transfer
            .import(SqlSource::Path(&schema), "")
            .await?
            .check("mysql")?;
        self.emit(StackEvent::DefaultSchemaImported);
        tracing::info!("Default schema imported");

        sleep(self.timings.post_import_pause).await;
        self.runtime
            .bring_down()
            .await?
            .check("docker-compose down")?;
        Ok(())
    }

    /// スタックを停止
    #[tracing::instrument(skip(self), fields(project = %self.handle.project_name()))]
    pub async fn stop(&mut self) -> Result<()> {
        self.runtime
            .bring_down()
            .await?
            .check("docker-compose down")?;
        self.transition(StackState::Down);
        Ok(())
    }

    /// バックアップを作成し、アーカイブのパスを返す
    ///
    /// 途中で失敗した場合、ダンプファイルも作りかけのアーカイブも残しません。
    #[tracing::instrument(skip(self), fields(output_dir = %output_dir.display()))]
    pub async fn backup(&self, output_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(output_dir).map_err(|e| StackError::io_at(output_dir, e))?;
        let names = BackupNames::at(output_dir, &chrono::Local::now());
        self.write_backup(&names).await?;
        Ok(names.archive_path)
    }

    /// 同じ名前のバックアップが既にあれば上書きせずにエラー
    async fn write_backup(&self, names: &BackupNames) -> Result<()> {
        if names.archive_path.exists() {
            return Err(StackError::Io {
                path: names.archive_path.clone(),
                message: "同じ名前のバックアップが既に存在します".to_string(),
            });
        }
        let file = File::create_new(&names.sql_path)
            .map_err(|e| StackError::io_at(&names.sql_path, e))?;
        let _raw = RemoveOnDrop::new(&names.sql_path);

        self.emit(StackEvent::Dumping(names.sql_path.clone()));
        self.transfer
            .dump(file, &BACKUP_DATABASES, false)
            .await?
            .check("mysqldump")?;

        self.emit(StackEvent::Compressing(names.archive_path.clone()));
        let mut partial = RemoveOnDrop::new(&names.archive_path);
        archive::compress_sql(&names.sql_path, &names.archive_path)?;
        partial.disarm();

        tracing::info!(archive = %names.archive_path.display(), "Backup created");
        Ok(())
    }

    /// バックアップアーカイブからリストア
    ///
    /// 取り出した SQL は一時ディレクトリに置き、成否にかかわらず削除します。
    #[tracing::instrument(skip(self), fields(archive = %archive_path.display()))]
    pub async fn recover(&self, archive_path: &Path) -> Result<()> {
        if !archive_path.is_file() {
            return Err(StackError::archive(archive_path, "ファイルが見つかりません"));
        }
        let entry = archive::entry_name_for(archive_path)?;

        let scratch = self.scratch()?;
        self.emit(StackEvent::Extracting(archive_path.to_path_buf()));
        let sql_path = archive::extract_sql(archive_path, &entry, scratch.path())?;

        self.emit(StackEvent::Importing(sql_path.clone()));
        self.transfer
            .import(SqlSource::Path(&sql_path), "")
            .await?
            .check("mysql")?;

        tracing::info!("Backup restored");
        Ok(())
    }

    /// 本番系データベースをテスト系へコピー
    ///
    /// 各段階は独立して実行され、失敗は MigrationReport に記録されます。
    /// コンテナランタイムが見つからない場合のみ即座にエラーを返します。
    #[tracing::instrument(skip(self))]
    pub async fn migrate_default_to_test(&self) -> Result<MigrationReport> {
        let scratch = self.scratch()?;
        let mut report = MigrationReport::default();

        for (source, target) in MIGRATION_STAGES {
            self.emit(StackEvent::StageStarted {
                source: source.to_string(),
                target: target.to_string(),
            });

            let dump_path = scratch.path().join(format!("{source}.sql"));
            let outcome = self.copy_database(source, target, &dump_path).await?;
            if !outcome.is_completed() {
                tracing::warn!(source, target, "Migration stage failed: {}", outcome);
            }

            let stage = StageReport {
                source: source.to_string(),
                target: target.to_string(),
                outcome,
            };
            self.emit(StackEvent::StageFinished(stage.clone()));
            report.stages.push(stage);
        }

        Ok(report)
    }

    async fn copy_database(
        &self,
        source: &str,
        target: &str,
        dump_path: &Path,
    ) -> Result<StageOutcome> {
        let file = match File::create(dump_path) {
            Ok(file) => file,
            Err(e) => {
                return Ok(StageOutcome::DumpFailed(format!(
                    "{} を作成できません: {}",
                    dump_path.display(),
                    e
                )));
            }
        };

        let dumped = self.transfer.dump(file, &[source], true).await;
        if let Some(reason) = stage_failure(dumped, "mysqldump")? {
            return Ok(StageOutcome::DumpFailed(reason));
        }

        let imported = self
            .transfer
            .import(SqlSource::Path(dump_path), target)
            .await;
        if let Some(reason) = stage_failure(imported, "mysql")? {
            return Ok(StageOutcome::ImportFailed(reason));
        }

        Ok(StageOutcome::Completed)
    }

    fn scratch(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("bizbox-");

        let result = match &self.scratch_dir {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        };
        result.map_err(|e| {
            let dir = self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir);
            StackError::io_at(dir, e)
        })
    }
}

/// 段階の失敗理由（ランタイムが見つからない場合はエラーとして伝播）
fn stage_failure(
    result: bizbox_container::Result<ProcessOutput>,
    step: &str,
) -> Result<Option<String>> {
    match result.and_then(|output| output.check(step)) {
        Ok(_) => Ok(None),
        Err(e @ ContainerError::RuntimeNotFound(_)) => Err(e.into()),
        Err(e) => Ok(Some(e.to_string())),
    }
}

/// スコープを抜けるときにファイルを削除する
struct RemoveOnDrop {
    path: PathBuf,
    armed: bool,
}

impl RemoveOnDrop {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed intermediate file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), "Failed to remove file: {}", e),
        }
    }
}
