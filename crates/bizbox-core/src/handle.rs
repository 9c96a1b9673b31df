//! デプロイメント単位のハンドル

use crate::env::{EnvironmentMap, SERVICE_DATA_DIR, load_env_file};
use crate::error::{CoreError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// データベースサービス名（compose 上の名前）
pub const DB_SERVICE: &str = "mysql";

/// データベースコンテナ名のサフィックス
const DB_CONTAINER_SUFFIX: &str = "_mysql_1";

/// 初期化済みのデータディレクトリに必ず存在するファイルのプレフィックス
const ENGINE_DATA_PREFIX: &str = "ibdata";

/// 1つのデプロイメントを識別するハンドル
///
/// 生成後は不変。プロセス全体で1つだけ持ち回す前提ですが、
/// グローバル状態にはせず各コンポーネントへ明示的に渡します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackHandle {
    base_dir: PathBuf,
    project_name: String,
    db_container: String,
}

impl StackHandle {
    /// ディレクトリ名がプロジェクト名になるため、名前を持たないパス
    /// （`/` や `..` で終わるもの）は受け付けません。
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        let project_name = base_dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CoreError::InvalidBaseDir(base_dir.clone()))?
            .to_string();
        let db_container = format!("{}{}", project_name, DB_CONTAINER_SUFFIX);

        Ok(Self {
            base_dir,
            project_name,
            db_container,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// データベースコンテナ名: `{basename}_mysql_1`
    pub fn db_container(&self) -> &str {
        &self.db_container
    }

    pub fn env_file(&self) -> PathBuf {
        self.base_dir.join(".env")
    }

    /// JBoss のデータソース設定
    pub fn datasource_config(&self) -> PathBuf {
        self.base_dir
            .join("server/jboss/server/default/deploy/mysql-ds.xml")
    }

    /// 旧形式の MySQL 設定
    pub fn legacy_server_config(&self) -> PathBuf {
        self.base_dir.join("server/db/my.ini")
    }

    /// コンテナがマウントする MySQL 設定
    pub fn server_config(&self) -> PathBuf {
        self.base_dir.join("server/db/conf/my.cnf")
    }

    /// 初期化に使うスキーマ＋データ
    pub fn default_schema(&self) -> PathBuf {
        self.base_dir.join("server/db/database.sql")
    }

    /// `.env` を読み直す
    pub fn load_env(&self) -> Result<EnvironmentMap> {
        load_env_file(&self.env_file())
    }

    /// `SERVICE_DATA_DIR` を解決（相対パスはベースディレクトリ基準）
    pub fn data_dir(&self, env: &EnvironmentMap) -> Result<PathBuf> {
        let raw = PathBuf::from(env.require(SERVICE_DATA_DIR)?);
        let resolved = if raw.is_absolute() {
            raw
        } else {
            self.base_dir.join(raw)
        };
        // `./data` の `.` を落とす
        Ok(resolved.components().collect())
    }
}

/// データディレクトリにエンジンのデータファイルがあるか
pub fn data_dir_initialized(data_dir: &Path) -> Result<bool> {
    let pattern = format!(
        "{}/{}*",
        glob::Pattern::escape(&data_dir.to_string_lossy()),
        ENGINE_DATA_PREFIX
    );
    debug!(pattern = %pattern, "Checking for engine data files");

    let mut entries =
        glob::glob(&pattern).map_err(|e| CoreError::InvalidPattern(e.to_string()))?;
    Ok(entries.any(|entry| entry.is_ok()))
}
