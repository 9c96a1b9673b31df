//! データベース転送クライアント
//!
//! mysqldump / mysql をデータベースコンテナ内で実行し、
//! ダンプはファイルへ、インポートは stdin へバイト列として流します。

use crate::error::{ContainerError, Result};
use crate::runtime::{ContainerRuntime, ExecStdout, ProcessOutput};
use std::io::Read;
use std::path::Path;

/// ダンプ・インポートに使う認証情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            password: "root".to_string(),
        }
    }
}

/// インポートする SQL の入力元
pub enum SqlSource<'a> {
    /// パス指定（このクライアントが開いて、読み切って、閉じる）
    Path(&'a Path),
    /// 呼び出し側が開いたストリーム（閉じるのは呼び出し側）
    Stream(&'a mut (dyn Read + Send)),
}

/// データベース転送のトレイト
#[allow(async_fn_in_trait)]
pub trait DatabaseTransfer {
    /// データベースをダンプして target に書き出す
    ///
    /// `databases` が空なら全データベース。`force` は行単位のエラーを無視して続行します。
    /// 終了コードが 0 以外の場合、target に書かれた途中の内容は呼び出し側で破棄してください。
    async fn dump(
        &self,
        target: std::fs::File,
        databases: &[&str],
        force: bool,
    ) -> Result<ProcessOutput>;

    /// SQL を流し込む
    ///
    /// `database` が空文字なら、SQL 内の `USE` 文に任せます。
    async fn import(&self, source: SqlSource<'_>, database: &str) -> Result<ProcessOutput>;
}

/// mysql クライアントを使う実装
pub struct MysqlTransfer<'r, R> {
    runtime: &'r R,
    container: String,
    credentials: Credentials,
}

impl<'r, R: ContainerRuntime> MysqlTransfer<'r, R> {
    pub fn new(runtime: &'r R, container: impl Into<String>) -> Self {
        Self {
            runtime,
            container: container.into(),
            credentials: Credentials::default(),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
}

impl<R: ContainerRuntime> DatabaseTransfer for MysqlTransfer<'_, R> {
    async fn dump(
        &self,
        target: std::fs::File,
        databases: &[&str],
        force: bool,
    ) -> Result<ProcessOutput> {
        let command = dump_command(&self.credentials, databases, force);
        tracing::info!(container = %self.container, ?databases, force, "Dumping databases");

        self.runtime
            .exec_in_service(&self.container, &command, None, ExecStdout::File(target))
            .await
    }

    async fn import(&self, source: SqlSource<'_>, database: &str) -> Result<ProcessOutput> {
        let payload = match source {
            SqlSource::Path(path) => std::fs::read(path)?,
            SqlSource::Stream(reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).map_err(ContainerError::Io)?;
                buf
            }
        };

        let command = import_command(&self.credentials, database);
        tracing::info!(
            container = %self.container,
            database,
            bytes = payload.len(),
            "Importing SQL"
        );

        self.runtime
            .exec_in_service(
                &self.container,
                &command,
                Some(&payload),
                ExecStdout::Capture,
            )
            .await
    }
}

/// mysqldump コマンドを組み立てる
///
/// - 0件: `--all-databases`
/// - 1件: データベース名のみ（`USE` 文を含まないので別名のDBへ取り込める）
/// - 複数: `--databases`（`CREATE DATABASE` と `USE` 文を含む）
pub fn dump_command(credentials: &Credentials, databases: &[&str], force: bool) -> String {
    let mut parts = vec![
        "mysqldump".to_string(),
        "-u".to_string(),
        shell_escape(&credentials.user),
        format!("--password={}", shell_escape(&credentials.password)),
    ];

    if force {
        parts.push("--force".to_string());
    }

    match databases {
        [] => parts.push("--all-databases".to_string()),
        [single] => parts.push(shell_escape(single)),
        many => {
            parts.push("--databases".to_string());
            parts.extend(many.iter().map(|db| shell_escape(db)));
        }
    }

    parts.join(" ")
}

/// mysql コマンドを組み立てる
pub fn import_command(credentials: &Credentials, database: &str) -> String {
    let mut command = format!(
        "mysql -u {} --password={}",
        shell_escape(&credentials.user),
        shell_escape(&credentials.password)
    );
    if !database.is_empty() {
        command.push(' ');
        command.push_str(&shell_escape(database));
    }
    command
}

/// シェル用にエスケープ
pub fn shell_escape(s: &str) -> String {
    // シングルクォートでラップしてエスケープ
    format!("'{}'", s.replace('\'', "'\\''"))
}
