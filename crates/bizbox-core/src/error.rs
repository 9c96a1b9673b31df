use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO エラー: {path}\n理由: {message}")]
    IoError { path: PathBuf, message: String },

    #[error(
        "ベースディレクトリが見つかりません\n探索開始位置: {0}\nヒント: docker-compose.yml を含むディレクトリで実行するか、BIZBOX_HOME を設定してください"
    )]
    BaseDirNotFound(PathBuf),

    #[error(
        "ベースディレクトリ名からプロジェクト名を決められません: {0}\nヒント: 名前を持つ実在のディレクトリを指定してください"
    )]
    InvalidBaseDir(PathBuf),

    #[error("環境変数 '{key}' が {path} に定義されていません")]
    MissingEnvKey { key: String, path: PathBuf },

    #[error("元の設定ファイルが見つかりません: {0}")]
    SourceConfigMissing(PathBuf),

    #[error("設定ファイルのパースエラー: {path} ({line}行目)\n理由: {message}")]
    ConfigParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("データディレクトリの探索パターンが不正です: {0}")]
    InvalidPattern(String),
}

impl CoreError {
    pub(crate) fn io_at(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        CoreError::IoError {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
