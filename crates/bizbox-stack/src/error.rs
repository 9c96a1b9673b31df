use bizbox_container::ContainerError;
use bizbox_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("バックアップアーカイブエラー: {path}\n理由: {message}")]
    Archive { path: PathBuf, message: String },

    #[error("IO エラー: {path}\n理由: {message}")]
    Io { path: PathBuf, message: String },
}

impl StackError {
    pub(crate) fn io_at(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        StackError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn archive(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        StackError::Archive {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// プロセスの終了コードとして使える外部ツールの終了コード
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            StackError::Container(e) => e.exit_code(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, StackError>;
