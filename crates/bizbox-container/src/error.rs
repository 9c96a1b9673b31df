use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error(
        "'{0}' が見つかりません\n\nヒント:\n  • Docker と docker-compose がインストールされているか確認してください\n  • BIZBOX_DOCKER / BIZBOX_COMPOSE でコマンドのパスを指定できます"
    )]
    RuntimeNotFound(String),

    #[error("プロセスの実行に失敗しました: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "コンテナ '{container}' の準備完了を待機中にタイムアウトしました（{timeout_secs}秒）\n\nヒント:\n  • docker logs {container} でMySQLの起動ログを確認してください\n  • BIZBOX_READY_TIMEOUT で待機時間を延ばせます"
    )]
    ReadinessTimeout { container: String, timeout_secs: u64 },

    #[error("{step} が失敗しました（終了コード: {}）\n{stderr}", describe_code(.code))]
    CommandFailed {
        step: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl ContainerError {
    /// 外部ツールの終了コード（あれば）
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ContainerError::CommandFailed { code, .. } => *code,
            _ => None,
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "シグナルで終了".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, ContainerError>;
