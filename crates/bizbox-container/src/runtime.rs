//! コンテナランタイムクライアント
//!
//! docker-compose / docker CLI をプロセスとして呼び出します。
//! 終了コードが 0 以外でもエラーにはせず、結果（終了コードと出力）を返します。
//! コマンド自体が見つからない場合だけは致命的なエラーです。

use crate::error::{ContainerError, Result};
use bizbox_core::StackHandle;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// compose コマンドの上書き用環境変数
pub const COMPOSE_PROGRAM_ENV: &str = "BIZBOX_COMPOSE";

/// docker コマンドの上書き用環境変数
pub const DOCKER_PROGRAM_ENV: &str = "BIZBOX_DOCKER";

const DEFAULT_COMPOSE_PROGRAM: &str = "docker-compose";
const DEFAULT_DOCKER_PROGRAM: &str = "docker";

/// 外部プロセスの実行結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// 終了コード（シグナルで終了した場合は None）
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// 失敗していれば CommandFailed に変換
    pub fn check(self, step: &str) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(ContainerError::CommandFailed {
                step: step.to_string(),
                code: self.code,
                stderr: self.stderr_lossy().trim().to_string(),
            })
        }
    }
}

impl From<std::process::Output> for ProcessOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// 単発コンテナの上書き設定
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OneOffOptions {
    /// `host:container` 形式のマウント
    pub volumes: Vec<String>,
    pub user: Option<String>,
    pub entrypoint: Option<String>,
}

/// exec の標準出力の扱い
#[derive(Debug)]
pub enum ExecStdout {
    /// 取り込んで ProcessOutput::stdout に入れる
    Capture,
    /// ファイルへ直接書き出す
    File(std::fs::File),
}

/// コンテナランタイムのトレイト
#[allow(async_fn_in_trait)]
pub trait ContainerRuntime {
    /// スタックを停止（何も起動していなくても成功）
    async fn bring_down(&self) -> Result<ProcessOutput>;

    /// 一度停止してからスタック全体をデタッチモードで起動
    async fn bring_up(&self) -> Result<ProcessOutput>;

    /// リンクされたサービスを起動せずに単発コンテナでコマンドを実行
    async fn run_one_off(
        &self,
        service: &str,
        command: &[&str],
        options: &OneOffOptions,
    ) -> Result<ProcessOutput>;

    /// 起動中のコンテナでシェルコマンドを実行し、stdin にバイト列を流し込む
    async fn exec_in_service(
        &self,
        container: &str,
        shell_command: &str,
        stdin: Option<&[u8]>,
        stdout: ExecStdout,
    ) -> Result<ProcessOutput>;

    /// コンテナのログを取得
    async fn logs(&self, container: &str) -> Result<ProcessOutput>;
}

/// CLI を呼び出す実装
#[derive(Debug, Clone)]
pub struct ComposeCli {
    compose_program: String,
    docker_program: String,
    work_dir: PathBuf,
}

impl ComposeCli {
    pub fn new(handle: &StackHandle) -> Self {
        Self::with_programs(
            DEFAULT_COMPOSE_PROGRAM,
            DEFAULT_DOCKER_PROGRAM,
            handle.base_dir(),
        )
    }

    /// BIZBOX_COMPOSE / BIZBOX_DOCKER があればそれを使う
    pub fn from_env(handle: &StackHandle) -> Self {
        let compose = std::env::var(COMPOSE_PROGRAM_ENV)
            .unwrap_or_else(|_| DEFAULT_COMPOSE_PROGRAM.to_string());
        let docker = std::env::var(DOCKER_PROGRAM_ENV)
            .unwrap_or_else(|_| DEFAULT_DOCKER_PROGRAM.to_string());
        Self::with_programs(compose, docker, handle.base_dir())
    }

    pub fn with_programs(
        compose_program: impl Into<String>,
        docker_program: impl Into<String>,
        work_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            compose_program: compose_program.into(),
            docker_program: docker_program.into(),
            work_dir: work_dir.as_ref().to_path_buf(),
        }
    }

    async fn run(
        &self,
        program: &str,
        args: &[&str],
        stdin: Option<&[u8]>,
        stdout: ExecStdout,
    ) -> Result<ProcessOutput> {
        tracing::debug!("Running: {} {}", program, redact(&args.join(" ")));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.work_dir)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::piped());

        match stdout {
            ExecStdout::Capture => cmd.stdout(Stdio::piped()),
            ExecStdout::File(file) => cmd.stdout(Stdio::from(file)),
        };

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ContainerError::RuntimeNotFound(program.to_string()),
            _ => ContainerError::Io(e),
        })?;

        let pipe = child.stdin.take();
        let feed = async move {
            if let (Some(mut pipe), Some(bytes)) = (pipe, stdin) {
                pipe.write_all(bytes).await?;
                pipe.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = ProcessOutput::from(output?);

        if let Err(e) = fed {
            // 子プロセスが先に終了した場合は終了コード側で判断する
            tracing::warn!("Failed to write stdin to {}: {}", program, e);
        }

        tracing::debug!(code = ?output.code, "{} finished", program);
        Ok(output)
    }
}

impl ContainerRuntime for ComposeCli {
    async fn bring_down(&self) -> Result<ProcessOutput> {
        self.run(&self.compose_program, &["down"], None, ExecStdout::Capture)
            .await
    }

    async fn bring_up(&self) -> Result<ProcessOutput> {
        // 前回の異常終了で残ったコンテナを確実に消す
        let down = self.bring_down().await?;
        if !down.success() {
            tracing::warn!("compose down failed before up: {}", down.stderr_lossy().trim());
        }

        self.run(&self.compose_program, &["up", "-d"], None, ExecStdout::Capture)
            .await
    }

    async fn run_one_off(
        &self,
        service: &str,
        command: &[&str],
        options: &OneOffOptions,
    ) -> Result<ProcessOutput> {
        let args = one_off_args(service, command, options);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&self.compose_program, &args, None, ExecStdout::Capture)
            .await
    }

    async fn exec_in_service(
        &self,
        container: &str,
        shell_command: &str,
        stdin: Option<&[u8]>,
        stdout: ExecStdout,
    ) -> Result<ProcessOutput> {
        self.run(
            &self.docker_program,
            &["exec", "-i", container, "bash", "-c", shell_command],
            stdin,
            stdout,
        )
        .await
    }

    async fn logs(&self, container: &str) -> Result<ProcessOutput> {
        self.run(
            &self.docker_program,
            &["logs", container],
            None,
            ExecStdout::Capture,
        )
        .await
    }
}

/// `docker-compose run` の引数を組み立てる
pub fn one_off_args(service: &str, command: &[&str], options: &OneOffOptions) -> Vec<String> {
    let mut args = vec!["run".to_string(), "--rm".to_string(), "--no-deps".to_string()];

    for volume in &options.volumes {
        args.push("-v".to_string());
        args.push(volume.clone());
    }
    if let Some(user) = &options.user {
        args.push("--user".to_string());
        args.push(user.clone());
    }
    if let Some(entrypoint) = &options.entrypoint {
        args.push("--entrypoint".to_string());
        args.push(entrypoint.clone());
    }

    args.push(service.to_string());
    args.extend(command.iter().map(|s| s.to_string()));
    args
}

/// ログ出力用にパスワードを伏せる
pub fn redact(command: &str) -> String {
    command
        .split(' ')
        .map(|token| match token.split_once("--password=") {
            Some((prefix, _)) => format!("{}--password=****", prefix),
            None => token.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
