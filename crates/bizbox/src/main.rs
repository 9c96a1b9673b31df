mod commands;
mod progress;

use bizbox_container::{ContainerError, ReadinessConfig};
use bizbox_stack::{StackError, Timings};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bizbox")]
#[command(about = "2BizBox スタックの起動・停止・バックアップを管理します", long_about = None)]
struct Cli {
    /// ベースディレクトリ（docker-compose.yml のあるディレクトリ）
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// 詳細なログを出力
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    timings: TimingArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TimingArgs {
    /// MySQL の起動完了を待つ最大秒数
    #[arg(long, env = "BIZBOX_READY_TIMEOUT", default_value_t = 60, global = true)]
    ready_timeout: u64,

    /// 起動完了後、既定スキーマを取り込むまでの待ち秒数
    #[arg(long, env = "BIZBOX_SETTLE_SECS", default_value_t = 10, global = true)]
    settle_secs: u64,

    /// 既定スキーマ取り込み後、停止するまでの待ち秒数
    #[arg(long, env = "BIZBOX_IMPORT_PAUSE_SECS", default_value_t = 5, global = true)]
    import_pause_secs: u64,
}

impl TimingArgs {
    fn to_timings(&self) -> Timings {
        Timings {
            readiness: ReadinessConfig {
                timeout: Duration::from_secs(self.ready_timeout),
                ..ReadinessConfig::default()
            },
            credential_settle: Duration::from_secs(self.settle_secs),
            post_import_pause: Duration::from_secs(self.import_pause_secs),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// スタックを起動（初回はデータベースを初期化）
    Start,
    /// スタックを停止
    Stop,
    /// データベースをバックアップ
    Backup {
        /// アーカイブの出力先ディレクトリ
        output_dir: PathBuf,
    },
    /// バックアップアーカイブからリストア
    Recover {
        /// バックアップアーカイブ（.sql.zip）
        input_file: PathBuf,
    },
    /// 本番系データベースをテスト系へコピー
    DefaultToTest,
    /// 設定ファイルとデータディレクトリの状態を表示
    Status,
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}

/// RUST_LOG があればそれを優先し、なければ warn（--verbose で debug）
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Versionコマンドはベースディレクトリ不要
    if matches!(cli.command, Commands::Version) {
        println!("bizbox {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let deployment = commands::Deployment::discover(cli.base_dir.as_deref())?;
    let timings = cli.timings.to_timings();

    // コマンドディスパッチ
    match cli.command {
        Commands::Start => commands::start::handle(&deployment, timings).await?,
        Commands::Stop => commands::stop::handle(&deployment).await?,
        Commands::Backup { output_dir } => {
            commands::backup::handle(&deployment, &output_dir).await?;
        }
        Commands::Recover { input_file } => {
            commands::recover::handle(&deployment, &input_file).await?;
        }
        Commands::DefaultToTest => commands::migrate::handle(&deployment).await?,
        Commands::Status => commands::status::handle(&deployment)?,
        Commands::Version => unreachable!("Version is handled before discovery"),
    }

    Ok(())
}

/// 外部ツールの終了コードがあればそれを、なければ 1
fn exit_code_for(err: &anyhow::Error) -> u8 {
    let code = err
        .downcast_ref::<StackError>()
        .and_then(StackError::exit_code)
        .or_else(|| {
            err.downcast_ref::<ContainerError>()
                .and_then(ContainerError::exit_code)
        });

    code.and_then(|c| u8::try_from(c).ok())
        .filter(|c| *c != 0)
        .unwrap_or(1)
}
