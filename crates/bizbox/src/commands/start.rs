use super::{Deployment, render_event};
use crate::progress::Spinner;
use bizbox_stack::{StackOrchestrator, Timings};
use colored::Colorize;

pub async fn handle(deployment: &Deployment, timings: Timings) -> anyhow::Result<()> {
    println!("{}", "BizBox スタックを起動中...".green());
    println!(
        "ベースディレクトリ: {}",
        deployment.handle.base_dir().display().to_string().cyan()
    );

    let transfer = deployment.transfer();
    let spinner = Spinner::new("起動準備中...");
    let mut orchestrator =
        StackOrchestrator::new(&deployment.handle, &deployment.runtime, &transfer)
            .with_timings(timings)
            .with_reporter(|event| render_event(&spinner, event));

    let result = orchestrator.start().await;
    spinner.finish();

    if let Err(e) = result {
        eprintln!(
            "{}",
            format!("⚠ {} の段階で中断しました", orchestrator.state()).yellow()
        );
        return Err(e.into());
    }

    println!();
    println!("{}", "✓ スタックを起動しました".green().bold());
    println!(
        "  データベースコンテナ: {}",
        deployment.handle.db_container().cyan()
    );

    Ok(())
}
