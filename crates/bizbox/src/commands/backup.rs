use super::{Deployment, render_event};
use crate::progress::Spinner;
use bizbox_stack::StackOrchestrator;
use colored::Colorize;
use std::path::Path;

pub async fn handle(deployment: &Deployment, output_dir: &Path) -> anyhow::Result<()> {
    println!("{}", "データベースをバックアップ中...".green());

    let transfer = deployment.transfer();
    let spinner = Spinner::new("ダンプを準備中...");
    let orchestrator = StackOrchestrator::new(&deployment.handle, &deployment.runtime, &transfer)
        .with_reporter(|event| render_event(&spinner, event));

    let result = orchestrator.backup(output_dir).await;
    spinner.finish();
    let archive = result?;

    println!();
    println!("{}", "✓ バックアップを作成しました".green().bold());
    println!("  {}", archive.display().to_string().cyan());
    Ok(())
}
