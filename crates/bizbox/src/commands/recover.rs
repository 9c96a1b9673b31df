use super::{Deployment, render_event};
use crate::progress::Spinner;
use bizbox_stack::StackOrchestrator;
use colored::Colorize;
use std::path::Path;

pub async fn handle(deployment: &Deployment, input_file: &Path) -> anyhow::Result<()> {
    println!(
        "{}",
        format!("{} からリストア中...", input_file.display()).green()
    );

    let transfer = deployment.transfer();
    let spinner = Spinner::new("アーカイブを確認中...");
    let orchestrator = StackOrchestrator::new(&deployment.handle, &deployment.runtime, &transfer)
        .with_reporter(|event| render_event(&spinner, event));

    let result = orchestrator.recover(input_file).await;
    spinner.finish();
    result?;

    println!();
    println!("{}", "✓ リストアが完了しました".green().bold());
    Ok(())
}
