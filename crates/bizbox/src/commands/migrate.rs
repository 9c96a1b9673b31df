use super::{Deployment, render_event};
use crate::progress::Spinner;
use bizbox_stack::StackOrchestrator;
use colored::Colorize;

pub async fn handle(deployment: &Deployment) -> anyhow::Result<()> {
    println!("{}", "本番系データベースをテスト系へコピー中...".green());

    let transfer = deployment.transfer();
    let spinner = Spinner::new("コピーを準備中...");
    let orchestrator = StackOrchestrator::new(&deployment.handle, &deployment.runtime, &transfer)
        .with_reporter(|event| render_event(&spinner, event));

    let result = orchestrator.migrate_default_to_test().await;
    spinner.finish();
    let report = result?;

    let failed = report.failures().count();
    if failed > 0 {
        anyhow::bail!(
            "{} 件中 {} 件のコピーに失敗しました",
            report.stages.len(),
            failed
        );
    }

    println!();
    println!("{}", "✓ テスト系へのコピーが完了しました".green().bold());
    Ok(())
}
