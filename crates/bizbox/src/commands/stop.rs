use super::Deployment;
use bizbox_stack::StackOrchestrator;
use colored::Colorize;

pub async fn handle(deployment: &Deployment) -> anyhow::Result<()> {
    println!("{}", "BizBox スタックを停止中...".yellow());

    let transfer = deployment.transfer();
    let mut orchestrator =
        StackOrchestrator::new(&deployment.handle, &deployment.runtime, &transfer);
    orchestrator.stop().await?;

    println!();
    println!("{}", "✓ スタックを停止しました".green().bold());
    Ok(())
}
