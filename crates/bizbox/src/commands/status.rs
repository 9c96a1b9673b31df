use super::Deployment;
use bizbox_core::{
    backup_path, connection_needs_patch, data_dir_initialized, server_config_needs_patch,
};
use colored::Colorize;

/// 状態を表示（外部コマンドは実行しない）
pub fn handle(deployment: &Deployment) -> anyhow::Result<()> {
    let handle = &deployment.handle;

    println!("{}", "BizBox スタックの状態".bold());
    println!();
    println!("  ベースディレクトリ:     {}", handle.base_dir().display().to_string().cyan());
    println!("  データベースコンテナ:   {}", handle.db_container().cyan());

    let datasource = handle.datasource_config();
    let connection = match connection_needs_patch(&datasource) {
        Ok(false) => "適用済み".green(),
        Ok(true) => "未適用".yellow(),
        Err(_) => "ファイルなし".red(),
    };
    println!("  接続設定パッチ:         {}", connection);
    if backup_path(&datasource).exists() {
        println!("    {}", format!("元ファイル: {}", backup_path(&datasource).display()).dimmed());
    }

    let server_config = if server_config_needs_patch(&handle.server_config()) {
        "未適用".yellow()
    } else {
        "適用済み".green()
    };
    println!("  MySQL 設定パッチ:       {}", server_config);

    let data = handle
        .load_env()
        .and_then(|env| handle.data_dir(&env))
        .and_then(|dir| data_dir_initialized(&dir).map(|initialized| (initialized, dir)));
    match data {
        Ok((initialized, dir)) => {
            let label = if initialized {
                "初期化済み".green()
            } else {
                "未初期化（次回 start で初期化）".yellow()
            };
            println!("  データディレクトリ:     {} ({})", label, dir.display());
        }
        Err(e) => {
            println!("  データディレクトリ:     {}", "不明".red());
            println!("    {}", e.to_string().dimmed());
        }
    }

    Ok(())
}
