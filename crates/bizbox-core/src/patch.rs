//! 設定ファイルのパッチ
//!
//! コンテナ環境に合わせて2つの設定ファイルを一度だけ書き換えます。
//! どちらのパッチも冪等で、適用済みかどうかは明示的な判定関数で確認します。
//!
//! - データソース設定: `localhost:3307` が残っていれば `mysql:3306` へ置換
//! - MySQL 設定: `my.cnf` がまだ無ければ `my.ini` から変換して作成

use crate::error::{CoreError, Result};
use crate::handle::StackHandle;
use crate::ini::{ConfigDocument, Removal};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// 旧環境での接続先
pub const LEGACY_CONNECTION: &str = "localhost:3307";

/// コンテナ環境での接続先
pub const CONTAINER_CONNECTION: &str = "mysql:3306";

/// コンテナ内のデータディレクトリ
pub const CONTAINER_DATA_DIR: &str = "/var/lib/mysql/";

const SERVER_SECTION: &str = "mysqld";
const CLIENT_SECTION: &str = "client";

/// MySQL 5.5 に存在しないオプション
const UNSUPPORTED_OPTIONS: &[&str] = &["myisam_max_extra_sort_file_size"];

/// パッチ適用の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied,
    AlreadyApplied,
}

impl PatchOutcome {
    pub fn applied(self) -> bool {
        self == PatchOutcome::Applied
    }
}

/// 両方のパッチの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchReport {
    pub connection: PatchOutcome,
    pub server_config: PatchOutcome,
}

/// `<path>.old`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".old");
    PathBuf::from(name)
}

/// データソース設定にまだ旧接続先が残っているか
pub fn connection_needs_patch(path: &Path) -> Result<bool> {
    let content = std::fs::read_to_string(path).map_err(|e| CoreError::io_at(path, e))?;
    Ok(content.contains(LEGACY_CONNECTION))
}

/// MySQL 設定がまだ作成されていないか
pub fn server_config_needs_patch(dest: &Path) -> bool {
    !dest.exists()
}

/// データソース設定の接続先を置換
///
/// 置換前の内容は `<path>.old` に退避します（既存の退避ファイルは上書き）。
#[instrument(fields(path = %path.display()))]
pub fn patch_connection_settings(path: &Path) -> Result<PatchOutcome> {
    let content = std::fs::read_to_string(path).map_err(|e| CoreError::io_at(path, e))?;

    if !content.contains(LEGACY_CONNECTION) {
        debug!("Connection settings already patched");
        return Ok(PatchOutcome::AlreadyApplied);
    }

    let backup = backup_path(path);
    std::fs::copy(path, &backup).map_err(|e| CoreError::io_at(&backup, e))?;

    let patched = content.replace(LEGACY_CONNECTION, CONTAINER_CONNECTION);
    std::fs::write(path, patched).map_err(|e| CoreError::io_at(path, e))?;

    info!(backup = %backup.display(), "Patched connection settings");
    Ok(PatchOutcome::Applied)
}

/// 旧 `my.ini` から `my.cnf` を作成
///
/// 変換先が既に存在する場合は元ファイルの内容に関わらず何もしません。
#[instrument(fields(source = %source.display(), dest = %dest.display()))]
pub fn patch_server_config(source: &Path, dest: &Path) -> Result<PatchOutcome> {
    if let Some(dir) = dest.parent() {
        std::fs::create_dir_all(dir).map_err(|e| CoreError::io_at(dir, e))?;
    }

    if !server_config_needs_patch(dest) {
        debug!("Server config already exists");
        return Ok(PatchOutcome::AlreadyApplied);
    }

    if !source.exists() {
        return Err(CoreError::SourceConfigMissing(source.to_path_buf()));
    }

    let mut doc = ConfigDocument::load(source)?;
    migrate_server_config(&mut doc);
    doc.save(dest)?;

    info!("Created server config");
    Ok(PatchOutcome::Applied)
}

/// MySQL 設定をコンテナ向けに変換
pub fn migrate_server_config(doc: &mut ConfigDocument) {
    // 対象バージョンに存在しないオプション
    for key in UNSUPPORTED_OPTIONS {
        log_removal(SERVER_SECTION, key, doc.remove_option(SERVER_SECTION, key));
    }

    // ポート指定を削除（デフォルト 3306 にする）
    for section in [SERVER_SECTION, CLIENT_SECTION] {
        log_removal(section, "port", doc.remove_option(section, "port"));
    }

    for key in ["log-bin", "basedir"] {
        log_removal(SERVER_SECTION, key, doc.remove_option(SERVER_SECTION, key));
    }

    // リネームされたオプション
    if let Some(charset) = doc.value(SERVER_SECTION, "default-character-set") {
        let charset = charset.map(str::to_string);
        doc.set(SERVER_SECTION, "character-set-server", charset.as_deref());
        doc.remove_option(SERVER_SECTION, "default-character-set");
    }

    // 強制する値
    doc.set(SERVER_SECTION, "datadir", Some(CONTAINER_DATA_DIR));
    doc.set(SERVER_SECTION, "innodb_data_home_dir", Some(CONTAINER_DATA_DIR));
}

fn log_removal(section: &str, key: &str, removal: Removal) {
    match removal {
        Removal::Removed => debug!(section, key, "Removed option"),
        Removal::OptionNotFound | Removal::SectionNotFound => {
            debug!(section, key, ?removal, "Nothing to remove")
        }
    }
}

/// 両方のパッチを適用
pub fn apply_all(handle: &StackHandle) -> Result<PatchReport> {
    let connection = patch_connection_settings(&handle.datasource_config())?;
    let server_config =
        patch_server_config(&handle.legacy_server_config(), &handle.server_config())?;

    Ok(PatchReport {
        connection,
        server_config,
    })
}
