//! ベースディレクトリの発見

use crate::error::{CoreError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// ベースディレクトリを示すマーカーファイル
pub const COMPOSE_FILE: &str = "docker-compose.yml";

/// ベースディレクトリを指定する環境変数
pub const BASE_DIR_ENV: &str = "BIZBOX_HOME";

/// ベースディレクトリを探す
///
/// 以下の優先順位:
/// 1. 明示的な指定（`--base-dir`）
/// 2. 環境変数 BIZBOX_HOME
/// 3. カレントディレクトリから上に向かって docker-compose.yml を探す
#[tracing::instrument]
pub fn find_base_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        debug!(base_dir = %dir.display(), "Using explicit base directory");
        return absolutize(dir);
    }

    // 1. 環境変数
    if let Ok(root) = std::env::var(BASE_DIR_ENV) {
        let path = PathBuf::from(&root);
        debug!(env_root = %root, "Checking BIZBOX_HOME");
        if path.join(COMPOSE_FILE).exists() {
            info!(base_dir = %path.display(), "Found base directory from environment variable");
            return absolutize(&path);
        }
        warn!(env_root = %root, "BIZBOX_HOME does not contain {}", COMPOSE_FILE);
    }

    // 2. カレントディレクトリから上に向かって探す
    let start_dir = std::env::current_dir()?;
    let mut current = start_dir.clone();

    loop {
        if current.join(COMPOSE_FILE).exists() {
            info!(base_dir = %current.display(), "Found base directory");
            return Ok(current);
        }

        if !current.pop() {
            break;
        }
    }

    warn!(start_dir = %start_dir.display(), "Base directory not found");
    Err(CoreError::BaseDirNotFound(start_dir))
}

/// `..` やシンボリックリンクを解決した絶対パスにする
fn absolutize(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).map_err(|e| CoreError::io_at(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_explicit_dir_wins() {
        let dir = tempfile::tempdir().unwrap();
        let found = find_base_dir(Some(dir.path())).unwrap();
        assert_eq!(found, dir.path().canonicalize().unwrap());
    }

    #[test]
    #[serial]
    fn test_explicit_parent_dir_is_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("prodstack");
        let nested = base.join("sub");
        fs::create_dir_all(&nested).unwrap();

        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&nested).unwrap();

        let found = find_base_dir(Some(Path::new("..")));

        std::env::set_current_dir(original_dir).unwrap();

        let found = found.unwrap();
        assert_eq!(found, base.canonicalize().unwrap());
        assert_eq!(found.file_name().unwrap(), "prodstack");
    }

    #[test]
    fn test_explicit_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result = find_base_dir(Some(dir.path().join("missing").as_path()));
        assert!(matches!(result, Err(CoreError::IoError { .. })));
    }

    #[test]
    #[serial]
    fn test_env_var() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(COMPOSE_FILE), "services: {}\n").unwrap();

        temp_env::with_var(BASE_DIR_ENV, Some(dir.path()), || {
            let found = find_base_dir(None).unwrap();
            assert_eq!(found, dir.path().canonicalize().unwrap());
        });
    }

    #[test]
    #[serial]
    fn test_walks_up_from_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(COMPOSE_FILE), "services: {}\n").unwrap();
        let nested = dir.path().join("server/db");
        fs::create_dir_all(&nested).unwrap();

        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&nested).unwrap();

        let found = temp_env::with_var_unset(BASE_DIR_ENV, || find_base_dir(None));

        std::env::set_current_dir(original_dir).unwrap();

        let found = found.unwrap();
        assert_eq!(
            found.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    #[serial]
    fn test_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&dir).unwrap();

        let result = temp_env::with_var_unset(BASE_DIR_ENV, || find_base_dir(None));

        std::env::set_current_dir(original_dir).unwrap();

        // 上位ディレクトリに docker-compose.yml が無い限り見つからない
        let canonical = dir.path().canonicalize().unwrap();
        if !canonical.ancestors().any(|p| p.join(COMPOSE_FILE).exists()) {
            assert!(matches!(result, Err(CoreError::BaseDirNotFound(_))));
        }
    }
}
