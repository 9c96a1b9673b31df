//! `.env` ファイルのローダー
//!
//! `KEY=VALUE` 形式の行だけを取り込み、それ以外の行は黙って読み飛ばします。
//! 値の型検証やエスケープ解釈は行いません。

use crate::error::{CoreError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// データディレクトリを指すキー
pub const SERVICE_DATA_DIR: &str = "SERVICE_DATA_DIR";

/// `.env` から読み込んだ変数の集合
///
/// 必要になるたびにファイルから読み直すため、キャッシュは持ちません。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentMap {
    path: PathBuf,
    vars: HashMap<String, String>,
}

impl EnvironmentMap {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// 必須キーを取得（未定義ならエラー）
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| CoreError::MissingEnvKey {
            key: key.to_string(),
            path: self.path.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// `.env` ファイルを読み込む
#[instrument(fields(path = %path.display()))]
pub fn load_env_file(path: &Path) -> Result<EnvironmentMap> {
    let content = std::fs::read_to_string(path).map_err(|e| CoreError::io_at(path, e))?;

    let vars = parse_env(&content);
    debug!(count = vars.len(), "Loaded variables from .env file");

    Ok(EnvironmentMap {
        path: path.to_path_buf(),
        vars,
    })
}

fn parse_env(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for line in content.lines() {
        let line = line.trim();

        // 空行とコメント行をスキップ
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // 最初の '=' で分割。'=' のない行は不正行として無視
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        vars.insert(key.to_string(), strip_quotes(value.trim()).to_string());
    }

    vars
}

/// 対になったクォートを除去
fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_env(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_counts_only_well_formed_lines() {
        let (_dir, path) = write_env(
            "SERVICE_DATA_DIR=./data\n\
             COMPOSE_PROJECT_NAME = bizbox \n\
             this line is garbage\n\
             \n\
             # COMMENT=ignored\n\
             =orphan\n\
             JAVA_OPTS=-Xmx1g -Dfoo=bar\n",
        );

        let env = load_env_file(&path).unwrap();
        assert_eq!(env.len(), 3);
        assert_eq!(env.get("SERVICE_DATA_DIR"), Some("./data"));
        assert_eq!(env.get("COMPOSE_PROJECT_NAME"), Some("bizbox"));
        // 最初の '=' だけで分割される
        assert_eq!(env.get("JAVA_OPTS"), Some("-Xmx1g -Dfoo=bar"));
    }

    #[test]
    fn test_load_is_idempotent() {
        let (_dir, path) = write_env("A=1\nB=2\nbroken\n");

        let first = load_env_file(&path).unwrap();
        let second = load_env_file(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_quotes_are_stripped() {
        let (_dir, path) = write_env("A=\"quoted value\"\nB='single'\nC=\"unbalanced\n");

        let env = load_env_file(&path).unwrap();
        assert_eq!(env.get("A"), Some("quoted value"));
        assert_eq!(env.get("B"), Some("single"));
        assert_eq!(env.get("C"), Some("\"unbalanced"));
    }

    #[test]
    fn test_require_missing_key() {
        let (_dir, path) = write_env("OTHER=1\n");

        let env = load_env_file(&path).unwrap();
        let err = env.require(SERVICE_DATA_DIR).unwrap_err();
        assert!(matches!(err, CoreError::MissingEnvKey { ref key, .. } if key == SERVICE_DATA_DIR));
    }

    #[test]
    fn test_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_env_file(&dir.path().join("missing.env"));
        assert!(matches!(result, Err(CoreError::IoError { .. })));
    }
}
