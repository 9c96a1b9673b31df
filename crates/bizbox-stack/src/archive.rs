//! バックアップアーカイブ
//!
//! ダンプ1ファイルだけを格納した ZIP を扱います。
//! アーカイブ内のエントリ名は `<タイムスタンプ>.sql`、アーカイブ自体は
//! `<タイムスタンプ>.sql.zip` です。

use crate::error::{Result, StackError};
use chrono::{DateTime, TimeZone};
use std::fs::File;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// タイムスタンプの書式（秒精度）
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

const SQL_EXTENSION: &str = "sql";
const ARCHIVE_EXTENSION: &str = "zip";

/// バックアップ1回分のファイル名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupNames {
    pub sql_path: PathBuf,
    pub archive_path: PathBuf,
}

impl BackupNames {
    pub fn at<Tz: TimeZone>(output_dir: &Path, now: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let stamp = now.format(TIMESTAMP_FORMAT).to_string();
        let sql_path = output_dir.join(format!("{stamp}.{SQL_EXTENSION}"));
        let archive_path = output_dir.join(format!("{stamp}.{SQL_EXTENSION}.{ARCHIVE_EXTENSION}"));
        Self {
            sql_path,
            archive_path,
        }
    }
}

/// アーカイブ名から中の SQL のエントリ名を求める（最後の拡張子を外す）
pub fn entry_name_for(archive_path: &Path) -> Result<String> {
    archive_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
        .ok_or_else(|| StackError::archive(archive_path, "アーカイブ名からエントリ名を決定できません"))
}

/// SQL ファイルを最大圧縮の Deflate で1エントリのアーカイブにする
#[tracing::instrument(skip_all, fields(sql = %sql_path.display(), archive = %archive_path.display()))]
pub fn compress_sql(sql_path: &Path, archive_path: &Path) -> Result<()> {
    let entry_name = sql_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| StackError::archive(sql_path, "ファイル名が不正です"))?;

    let mut source = File::open(sql_path).map_err(|e| StackError::io_at(sql_path, e))?;
    let target = File::create(archive_path).map_err(|e| StackError::io_at(archive_path, e))?;

    let mut writer = ZipWriter::new(target);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
        .large_file(true);

    writer
        .start_file(entry_name, options)
        .map_err(|e| StackError::archive(archive_path, e))?;
    std::io::copy(&mut source, &mut writer).map_err(|e| StackError::archive(archive_path, e))?;
    writer
        .finish()
        .map_err(|e| StackError::archive(archive_path, e))?;

    tracing::debug!("Archive written");
    Ok(())
}

/// アーカイブから指定エントリだけを dest_dir に取り出し、そのパスを返す
#[tracing::instrument(skip_all, fields(archive = %archive_path.display(), dest = %dest_dir.display()))]
pub fn extract_sql(archive_path: &Path, entry_name: &str, dest_dir: &Path) -> Result<PathBuf> {
    let file = File::open(archive_path).map_err(|e| StackError::archive(archive_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| StackError::archive(archive_path, e))?;

    let mut entry = archive.by_name(entry_name).map_err(|e| {
        StackError::archive(archive_path, format!("エントリ '{entry_name}' を取り出せません: {e}"))
    })?;

    // エントリ名はパスとして使わない
    let dest = dest_dir.join(format!("restore.{SQL_EXTENSION}"));
    let mut out = File::create(&dest).map_err(|e| StackError::io_at(&dest, e))?;
    std::io::copy(&mut entry, &mut out).map_err(|e| StackError::archive(archive_path, e))?;

    tracing::debug!(entry = entry_name, "Entry extracted");
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::fs;
    use tempfile::tempdir;

    fn sample_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
    }

    #[test]
    fn test_backup_names() {
        let names = BackupNames::at(Path::new("/backups"), &sample_time());
        assert_eq!(names.sql_path, PathBuf::from("/backups/20240309070501.sql"));
        assert_eq!(
            names.archive_path,
            PathBuf::from("/backups/20240309070501.sql.zip")
        );
    }

    #[test]
    fn test_entry_name_for() {
        assert_eq!(
            entry_name_for(Path::new("/b/20240309070501.sql.zip")).unwrap(),
            "20240309070501.sql"
        );
        assert_eq!(entry_name_for(Path::new("weekly.zip")).unwrap(), "weekly");
        assert!(entry_name_for(Path::new("/")).is_err());
    }

    #[test]
    fn test_compress_then_extract() {
        let dir = tempdir().unwrap();
        let names = BackupNames::at(dir.path(), &sample_time());
        let sql = "CREATE DATABASE bb2_default;\nUSE bb2_default;\n".repeat(100);
        fs::write(&names.sql_path, &sql).unwrap();

        compress_sql(&names.sql_path, &names.archive_path).unwrap();
        assert!(fs::metadata(&names.archive_path).unwrap().len() < sql.len() as u64);

        let out = tempdir().unwrap();
        let entry = entry_name_for(&names.archive_path).unwrap();
        let extracted = extract_sql(&names.archive_path, &entry, out.path()).unwrap();
        assert_eq!(fs::read_to_string(extracted).unwrap(), sql);
    }

    #[test]
    fn test_extract_renamed_archive_fails() {
        let dir = tempdir().unwrap();
        let names = BackupNames::at(dir.path(), &sample_time());
        fs::write(&names.sql_path, "SELECT 1;\n").unwrap();
        compress_sql(&names.sql_path, &names.archive_path).unwrap();

        let renamed = dir.path().join("latest.sql.zip");
        fs::rename(&names.archive_path, &renamed).unwrap();

        let entry = entry_name_for(&renamed).unwrap();
        let err = extract_sql(&renamed, &entry, dir.path()).unwrap_err();
        assert!(matches!(err, StackError::Archive { .. }));
    }

    #[test]
    fn test_extract_corrupt_archive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.sql.zip");
        fs::write(&path, b"not a zip file").unwrap();

        let err = extract_sql(&path, "broken.sql", dir.path()).unwrap_err();
        assert!(matches!(err, StackError::Archive { .. }));
    }

    #[test]
    fn test_extract_missing_archive() {
        let dir = tempdir().unwrap();
        let err = extract_sql(&dir.path().join("none.sql.zip"), "none.sql", dir.path())
            .unwrap_err();
        assert!(matches!(err, StackError::Archive { .. }));
    }
}
