//! INI 形式の設定ドキュメント
//!
//! MySQL の `my.ini` / `my.cnf` を扱うための最小限のモデルです。
//! セクションとオプションの順序、コメント行を保持したまま読み書きします。
//!
//! - 区切り文字は `=` と `:`（先に現れた方）
//! - 値のないオプション（`skip-locking` など）を許可
//! - キーの比較は ASCII の大文字小文字を区別しない
//! - 書き出しは `key=value`（区切り文字の前後に空白を入れない）

use crate::error::{CoreError, Result};
use std::fmt;
use std::path::Path;

/// オプション削除の結果
///
/// 見つからなかった場合もエラーではなく、無視してよい結果として返します。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    OptionNotFound,
    SectionNotFound,
}

impl Removal {
    pub fn is_removed(self) -> bool {
        self == Removal::Removed
    }
}

/// パースエラー（行番号は1始まり）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Option { key: String, value: Option<String> },
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    name: String,
    entries: Vec<Entry>,
}

impl Section {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(
            |entry| matches!(entry, Entry::Option { key: k, .. } if k.eq_ignore_ascii_case(key)),
        )
    }
}

/// セクション付きの key/value 設定
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    /// 最初のセクションより前のコメント
    preamble: Vec<String>,
    sections: Vec<Section>,
}

impl ConfigDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// ファイルから読み込む
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::io_at(path, e))?;
        Self::parse(&content).map_err(|e| CoreError::ConfigParse {
            path: path.to_path_buf(),
            line: e.line,
            message: e.message,
        })
    }

    /// ファイルへ書き出す
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_string()).map_err(|e| CoreError::io_at(path, e))
    }

    pub fn parse(content: &str) -> std::result::Result<Self, SyntaxError> {
        let mut doc = ConfigDocument::new();
        let mut current: Option<usize> = None;

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();

            if line.is_empty() {
                continue;
            }

            if line.starts_with('#') || line.starts_with(';') {
                match current {
                    Some(i) => doc.sections[i]
                        .entries
                        .push(Entry::Comment(line.to_string())),
                    None => doc.preamble.push(line.to_string()),
                }
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest.strip_suffix(']').ok_or_else(|| SyntaxError {
                    line: index + 1,
                    message: format!("セクションヘッダが閉じていません: {}", line),
                })?;
                current = Some(doc.section_index_or_insert(name.trim()));
                continue;
            }

            let Some(i) = current else {
                return Err(SyntaxError {
                    line: index + 1,
                    message: format!("セクションより前にオプションがあります: {}", line),
                });
            };

            let (key, value) = split_option(line);
            let section = &mut doc.sections[i];
            match section.position(key) {
                // 重複キーは後勝ち
                Some(pos) => {
                    section.entries[pos] = Entry::Option {
                        key: key.to_string(),
                        value,
                    }
                }
                None => section.entries.push(Entry::Option {
                    key: key.to_string(),
                    value,
                }),
            }
        }

        Ok(doc)
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.section(section).is_some()
    }

    pub fn has_option(&self, section: &str, key: &str) -> bool {
        self.value(section, key).is_some()
    }

    /// オプションの値
    ///
    /// `None` はオプションが存在しないこと、`Some(None)` は値なしオプションを表します。
    pub fn value(&self, section: &str, key: &str) -> Option<Option<&str>> {
        let section = self.section(section)?;
        let pos = section.position(key)?;
        match &section.entries[pos] {
            Entry::Option { value, .. } => Some(value.as_deref()),
            Entry::Comment(_) => None,
        }
    }

    /// 値を持つオプションの値
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.value(section, key).flatten()
    }

    /// オプションを設定（セクションが無ければ末尾に作成）
    pub fn set(&mut self, section: &str, key: &str, value: Option<&str>) {
        let i = self.section_index_or_insert(section);
        let section = &mut self.sections[i];
        let entry = Entry::Option {
            key: key.to_string(),
            value: value.map(str::to_string),
        };
        match section.position(key) {
            Some(pos) => section.entries[pos] = entry,
            None => section.entries.push(entry),
        }
    }

    pub fn remove_option(&mut self, section: &str, key: &str) -> Removal {
        let Some(section) = self
            .sections
            .iter_mut()
            .find(|s| s.name.eq_ignore_ascii_case(section))
        else {
            return Removal::SectionNotFound;
        };

        match section.position(key) {
            Some(pos) => {
                section.entries.remove(pos);
                Removal::Removed
            }
            None => Removal::OptionNotFound,
        }
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    fn section(&self, name: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    fn section_index_or_insert(&mut self, name: &str) -> usize {
        match self
            .sections
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
        {
            Some(i) => i,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        }
    }
}

fn split_option(line: &str) -> (&str, Option<String>) {
    match line.find(['=', ':']) {
        Some(pos) => (
            line[..pos].trim(),
            Some(line[pos + 1..].trim().to_string()),
        ),
        None => (line, None),
    }
}

impl fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for comment in &self.preamble {
            writeln!(f, "{}", comment)?;
        }
        if !self.preamble.is_empty() {
            writeln!(f)?;
        }

        for section in &self.sections {
            writeln!(f, "[{}]", section.name)?;
            for entry in &section.entries {
                match entry {
                    Entry::Option {
                        key,
                        value: Some(value),
                    } => writeln!(f, "{}={}", key, value)?,
                    Entry::Option { key, value: None } => writeln!(f, "{}", key)?,
                    Entry::Comment(comment) => writeln!(f, "{}", comment)?,
                }
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"# MySQL Server Instance Configuration File
[client]
port=3307

[mysqld]
port = 3307
basedir="C:/Program Files/MySQL/MySQL Server 5.0/"
default-character-set=utf8
skip-locking
max_connections: 100
"#;

    #[test]
    fn test_parse_sections_and_values() {
        let doc = ConfigDocument::parse(SAMPLE).unwrap();

        assert_eq!(doc.section_names().collect::<Vec<_>>(), ["client", "mysqld"]);
        assert_eq!(doc.get("client", "port"), Some("3307"));
        assert_eq!(doc.get("mysqld", "port"), Some("3307"));
        assert_eq!(doc.get("mysqld", "max_connections"), Some("100"));
        assert_eq!(doc.value("mysqld", "skip-locking"), Some(None));
        assert!(doc.has_option("mysqld", "skip-locking"));
        assert!(!doc.has_option("mysqld", "log-bin"));
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let doc = ConfigDocument::parse("[MySQLd]\nDataDir=/data\n").unwrap();
        assert_eq!(doc.get("mysqld", "datadir"), Some("/data"));
    }

    #[test]
    fn test_remove_option_outcomes() {
        let mut doc = ConfigDocument::parse(SAMPLE).unwrap();

        assert_eq!(doc.remove_option("mysqld", "port"), Removal::Removed);
        assert_eq!(doc.remove_option("mysqld", "port"), Removal::OptionNotFound);
        assert_eq!(
            doc.remove_option("mysqld_safe", "port"),
            Removal::SectionNotFound
        );
        assert!(!doc.has_option("mysqld", "port"));
        assert!(doc.has_option("client", "port"));
    }

    #[test]
    fn test_set_creates_missing_section() {
        let mut doc = ConfigDocument::new();
        doc.set("mysqld", "datadir", Some("/var/lib/mysql/"));
        assert_eq!(doc.to_string(), "[mysqld]\ndatadir=/var/lib/mysql/\n\n");
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut doc = ConfigDocument::parse("[mysqld]\na=1\nb=2\n").unwrap();
        doc.set("mysqld", "a", Some("9"));
        assert_eq!(doc.to_string(), "[mysqld]\na=9\nb=2\n\n");
    }

    #[test]
    fn test_write_without_spaces_and_keeps_comments() {
        let doc = ConfigDocument::parse(SAMPLE).unwrap();
        let written = doc.to_string();

        assert!(written.starts_with("# MySQL Server Instance Configuration File\n\n[client]\n"));
        assert!(written.contains("port=3307\n"));
        assert!(written.contains("max_connections=100\n"));
        assert!(written.contains("\nskip-locking\n"));
        assert!(!written.contains(" = "));

        // 書き出した内容は同じドキュメントとして読み戻せる
        assert_eq!(ConfigDocument::parse(&written).unwrap(), doc);
    }

    #[test]
    fn test_option_before_section_is_error() {
        let err = ConfigDocument::parse("orphan=1\n[mysqld]\n").unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_unclosed_section_header() {
        let err = ConfigDocument::parse("[mysqld]\na=1\n[client\n").unwrap_err();
        assert_eq!(err.line, 3);
    }
}
