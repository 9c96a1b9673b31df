//! 本番系→テスト系コピーの結果

use std::fmt;

/// 1段階分の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    /// ダンプに失敗したためインポートは行っていない
    DumpFailed(String),
    ImportFailed(String),
}

impl StageOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StageOutcome::Completed)
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Completed => write!(f, "完了"),
            StageOutcome::DumpFailed(reason) => write!(f, "ダンプ失敗: {}", reason),
            StageOutcome::ImportFailed(reason) => write!(f, "インポート失敗: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub source: String,
    pub target: String,
    pub outcome: StageOutcome,
}

/// 全段階の結果（失敗があっても後続の段階は実行される）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub stages: Vec<StageReport>,
}

impl MigrationReport {
    pub fn is_success(&self) -> bool {
        self.stages.iter().all(|stage| stage.outcome.is_completed())
    }

    pub fn failures(&self) -> impl Iterator<Item = &StageReport> {
        self.stages
            .iter()
            .filter(|stage| !stage.outcome.is_completed())
    }
}
