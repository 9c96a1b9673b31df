//! 操作対象のデータベース

/// 本番系データベース
pub const DEFAULT_DATABASE: &str = "bb2_default";
/// 本番系の補助データベース
pub const DEFAULT_SG_DATABASE: &str = "bb2_default_sg";
/// テスト系データベース
pub const TEST_DATABASE: &str = "bb2_test";
/// テスト系の補助データベース
pub const TEST_SG_DATABASE: &str = "bb2_test_sg";
/// 認証情報・権限を保持するシステムデータベース
pub const SYSTEM_DATABASE: &str = "mysql";

/// バックアップに含めるデータベース
pub const BACKUP_DATABASES: [&str; 5] = [
    DEFAULT_DATABASE,
    DEFAULT_SG_DATABASE,
    TEST_DATABASE,
    TEST_SG_DATABASE,
    SYSTEM_DATABASE,
];

/// 本番系からテスト系へのコピー順（コピー元, コピー先）
pub const MIGRATION_STAGES: [(&str, &str); 2] = [
    (DEFAULT_DATABASE, TEST_DATABASE),
    (DEFAULT_SG_DATABASE, TEST_SG_DATABASE),
];
