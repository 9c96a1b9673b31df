use assert_cmd::Command;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const DEFAULT_SCHEMA: &str = "CREATE DATABASE bb2_default;\nCREATE DATABASE bb2_test;\n";

/// docker-compose のスタブ（引数を記録するだけ）
const COMPOSE_STUB: &str = r#"echo "compose $*" >> "$STUB_DIR/calls.log"
"#;

/// docker のスタブ
///
/// `logs` は起動完了のログを stderr に出し、`exec` はダンプなら固定の内容を出力、
/// インポートなら stdin を imported.sql に保存します。
const DOCKER_STUB: &str = r#"echo "docker $1" >> "$STUB_DIR/calls.log"
case "$1" in
  logs)
    echo "[Note] mysqld: ready for connections." >&2
    ;;
  exec)
    case "$6" in
      mysqldump*) echo "-- dump from $3: $6" ;;
      *) cat >> "$STUB_DIR/imported.sql" ;;
    esac
    ;;
esac
"#;

/// スタブのコマンドを使うテスト用デプロイメント
pub struct TestDeployment {
    pub root: TempDir,
}

impl TestDeployment {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let deployment = Self { root };

        let base = deployment.base_dir();
        let deploy = base.join("server/jboss/server/default/deploy");
        let db = base.join("server/db");
        fs::create_dir_all(&deploy).unwrap();
        fs::create_dir_all(&db).unwrap();
        fs::create_dir_all(base.join("data")).unwrap();
        fs::create_dir_all(deployment.stub_dir()).unwrap();

        fs::write(base.join("docker-compose.yml"), "version: '2'\n").unwrap();
        fs::write(base.join(".env"), "# bizbox\nSERVICE_DATA_DIR=./data\n").unwrap();
        fs::write(
            deploy.join("mysql-ds.xml"),
            "<connection-url>jdbc:mysql://localhost:3307/bb2_default</connection-url>\n",
        )
        .unwrap();
        fs::write(
            db.join("my.ini"),
            "[client]\nport=3307\n\n[mysqld]\nport=3307\nbasedir=C:/bizbox/mysql\n",
        )
        .unwrap();
        fs::write(db.join("database.sql"), DEFAULT_SCHEMA).unwrap();

        deployment.write_stub("docker-compose", COMPOSE_STUB);
        deployment.write_stub("docker", DOCKER_STUB);
        deployment
    }

    pub fn base_dir(&self) -> PathBuf {
        self.root.path().join("bizbox")
    }

    pub fn stub_dir(&self) -> PathBuf {
        self.root.path().join("stubs")
    }

    /// スタブスクリプトを書き込む（既存のものは置き換え）
    pub fn write_stub(&self, name: &str, body: &str) {
        let path = self.stub_dir().join(name);
        fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("bizbox").unwrap();
        cmd.current_dir(self.base_dir())
            .env("STUB_DIR", self.stub_dir())
            .env("BIZBOX_COMPOSE", self.stub_dir().join("docker-compose"))
            .env("BIZBOX_DOCKER", self.stub_dir().join("docker"))
            .env_remove("BIZBOX_HOME")
            .env_remove("BIZBOX_READY_TIMEOUT")
            .env_remove("BIZBOX_SETTLE_SECS")
            .env_remove("BIZBOX_IMPORT_PAUSE_SECS")
            .env_remove("RUST_LOG");
        cmd
    }

    /// スタブが記録した呼び出し（呼び出しがなければ空）
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.stub_dir().join("calls.log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    #[allow(dead_code)]
    pub fn imported_sql(&self) -> Option<String> {
        fs::read_to_string(self.stub_dir().join("imported.sql")).ok()
    }

    #[allow(dead_code)]
    pub fn files_in(&self, dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        files.sort();
        files
    }
}
