#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use runtime_seal::expected_schema::CANONICAL_MODULE_ORDER;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const RUNTIME_DIR: &str = "chain/src/runtime";

pub struct TestRepo {
    tmp: TempDir,
}

impl TestRepo {
    /// Nine canonical module files registered in canonical order.
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let repo = Self { tmp };
        fs::create_dir_all(repo.runtime_dir()).expect("create runtime dir");
        for id in CANONICAL_MODULE_ORDER {
            fs::write(repo.module_path(id), format!("//! {id}\npub fn init() {{}}\n"))
                .expect("write module");
        }
        fs::write(repo.module_path("version"), "pub const V: u32 = 1;\n").expect("write version");
        fs::write(repo.root().join("Cargo.toml"), "[workspace]\n").expect("write Cargo.toml");
        repo.write_source(CANONICAL_MODULE_ORDER, 1);
        repo
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn runtime_dir(&self) -> PathBuf {
        self.root().join(RUNTIME_DIR)
    }

    pub fn source_path(&self) -> PathBuf {
        self.runtime_dir().join("mod.rs")
    }

    pub fn module_path(&self, id: &str) -> PathBuf {
        self.runtime_dir().join(format!("{id}.rs"))
    }

    pub fn seal_path(&self) -> PathBuf {
        self.root().join("REPO_STATE_SEAL.json")
    }

    pub fn write_source(&self, order: &[&str], version: u32) {
        let mut text = String::from("pub mod version;\n");
        for id in order {
            text.push_str(&format!("pub mod {id};\n"));
        }
        text.push_str(&format!(
            "\npub const RUNTIME_VERSION: u32 = {version};\npub const EXPECTED_MODULE_COUNT: usize = {};\n",
            order.len()
        ));
        fs::write(self.source_path(), text).expect("write mod.rs");
    }

    pub fn swap_declarations(&self, a: usize, b: usize) {
        let mut order = CANONICAL_MODULE_ORDER.to_vec();
        order.swap(a, b);
        self.write_source(&order, 1);
    }

    pub fn flip_byte(&self, id: &str) {
        let path = self.module_path(id);
        let mut bytes = fs::read(&path).expect("read module");
        bytes[0] ^= 0x01;
        fs::write(path, bytes).expect("write module");
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("runtime-seal");
        cmd.arg("--repo-root")
            .arg(self.root())
            .env_remove("RUST_LOG")
            .env_remove("RUNTIME_SEAL_REQUIRE_SEAL")
            .env_remove("RUNTIME_SEAL_REPO_ROOT");
        cmd
    }
}
