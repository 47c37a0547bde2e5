use std::path::PathBuf;

fn workspace_root() -> PathBuf {
    let crate_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    crate_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

#[test]
fn bundled_configs_load_and_build() {
    for rel in ["configs/lab.yaml"] {
        let path = workspace_root().join(rel);
        let config = mf_project::load(&path)
            .unwrap_or_else(|e| panic!("Failed to load {}: {}", path.display(), e));
        let setup = config
            .build()
            .unwrap_or_else(|e| panic!("Failed to build {}: {}", path.display(), e));
        assert!(!setup.lines.is_empty());
    }
}
