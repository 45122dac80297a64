use std::fs;
use std::path::{Path, PathBuf};

const STORAGE_MODULE: &str = "src/adapters/sqlite_store.rs";
const PROVIDER_MODULE: &str = "src/adapters/rates_client.rs";

fn collect_rust_files(root: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rust_files(&path, out);
            continue;
        }
        if path.extension().and_then(|s| s.to_str()) == Some("rs") {
            out.push(path);
        }
    }
}

/// Every `(relative path, line number, trimmed line)` under `src/` matching `pattern`
fn find_in_src(pattern: impl Fn(&str) -> bool) -> Vec<(String, usize, String)> {
    let repo_root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut files = Vec::new();
    collect_rust_files(&repo_root.join("src"), &mut files);

    let mut hits = Vec::new();
    for file in files {
        let rel = file
            .strip_prefix(repo_root)
            .unwrap_or(&file)
            .to_string_lossy()
            .replace('\\', "/");
        let content = fs::read_to_string(&file).unwrap_or_default();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if pattern(trimmed) {
                hits.push((rel.clone(), idx + 1, trimmed.to_string()));
            }
        }
    }
    hits
}

#[test]
fn sql_is_only_issued_by_the_snapshot_store() {
    let offenders: Vec<String> = find_in_src(|line| {
        line.contains("sqlx::query") || line.contains("QueryBuilder::new")
    })
    .into_iter()
    .filter(|(rel, _, _)| rel != STORAGE_MODULE)
    .map(|(rel, line, text)| format!("{rel}:{line}: {text}"))
    .collect();

    assert!(
        offenders.is_empty(),
        "SQL issued outside the snapshot store:\n{}",
        offenders.join("\n")
    );
}

#[test]
fn http_client_is_only_built_by_the_provider() {
    let offenders: Vec<String> = find_in_src(|line| line.contains("reqwest::Client"))
        .into_iter()
        .filter(|(rel, _, _)| rel != PROVIDER_MODULE)
        .map(|(rel, line, text)| format!("{rel}:{line}: {text}"))
        .collect();

    assert!(
        offenders.is_empty(),
        "HTTP client constructed outside the rate provider:\n{}",
        offenders.join("\n")
    );
}
