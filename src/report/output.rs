//! JSON output files and progress bars

use eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Pretty JSON, creating parent directories as needed
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).wrap_err_with(|| format!("Failed to write {}", path.display()))?;
    info!("💾 Saved {}", path.display());
    Ok(())
}

/// `default_name` under `data_dir` when no output is given; relative outputs
/// land under `data_dir` too, absolute ones are used as-is
pub fn resolve_output_path(data_dir: &Path, output: Option<&Path>, default_name: &str) -> PathBuf {
    match output {
        None => data_dir.join(default_name),
        Some(path) if path.is_absolute() || path.starts_with(data_dir) => path.to_path_buf(),
        Some(path) => data_dir.join(path),
    }
}

pub fn create_progress_bar(total_steps: u64, info: String) -> ProgressBar {
    let pb = ProgressBar::new(total_steps);
    let style = ProgressStyle::default_bar()
        .template(&format!(
            "{{elapsed_precise}} {} {{bar:40.cyan/blue}} {{pos}}/{{len}} {{msg}}",
            info
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    pb.set_style(style);
    pb.tick();
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_output_path() {
        let data = Path::new("data");
        assert_eq!(resolve_output_path(data, None, "0xpool.json"), PathBuf::from("data/0xpool.json"));
        assert_eq!(
            resolve_output_path(data, Some(Path::new("out.json")), "x.json"),
            PathBuf::from("data/out.json")
        );
        assert_eq!(
            resolve_output_path(data, Some(Path::new("data/out.json")), "x.json"),
            PathBuf::from("data/out.json")
        );
        assert_eq!(
            resolve_output_path(data, Some(Path::new("/tmp/out.json")), "x.json"),
            PathBuf::from("/tmp/out.json")
        );
    }

    #[test]
    fn test_write_json_creates_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/history.json");
        write_json(&path, &json!({ "daily_data": [1, 2] })).unwrap();

        let back: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back["daily_data"][1], json!(2));
    }
}
