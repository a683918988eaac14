//! Run-metadata JSON
//!
//! Every CLI run writes a small `*_run_meta.json` next to its outputs so
//! tools can be chained and UIs can discover results. The schema is kept
//! minimal and stable (the key set predates this implementation and is
//! shared with older toolchains, which is why `CppStandard` survives as a
//! legacy key). Readers only consult the top-level object and sanitize the
//! `Outputs` list before using it as relative paths.

use std::path::{Path, PathBuf};

use qeeg_core::{QeegError, QeegResult};
use serde_json::{json, Value};

/// Build identification written into run-meta files. Thread this through
/// from the binary rather than reading global state.
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub tool: String,
    pub version: String,
    pub git_describe: String,
    pub build_type: String,
    pub compiler: String,
}

impl BuildInfo {
    pub fn new(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            git_describe: option_env!("QEEG_GIT_DESCRIBE").unwrap_or("").to_string(),
            build_type: if cfg!(debug_assertions) { "Debug" } else { "Release" }.to_string(),
            compiler: "rustc".to_string(),
        }
    }
}

/// Summary of a run-meta file. Missing keys stay empty.
#[derive(Debug, Clone, Default)]
pub struct RunMetaSummary {
    pub tool: String,
    pub timestamp_local: String,
    pub timestamp_utc: String,
    pub version: String,
    pub git_describe: String,
    pub build_type: String,
    pub compiler: String,
    pub output_dir: String,
    pub input_path: Option<String>,
    /// Sanitized relative output paths.
    pub outputs: Vec<String>,
}

/// Write a run-meta JSON file.
///
/// `outputs` entries must be paths relative to `outdir`.
pub fn write_run_meta_json(
    json_path: &Path,
    build: &BuildInfo,
    outdir: &str,
    input_path: Option<&str>,
    outputs: &[String],
) -> QeegResult<()> {
    let meta = json!({
        "Tool": build.tool,
        "QeegVersion": build.version,
        "GitDescribe": build.git_describe,
        "BuildType": build.build_type,
        "Compiler": build.compiler,
        "CppStandard": "",
        "TimestampLocal": chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        "TimestampUTC": chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        "OutputDir": outdir,
        "InputPath": input_path.map(Value::from).unwrap_or(Value::Null),
        "Outputs": outputs,
    });

    let text = serde_json::to_string_pretty(&meta)
        .map_err(|e| QeegError::Parse(format!("run meta serialization failed: {e}")))?;
    std::fs::write(json_path, text)
        .map_err(|e| QeegError::Parse(format!("failed to write {}: {e}", json_path.display())))?;
    Ok(())
}

/// An output entry is kept only when it is a sane relative path: no NULs,
/// no `..` segments, not absolute, no drive prefix. Backslashes are
/// normalized to `/` first.
fn sanitize_output_entry(raw: &str) -> Option<String> {
    if raw.contains('\0') {
        return None;
    }
    let normalized = raw.replace('\\', "/");
    if normalized.is_empty() || normalized.starts_with('/') {
        return None;
    }
    // Windows drive prefix ("C:...").
    let bytes = normalized.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        return None;
    }
    if normalized.split('/').any(|seg| seg == "..") {
        return None;
    }
    Some(normalized)
}

fn top_level_str(root: &Value, key: &str) -> String {
    root.get(key).and_then(Value::as_str).unwrap_or("").to_string()
}

/// Parse a run-meta JSON document. Only top-level keys are consulted, so
/// nested objects with colliding keys are ignored.
pub fn parse_run_meta(text: &str) -> QeegResult<RunMetaSummary> {
    let root: Value = serde_json::from_str(text)
        .map_err(|e| QeegError::Parse(format!("invalid run meta JSON: {e}")))?;
    if !root.is_object() {
        return Err(QeegError::Parse("run meta root is not an object".into()));
    }

    let mut version = top_level_str(&root, "QeegVersion");
    if version.is_empty() {
        version = top_level_str(&root, "Version");
    }

    let input_path = match root.get("InputPath") {
        Some(Value::String(s)) => Some(s.clone()),
        _ => match root.get("input_path") {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        },
    };

    let outputs = root
        .get("Outputs")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .filter_map(sanitize_output_entry)
                .collect()
        })
        .unwrap_or_default();

    Ok(RunMetaSummary {
        tool: top_level_str(&root, "Tool"),
        timestamp_local: top_level_str(&root, "TimestampLocal"),
        timestamp_utc: top_level_str(&root, "TimestampUTC"),
        version,
        git_describe: top_level_str(&root, "GitDescribe"),
        build_type: top_level_str(&root, "BuildType"),
        compiler: top_level_str(&root, "Compiler"),
        output_dir: top_level_str(&root, "OutputDir"),
        input_path,
        outputs,
    })
}

/// Read and parse a run-meta JSON file.
pub fn read_run_meta(path: &Path) -> QeegResult<RunMetaSummary> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| QeegError::Parse(format!("failed to read {}: {e}", path.display())))?;
    parse_run_meta(&text)
        .map_err(|e| QeegError::Parse(format!("{}: {e}", path.display())))
}

/// Resolve a run-meta's sanitized outputs against the file's directory.
pub fn run_meta_output_paths(meta_path: &Path, summary: &RunMetaSummary) -> Vec<PathBuf> {
    let base = meta_path.parent().unwrap_or_else(|| Path::new("."));
    summary.outputs.iter().map(|rel| base.join(rel)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map_run_meta.json");
        let build = BuildInfo::new("qeeg-topomap");
        write_run_meta_json(
            &path,
            &build,
            "out_map",
            Some("input.csv"),
            &["topomap.csv".to_string(), "bands/alpha.csv".to_string()],
        )
        .unwrap();

        let meta = read_run_meta(&path).unwrap();
        assert_eq!(meta.tool, "qeeg-topomap");
        assert_eq!(meta.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(meta.input_path.as_deref(), Some("input.csv"));
        assert_eq!(meta.outputs, vec!["topomap.csv", "bands/alpha.csv"]);
        assert!(!meta.timestamp_utc.is_empty());
        assert!(!meta.timestamp_local.is_empty());
    }

    #[test]
    fn test_null_input_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_run_meta.json");
        write_run_meta_json(&path, &BuildInfo::new("t"), "out", None, &[]).unwrap();
        let meta = read_run_meta(&path).unwrap();
        assert!(meta.input_path.is_none());
    }

    #[test]
    fn test_outputs_sanitized() {
        let text = r#"{
            "Tool": "t",
            "Outputs": [
                "ok.csv",
                "sub\\dir\\file.csv",
                "../escape.csv",
                "/abs/path.csv",
                "C:evil.csv",
                "nested/../also_escape.csv",
                "bad\u0000nul.csv"
            ]
        }"#;
        let meta = parse_run_meta(text).unwrap();
        assert_eq!(meta.outputs, vec!["ok.csv", "sub/dir/file.csv"]);
    }

    #[test]
    fn test_top_level_only_lookup() {
        let text = r#"{
            "Nested": { "Tool": "wrong", "Outputs": ["wrong.csv"] },
            "Tool": "right"
        }"#;
        let meta = parse_run_meta(text).unwrap();
        assert_eq!(meta.tool, "right");
        assert!(meta.outputs.is_empty());
    }

    #[test]
    fn test_key_like_substring_in_string_body_ignored() {
        // A real JSON parser never mistakes key-like text inside a string
        // value for a key.
        let text = r#"{ "Note": "\"Tool\": \"fake\"", "Tool": "genuine" }"#;
        let meta = parse_run_meta(text).unwrap();
        assert_eq!(meta.tool, "genuine");
    }

    #[test]
    fn test_version_fallback() {
        let meta = parse_run_meta(r#"{ "Version": "0.9.1" }"#).unwrap();
        assert_eq!(meta.version, "0.9.1");
    }
}
