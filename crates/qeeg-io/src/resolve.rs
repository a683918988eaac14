//! Selector-augmented input resolution
//!
//! CLIs accept `PATH#SELECTOR` where PATH is a file, a directory or a
//! `*_run_meta.json` manifest and SELECTOR narrows the candidate set (exact
//! filename, substring, or a `*`/`?` glob). Nested run-meta manifests are
//! followed to a bounded depth with cycle protection, so pipeline workspace
//! manifests resolve to their concrete files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use qeeg_core::{QeegError, QeegResult};

use crate::run_meta::{read_run_meta, run_meta_output_paths};

/// Maximum depth when following run-meta manifests that list other
/// manifests.
const MAX_RUN_META_DEPTH: usize = 8;

/// Resolution options.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Allowed file extensions including the dot, compared
    /// case-insensitively.
    pub allowed_extensions: Vec<String>,
    /// Exact base filenames preferred when several candidates match.
    pub preferred_filenames: Vec<String>,
    /// Substrings used as a secondary ranking signal.
    pub preferred_contains: Vec<String>,
    /// Accept any allowed candidate when no preference matches.
    pub allow_any: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            allowed_extensions: vec![".csv".into(), ".tsv".into()],
            preferred_filenames: Vec::new(),
            preferred_contains: Vec::new(),
            allow_any: true,
        }
    }
}

/// A resolved input path plus a note describing how it was found.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub path: PathBuf,
    pub note: String,
}

/// Case-insensitive glob match supporting `*` and `?`.
pub fn glob_match(pattern: &str, name: &str) -> bool {
    fn inner(p: &[u8], n: &[u8]) -> bool {
        match (p.first(), n.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                inner(&p[1..], n) || (!n.is_empty() && inner(p, &n[1..]))
            }
            (Some(b'?'), Some(_)) => inner(&p[1..], &n[1..]),
            (Some(&pc), Some(&nc)) if pc.eq_ignore_ascii_case(&nc) => inner(&p[1..], &n[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), name.as_bytes())
}

fn file_name_of(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
}

fn has_allowed_extension(path: &Path, opt: &ResolveOptions) -> bool {
    let name = file_name_of(path).to_lowercase();
    opt.allowed_extensions.iter().any(|ext| name.ends_with(&ext.to_lowercase()))
}

fn is_run_meta(path: &Path) -> bool {
    file_name_of(path).to_lowercase().ends_with("_run_meta.json")
}

/// Collect candidate files from a path: a plain file is itself a
/// candidate, a run-meta manifest contributes its outputs (recursively),
/// and a directory contributes its file entries plus any manifests inside.
fn collect_candidates(
    path: &Path,
    opt: &ResolveOptions,
    depth: usize,
    visited: &mut HashSet<PathBuf>,
    out: &mut Vec<PathBuf>,
) -> QeegResult<()> {
    if depth > MAX_RUN_META_DEPTH {
        log::warn!(
            "run-meta nesting deeper than {MAX_RUN_META_DEPTH} levels at {}; stopping",
            path.display()
        );
        return Ok(());
    }
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Ok(()); // cycle
    }

    if path.is_dir() {
        let entries = std::fs::read_dir(path).map_err(|e| {
            QeegError::Parse(format!("failed to list directory {}: {e}", path.display()))
        })?;
        for entry in entries.flatten() {
            let child = entry.path();
            if child.is_dir() {
                continue;
            }
            if is_run_meta(&child) {
                collect_candidates(&child, opt, depth + 1, visited, out)?;
            } else if has_allowed_extension(&child, opt) {
                out.push(child);
            }
        }
        return Ok(());
    }

    if is_run_meta(path) {
        let meta = read_run_meta(path)?;
        for output in run_meta_output_paths(path, &meta) {
            if is_run_meta(&output) {
                collect_candidates(&output, opt, depth + 1, visited, out)?;
            } else if has_allowed_extension(&output, opt) {
                out.push(output);
            }
        }
        return Ok(());
    }

    if has_allowed_extension(path, opt) {
        out.push(path.to_path_buf());
    }
    Ok(())
}

fn selector_matches(selector: &str, name: &str) -> bool {
    if name.eq_ignore_ascii_case(selector) {
        return true;
    }
    if selector.contains('*') || selector.contains('?') {
        return glob_match(selector, name);
    }
    name.to_lowercase().contains(&selector.to_lowercase())
}

fn score_candidate(path: &Path, opt: &ResolveOptions) -> i32 {
    let name = file_name_of(path).to_lowercase();
    if opt
        .preferred_filenames
        .iter()
        .any(|p| name == p.to_lowercase())
    {
        return 100;
    }
    if opt
        .preferred_contains
        .iter()
        .any(|p| name.contains(&p.to_lowercase()))
    {
        return 10;
    }
    if opt.allow_any {
        1
    } else {
        0
    }
}

/// Resolve a `PATH#SELECTOR` input spec to a concrete file.
pub fn resolve_input(spec: &str, opt: &ResolveOptions) -> QeegResult<ResolvedInput> {
    // A literal path wins over selector splitting ('#' is legal in names).
    let (base, selector) = if Path::new(spec).exists() {
        (spec, None)
    } else {
        match spec.rsplit_once('#') {
            Some((base, sel)) if !sel.is_empty() => (base, Some(sel)),
            _ => (spec, None),
        }
    };

    let base_path = Path::new(base);
    if !base_path.exists() {
        return Err(QeegError::Parse(format!("input path does not exist: {base}")));
    }

    // A direct file with an allowed extension needs no search.
    if base_path.is_file() && !is_run_meta(base_path) {
        if !has_allowed_extension(base_path, opt) {
            return Err(QeegError::Parse(format!(
                "input file {} does not have an accepted extension ({})",
                base_path.display(),
                opt.allowed_extensions.join(", ")
            )));
        }
        return Ok(ResolvedInput {
            path: base_path.to_path_buf(),
            note: String::new(),
        });
    }

    let mut candidates = Vec::new();
    let mut visited = HashSet::new();
    collect_candidates(base_path, opt, 0, &mut visited, &mut candidates)?;
    candidates.sort();
    candidates.dedup();

    if let Some(selector) = selector {
        candidates.retain(|c| selector_matches(selector, &file_name_of(c)));
        if candidates.is_empty() {
            return Err(QeegError::Parse(format!(
                "no file matching selector \"{selector}\" under {base}"
            )));
        }
        // Exact filename beats substring/glob matches.
        if let Some(exact) = candidates
            .iter()
            .find(|c| file_name_of(c).eq_ignore_ascii_case(selector))
        {
            return Ok(ResolvedInput {
                path: exact.clone(),
                note: format!("selected \"{selector}\""),
            });
        }
        return Ok(ResolvedInput {
            path: candidates[0].clone(),
            note: format!("selected \"{selector}\""),
        });
    }

    let best = candidates
        .iter()
        .map(|c| (score_candidate(c, opt), c))
        .filter(|(score, _)| *score > 0)
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(a.1)));

    match best {
        Some((_, path)) => Ok(ResolvedInput {
            path: path.clone(),
            note: format!("resolved from {base}"),
        }),
        None => Err(QeegError::Parse(format!("no usable input file under {base}"))),
    }
}
