//! Band-spec resolution with filesystem forms
//!
//! On top of the plain `name:min-max,...` and `iaf=NUM` forms handled by
//! `qeeg-core`, CLIs accept `iaf:PATH` where PATH points at a previous IAF
//! run: either a band-spec file, an `iaf_summary.txt` key=value file with
//! an `aggregate_iaf_hz` entry, or a directory containing one of those.

use std::path::Path;

use qeeg_core::{
    individualized_bands_from_iaf, parse_bands_spec, BandDefinition, IndividualizedBandsConfig,
    QeegError, QeegResult,
};

/// File holding a ready band-spec string (written by the IAF tool).
const BAND_SPEC_FILENAME: &str = "iaf_band_spec.txt";
/// Key=value summary holding the aggregate IAF.
const SUMMARY_FILENAME: &str = "iaf_summary.txt";
const SUMMARY_IAF_KEY: &str = "aggregate_iaf_hz";

fn first_content_line(text: &str) -> Option<&str> {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
}

fn bands_from_spec_file(path: &Path) -> QeegResult<Vec<BandDefinition>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| QeegError::Parse(format!("failed to read {}: {e}", path.display())))?;
    let line = first_content_line(&text).ok_or_else(|| {
        QeegError::Parse(format!("{} contains no band spec", path.display()))
    })?;
    parse_bands_spec(line)
}

fn iaf_from_summary_file(path: &Path) -> QeegResult<f64> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| QeegError::Parse(format!("failed to read {}: {e}", path.display())))?;
    for line in text.lines() {
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == SUMMARY_IAF_KEY {
                return value.trim().parse().map_err(|_| {
                    QeegError::Parse(format!(
                        "{}: invalid {SUMMARY_IAF_KEY} value \"{}\"",
                        path.display(),
                        value.trim()
                    ))
                });
            }
        }
    }
    Err(QeegError::Parse(format!(
        "{} has no {SUMMARY_IAF_KEY} entry",
        path.display()
    )))
}

fn bands_from_iaf_path(path: &Path) -> QeegResult<Vec<BandDefinition>> {
    if path.is_dir() {
        let spec_file = path.join(BAND_SPEC_FILENAME);
        if spec_file.is_file() {
            return bands_from_spec_file(&spec_file);
        }
        let summary_file = path.join(SUMMARY_FILENAME);
        if summary_file.is_file() {
            let iaf = iaf_from_summary_file(&summary_file)?;
            return iaf_bands(iaf, path);
        }
        return Err(QeegError::Parse(format!(
            "{} contains neither {BAND_SPEC_FILENAME} nor {SUMMARY_FILENAME}",
            path.display()
        )));
    }

    if path.is_file() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.contains("summary") {
            let iaf = iaf_from_summary_file(path)?;
            return iaf_bands(iaf, path);
        }
        // Either a numeric IAF or a ready spec string.
        let text = std::fs::read_to_string(path)
            .map_err(|e| QeegError::Parse(format!("failed to read {}: {e}", path.display())))?;
        let line = first_content_line(&text).ok_or_else(|| {
            QeegError::Parse(format!("{} is empty", path.display()))
        })?;
        if let Ok(iaf) = line.parse::<f64>() {
            return iaf_bands(iaf, path);
        }
        return parse_bands_spec(line);
    }

    Err(QeegError::Parse(format!("IAF path does not exist: {}", path.display())))
}

fn iaf_bands(iaf_hz: f64, origin: &Path) -> QeegResult<Vec<BandDefinition>> {
    let bands = individualized_bands_from_iaf(iaf_hz, &IndividualizedBandsConfig::default());
    if bands.is_empty() {
        return Err(QeegError::InvalidConfig(format!(
            "{}: IAF {iaf_hz} does not yield a valid band layout",
            origin.display()
        )));
    }
    log::info!("bands: individualized from IAF {iaf_hz:.2} Hz ({})", origin.display());
    Ok(bands)
}

/// Resolve a `--bands` argument, including the filesystem-backed `iaf:PATH`
/// form. An empty spec is rejected; callers substitute the default bands
/// before getting here.
pub fn resolve_bands_spec(spec: &str) -> QeegResult<Vec<BandDefinition>> {
    if let Some(path) = spec.strip_prefix("iaf:") {
        return bands_from_iaf_path(Path::new(path.trim()));
    }
    parse_bands_spec(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_spec_passthrough() {
        let bands = resolve_bands_spec("alpha:8-13").unwrap();
        assert_eq!(bands.len(), 1);
        assert_eq!(bands[0].name, "alpha");
    }

    #[test]
    fn test_iaf_directory_with_band_spec_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(BAND_SPEC_FILENAME),
            "delta:0.5-4,theta:4-8,alpha:8-12,beta:12-30,gamma:30-80\n",
        )
        .unwrap();
        let spec = format!("iaf:{}", dir.path().display());
        let bands = resolve_bands_spec(&spec).unwrap();
        assert_eq!(bands.len(), 5);
        assert!((bands[2].fmax_hz - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_iaf_directory_with_summary() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SUMMARY_FILENAME),
            "alpha_min_hz=7\naggregate_iaf_hz=10.5\n",
        )
        .unwrap();
        let spec = format!("iaf:{}", dir.path().display());
        let bands = resolve_bands_spec(&spec).unwrap();
        // alpha = [IAF-2, IAF+2]
        assert!((bands[2].fmin_hz - 8.5).abs() < 1e-12);
        assert!((bands[2].fmax_hz - 12.5).abs() < 1e-12);
    }

    #[test]
    fn test_iaf_numeric_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iaf.txt");
        std::fs::write(&path, "9.75\n").unwrap();
        let bands = resolve_bands_spec(&format!("iaf:{}", path.display())).unwrap();
        assert!((bands[2].fmin_hz - 7.75).abs() < 1e-12);
    }

    #[test]
    fn test_iaf_missing_path() {
        assert!(resolve_bands_spec("iaf:/nonexistent/dir").is_err());
    }
}
