//! Reference CSV serialization
//!
//! Format: leading `#`-prefixed `key=value` metadata lines describing how
//! the reference values were produced, then data rows
//! `channel,band,mean_or_median,std_or_scale,n`. Loaders must surface the
//! metadata so downstream z-scoring can refuse silent scale mismatches.

use std::path::Path;

use qeeg_core::{QeegError, QeegResult};
use qeeg_dsp::{ReferenceEntry, ReferenceStatistics};

/// Serialize reference statistics to CSV text.
pub fn reference_to_csv(stats: &ReferenceStatistics) -> String {
    let mut out = String::new();
    out.push_str("# qeeg reference\n");
    out.push_str(&format!("# n_files={}\n", stats.n_inputs));
    out.push_str(&format!("# log10_power={}\n", stats.log10_power as u8));
    out.push_str(&format!("# relative_power={}\n", stats.relative_power as u8));
    if stats.relative_power {
        out.push_str(&format!("# relative_fmin_hz={}\n", stats.relative_fmin_hz));
        out.push_str(&format!("# relative_fmax_hz={}\n", stats.relative_fmax_hz));
    }
    out.push_str(&format!("# robust={}\n", stats.robust as u8));
    out.push_str(&format!("# welch_nperseg={}\n", stats.welch_nperseg));
    out.push_str(&format!("# welch_overlap={}\n", stats.welch_overlap));
    out.push_str(&format!("# windowed_mode={}\n", stats.windowed as u8));
    out.push_str("# channel,band,mean,std,n\n");

    for e in &stats.entries {
        out.push_str(&format!("{},{},{},{},{}\n", e.channel, e.band, e.location, e.scale, e.n));
    }
    out
}

/// Write a reference CSV to disk.
pub fn write_reference_csv(stats: &ReferenceStatistics, path: &Path) -> QeegResult<()> {
    std::fs::write(path, reference_to_csv(stats))
        .map_err(|e| QeegError::Parse(format!("failed to write {}: {e}", path.display())))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim(), "1" | "true")
}

/// Parse reference CSV text back into statistics.
///
/// The metadata keys `log10_power`, `relative_power` and `robust` are
/// required so the preprocessing of the stored values is never ambiguous.
pub fn parse_reference_csv(text: &str) -> QeegResult<ReferenceStatistics> {
    let mut stats = ReferenceStatistics::default();
    let mut saw_log10 = false;
    let mut saw_relative = false;
    let mut saw_robust = false;

    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(comment) = line.strip_prefix('#') {
            let Some((key, value)) = comment.trim().split_once('=') else {
                continue; // free-form comment
            };
            let (key, value) = (key.trim(), value.trim());
            match key {
                "n_files" => stats.n_inputs = value.parse().unwrap_or(0),
                "log10_power" => {
                    stats.log10_power = parse_flag(value);
                    saw_log10 = true;
                }
                "relative_power" => {
                    stats.relative_power = parse_flag(value);
                    saw_relative = true;
                }
                "relative_fmin_hz" => stats.relative_fmin_hz = value.parse().unwrap_or(0.0),
                "relative_fmax_hz" => stats.relative_fmax_hz = value.parse().unwrap_or(0.0),
                "robust" => {
                    stats.robust = parse_flag(value);
                    saw_robust = true;
                }
                "welch_nperseg" => stats.welch_nperseg = value.parse().unwrap_or(0),
                "welch_overlap" => stats.welch_overlap = value.parse().unwrap_or(0.0),
                "windowed_mode" => stats.windowed = parse_flag(value),
                _ => {}
            }
            continue;
        }

        let cols: Vec<&str> = line.split(',').map(str::trim).collect();
        if cols.len() < 5 {
            return Err(QeegError::Parse(format!(
                "reference CSV line {}: expected channel,band,mean,std,n",
                lineno + 1
            )));
        }
        let location: f64 = cols[2].parse().map_err(|_| {
            QeegError::Parse(format!("reference CSV line {}: invalid mean", lineno + 1))
        })?;
        let scale: f64 = cols[3].parse().map_err(|_| {
            QeegError::Parse(format!("reference CSV line {}: invalid std", lineno + 1))
        })?;
        let n: usize = cols[4].parse().map_err(|_| {
            QeegError::Parse(format!("reference CSV line {}: invalid n", lineno + 1))
        })?;
        stats.entries.push(ReferenceEntry {
            channel: cols[0].to_string(),
            band: cols[1].to_string(),
            location,
            scale,
            n,
        });
    }

    if !saw_log10 || !saw_relative || !saw_robust {
        return Err(QeegError::Parse(
            "reference CSV is missing required metadata (log10_power, relative_power, robust)"
                .into(),
        ));
    }
    if stats.entries.is_empty() {
        return Err(QeegError::InsufficientData("reference CSV has no data rows".into()));
    }
    Ok(stats)
}

/// Load a reference CSV from disk.
pub fn load_reference_csv(path: &Path) -> QeegResult<ReferenceStatistics> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| QeegError::Parse(format!("failed to read {}: {e}", path.display())))?;
    parse_reference_csv(&text)
        .map_err(|e| QeegError::Parse(format!("{}: {e}", path.display())))
}

/// Compare a loaded reference's preprocessing metadata with the caller's
/// options. Returns human-readable mismatch descriptions; callers should
/// warn on each.
pub fn reference_option_mismatches(
    stats: &ReferenceStatistics,
    relative_power: bool,
    log10_power: bool,
) -> Vec<String> {
    let mut warnings = Vec::new();
    if stats.relative_power != relative_power {
        warnings.push(format!(
            "reference was built with relative_power={} but caller uses {}",
            stats.relative_power, relative_power
        ));
    }
    if stats.log10_power != log10_power {
        warnings.push(format!(
            "reference was built with log10_power={} but caller uses {}",
            stats.log10_power, log10_power
        ));
    }
    warnings
}
