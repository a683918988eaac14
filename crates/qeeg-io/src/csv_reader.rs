//! Recording CSV/TSV reader
//!
//! Dense text exports: a header row of channel names followed by one sample
//! row per line. `#` lines are comments; comma, semicolon and tab
//! delimiters are accepted. The sampling rate is not stored in the file and
//! must be supplied by the caller.

use std::path::Path;

use qeeg_core::{QeegError, QeegResult, Recording, Sample};

fn detect_delimiter(line: &str) -> char {
    if line.contains('\t') {
        '\t'
    } else if line.contains(';') {
        ';'
    } else {
        ','
    }
}

/// Parse a recording from CSV text. The first non-comment row carries the
/// channel names.
pub fn parse_recording_csv(text: &str, fs_hz: f64) -> QeegResult<Recording> {
    if !(fs_hz > 0.0) {
        return Err(QeegError::InvalidConfig(format!(
            "CSV input needs a sampling rate > 0 (got {fs_hz})"
        )));
    }

    let mut channel_names: Option<Vec<String>> = None;
    let mut delimiter = ',';
    let mut data: Vec<Vec<Sample>> = Vec::new();

    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let names = match &channel_names {
            None => {
                delimiter = detect_delimiter(line);
                let names: Vec<String> =
                    line.split(delimiter).map(|c| c.trim().to_string()).collect();
                if names.is_empty() || names.iter().any(String::is_empty) {
                    return Err(QeegError::Parse(format!(
                        "CSV line {}: invalid channel-name header",
                        lineno + 1
                    )));
                }
                data = vec![Vec::new(); names.len()];
                channel_names = Some(names);
                continue;
            }
            Some(names) => names,
        };

        let cols: Vec<&str> = line.split(delimiter).map(str::trim).collect();
        if cols.len() != names.len() {
            return Err(QeegError::Structural(format!(
                "CSV line {}: {} columns, expected {}",
                lineno + 1,
                cols.len(),
                names.len()
            )));
        }
        for (ch, col) in cols.iter().enumerate() {
            let v: f64 = col.parse().map_err(|_| {
                QeegError::Parse(format!("CSV line {}: invalid sample \"{col}\"", lineno + 1))
            })?;
            data[ch].push(v as Sample);
        }
    }

    let Some(channel_names) = channel_names else {
        return Err(QeegError::InsufficientData("CSV contained no data".into()));
    };
    if data.first().is_none_or(Vec::is_empty) {
        return Err(QeegError::InsufficientData("CSV contained no sample rows".into()));
    }

    Recording::new(fs_hz, channel_names, data)
}

/// Read a recording CSV from disk.
pub fn read_recording_csv(path: &Path, fs_hz: f64) -> QeegResult<Recording> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| QeegError::Parse(format!("failed to read {}: {e}", path.display())))?;
    parse_recording_csv(&text, fs_hz)
        .map_err(|e| QeegError::Parse(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_csv() {
        let text = "# export\nFp1,Fp2,Cz\n0.1,0.2,0.3\n0.4,0.5,0.6\n";
        let rec = parse_recording_csv(text, 100.0).unwrap();
        assert_eq!(rec.n_channels(), 3);
        assert_eq!(rec.n_samples(), 2);
        assert_eq!(rec.channel_names[2], "Cz");
        assert!((rec.data[1][1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_parse_tsv() {
        let text = "a\tb\n1\t2\n3\t4\n";
        let rec = parse_recording_csv(text, 10.0).unwrap();
        assert_eq!(rec.n_channels(), 2);
        assert_eq!(rec.n_samples(), 2);
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let text = "a,b\n1,2\n3\n";
        assert!(parse_recording_csv(text, 10.0).is_err());
    }

    #[test]
    fn test_rejects_missing_fs() {
        assert!(parse_recording_csv("a\n1\n", 0.0).is_err());
    }

    #[test]
    fn test_rejects_empty() {
        assert!(parse_recording_csv("# nothing\n", 10.0).is_err());
        assert!(parse_recording_csv("a,b\n", 10.0).is_err());
    }
}
