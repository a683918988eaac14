//! Electrode montages
//!
//! Maps normalized channel names to 2D unit-disk coordinates. Because keys
//! go through the shared channel-name normalization, legacy labels (T3, T5,
//! ...) and reference-suffixed exports resolve to the same electrode as
//! their modern names.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use qeeg_core::{normalize_channel_name, QeegError, QeegResult};

use crate::geometry::Vec2;

/// Named electrode positions on the unit disk.
#[derive(Debug, Clone, Default)]
pub struct Montage {
    positions: HashMap<String, Vec2>,
}

impl Montage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a position under the normalized channel name.
    pub fn insert(&mut self, name: &str, pos: Vec2) {
        self.positions.insert(normalize_channel_name(name), pos);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(&normalize_channel_name(name))
    }

    pub fn get(&self, name: &str) -> Option<Vec2> {
        self.positions.get(&normalize_channel_name(name)).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Normalized channel names, sorted.
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.positions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Built-in approximate 19-channel 10-20 montage (unit-circle head
    /// model). For clinical-grade work use digitized electrode locations.
    pub fn builtin_standard_1020_19() -> Self {
        let mut m = Self::new();
        let coords: [(&str, f64, f64); 19] = [
            ("Fp1", -0.50, 0.92),
            ("Fp2", 0.50, 0.92),
            ("F7", -0.92, 0.62),
            ("F3", -0.42, 0.55),
            ("Fz", 0.00, 0.58),
            ("F4", 0.42, 0.55),
            ("F8", 0.92, 0.62),
            ("T7", -1.00, 0.00),
            ("C3", -0.52, 0.02),
            ("Cz", 0.00, 0.00),
            ("C4", 0.52, 0.02),
            ("T8", 1.00, 0.00),
            ("P7", -0.92, -0.55),
            ("P3", -0.42, -0.52),
            ("Pz", 0.00, -0.56),
            ("P4", 0.42, -0.52),
            ("P8", 0.92, -0.55),
            ("O1", -0.50, -0.92),
            ("O2", 0.50, -0.92),
        ];
        for (name, x, y) in coords {
            m.insert(name, Vec2 { x, y });
        }
        m
    }

    /// Parse a montage from CSV text: `name,x,y` rows, `#` comments, an
    /// optional header row, comma or semicolon delimiters.
    pub fn parse_csv(text: &str) -> QeegResult<Self> {
        let mut m = Self::new();

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let delim = if line.contains(';') { ';' } else { ',' };
            let cols: Vec<&str> = line.split(delim).map(str::trim).collect();
            if cols.len() < 3 {
                return Err(QeegError::Parse(format!(
                    "montage line {}: expected name{delim}x{delim}y",
                    lineno + 1
                )));
            }

            // Header row.
            if m.is_empty()
                && (cols[0].eq_ignore_ascii_case("name") || cols[0].eq_ignore_ascii_case("channel"))
                && cols[1].eq_ignore_ascii_case("x")
                && cols[2].eq_ignore_ascii_case("y")
            {
                continue;
            }

            let x: f64 = cols[1].parse().map_err(|_| {
                QeegError::Parse(format!("montage line {}: invalid x \"{}\"", lineno + 1, cols[1]))
            })?;
            let y: f64 = cols[2].parse().map_err(|_| {
                QeegError::Parse(format!("montage line {}: invalid y \"{}\"", lineno + 1, cols[2]))
            })?;
            m.insert(cols[0], Vec2 { x, y });
        }

        if m.is_empty() {
            return Err(QeegError::Parse("montage CSV contained no channels".into()));
        }
        Ok(m)
    }

    /// Load a montage CSV from disk.
    pub fn load_csv(path: &Path) -> QeegResult<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            QeegError::Parse(format!("failed to open montage CSV {}: {e}", path.display()))
        })?;
        let mut text = String::new();
        for line in std::io::BufReader::new(file).lines() {
            text.push_str(&line?);
            text.push('\n');
        }
        Self::parse_csv(&text)
            .map_err(|e| QeegError::Parse(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_builtin_montage_aliases() {
        let m = Montage::builtin_standard_1020_19();
        assert_eq!(m.len(), 19);
        // Legacy names resolve to the same electrodes as modern ones.
        assert!(m.contains("T3"));
        assert!(m.contains("T7"));
        assert_eq!(m.get("T3"), m.get("T7"));
        assert_eq!(m.get("T5"), m.get("P7"));
        assert!(m.contains("EEG Cz-REF"));
    }

    #[test]
    fn test_parse_csv_with_header_and_comments() {
        let text = "# approximate positions\nname,x,y\nFp1,-0.5,0.92\nFp2,0.5,0.92\nCz,0,0\n";
        let m = Montage::parse_csv(text).unwrap();
        assert_eq!(m.len(), 3);
        assert_abs_diff_eq!(m.get("fp1").unwrap().x, -0.5);
    }

    #[test]
    fn test_parse_csv_semicolon_delimiter() {
        let m = Montage::parse_csv("Cz;0;0\nPz;0.0;-0.56\n").unwrap();
        assert_eq!(m.len(), 2);
        assert_abs_diff_eq!(m.get("Pz").unwrap().y, -0.56);
    }

    #[test]
    fn test_parse_csv_rejects_garbage() {
        assert!(Montage::parse_csv("Cz,0\n").is_err());
        assert!(Montage::parse_csv("Cz,zero,0\n").is_err());
        assert!(Montage::parse_csv("# only comments\n").is_err());
    }

    #[test]
    fn test_load_csv_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("montage.csv");
        std::fs::write(&path, "name,x,y\nCz,0,0\nOz,0,-0.9\n").unwrap();
        let m = Montage::load_csv(&path).unwrap();
        assert_eq!(m.len(), 2);
        assert!(m.contains("oz"));
        assert!(Montage::load_csv(&dir.path().join("missing.csv")).is_err());
    }
}
