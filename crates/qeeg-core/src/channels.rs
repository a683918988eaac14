//! Channel-name normalization for 10-20 / 10-10 style labels
//!
//! EEG exports disagree on channel naming: "EEG Fp1-REF", "Fp1", "fp1 " and
//! "T3" can all refer to the same electrode. All identity comparisons in this
//! workspace go through [`normalize_channel_name`] so that montage lookups,
//! reference keys and CLI channel selectors agree.

/// Reference/derivation suffixes that are stripped when they follow a
/// separator, e.g. "C3-REF", "C3-LE", "C3-AVG".
const REFERENCE_SUFFIXES: [&str; 4] = ["ref", "le", "ar", "avg"];

/// Legacy 10-20 aliases mapped to their modern 10-10 names.
const LEGACY_ALIASES: [(&str, &str); 4] = [("t3", "t7"), ("t4", "t8"), ("t5", "p7"), ("t6", "p8")];

/// Normalize a raw channel label to its canonical lowercase form.
///
/// Steps:
/// 1. lowercase and trim
/// 2. strip a leading "EEG" modality prefix ("EEG Fp1", "EEG-Fp1")
/// 3. strip a trailing reference affix ("-REF", "-LE", "-AR", "-AVG")
/// 4. drop remaining whitespace/punctuation
/// 5. map legacy aliases (T3→T7, T4→T8, T5→P7, T6→P8)
pub fn normalize_channel_name(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let mut s = lower.as_str();

    if let Some(rest) = s.strip_prefix("eeg") {
        // Only treat "eeg" as a modality prefix when something follows it.
        let rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '-' || c == '_');
        if !rest.is_empty() {
            s = rest;
        }
    }

    let mut name = s.to_string();
    for sep in ['-', '_', ' '] {
        if let Some(pos) = name.rfind(sep) {
            let tail = name[pos + 1..].trim();
            if REFERENCE_SUFFIXES.contains(&tail) {
                name.truncate(pos);
                break;
            }
        }
    }

    let mut cleaned: String = name.chars().filter(|c| c.is_ascii_alphanumeric()).collect();

    for (old, new) in LEGACY_ALIASES {
        if cleaned == old {
            cleaned = new.to_string();
            break;
        }
    }

    cleaned
}

/// Compare two raw channel labels for identity after normalization.
pub fn channel_names_match(a: &str, b: &str) -> bool {
    normalize_channel_name(a) == normalize_channel_name(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_normalization() {
        assert_eq!(normalize_channel_name("Fp1"), "fp1");
        assert_eq!(normalize_channel_name("  Cz "), "cz");
        assert_eq!(normalize_channel_name("O 1"), "o1");
    }

    #[test]
    fn test_modality_prefix() {
        assert_eq!(normalize_channel_name("EEG Fp1"), "fp1");
        assert_eq!(normalize_channel_name("EEG-C3"), "c3");
        // A bare "EEG" label is left alone rather than emptied.
        assert_eq!(normalize_channel_name("EEG"), "eeg");
    }

    #[test]
    fn test_reference_suffix() {
        assert_eq!(normalize_channel_name("C3-REF"), "c3");
        assert_eq!(normalize_channel_name("EEG Fp2-LE"), "fp2");
        assert_eq!(normalize_channel_name("Pz-AVG"), "pz");
        // "F7-F8" is a bipolar derivation, not a reference suffix.
        assert_eq!(normalize_channel_name("F7-F8"), "f7f8");
    }

    #[test]
    fn test_legacy_aliases() {
        assert_eq!(normalize_channel_name("T3"), "t7");
        assert_eq!(normalize_channel_name("T4"), "t8");
        assert_eq!(normalize_channel_name("T5"), "p7");
        assert_eq!(normalize_channel_name("T6"), "p8");
        assert_eq!(normalize_channel_name("EEG T3-REF"), "t7");
    }

    #[test]
    fn test_names_match() {
        assert!(channel_names_match("EEG Fp1-REF", "fp1"));
        assert!(channel_names_match("T3", "T7"));
        assert!(!channel_names_match("T3", "T8"));
    }
}
