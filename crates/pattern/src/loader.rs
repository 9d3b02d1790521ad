//! YAML loader for pattern definition files.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::EventPattern;
use crate::error::PatternError;

/// Top-level pattern definition document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternFile {
    pub patterns: Vec<EventPattern>,
}

/// Load and validate pattern definitions from a YAML file.
///
/// Fails on unreadable files, malformed YAML, invalid patterns, and
/// duplicate pattern ids. Disabled patterns are kept (the detector skips
/// them) so a toggle does not change the file's validity.
pub fn load_patterns(path: impl AsRef<Path>) -> Result<Vec<EventPattern>, PatternError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)?;
    let file: PatternFile = serde_yaml::from_str(&raw)?;

    let mut seen = std::collections::HashSet::new();
    for pattern in &file.patterns {
        pattern.validate()?;
        if !seen.insert(pattern.pattern_id.as_str()) {
            return Err(PatternError::DuplicateId(pattern.pattern_id.clone()));
        }
    }

    info!(
        path = %path.display(),
        count = file.patterns.len(),
        "loaded pattern definitions"
    );
    Ok(file.patterns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID: &str = r#"
patterns:
  - pattern_id: churn-wave
    description: several high-risk customers inside an hour
    conditions:
      event_types: [customer_risk]
      min_priority: high
    trigger_threshold: 3
    time_window_secs: 3600
    severity_multiplier: 1.5
  - pattern_id: error-storm
    conditions:
      event_types: [technical_issue]
    trigger_threshold: 5
    time_window_secs: 600
    severity_multiplier: 2.0
    enabled: false
"#;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_valid_file() {
        let f = write_temp(VALID);
        let patterns = load_patterns(f.path()).unwrap();
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].pattern_id, "churn-wave");
        assert!(patterns[0].enabled);
        assert!(!patterns[1].enabled);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let dup = VALID.replace("error-storm", "churn-wave");
        let f = write_temp(&dup);
        assert!(matches!(
            load_patterns(f.path()),
            Err(PatternError::DuplicateId(_))
        ));
    }

    #[test]
    fn rejects_invalid_threshold() {
        let bad = VALID.replace("trigger_threshold: 3", "trigger_threshold: 0");
        let f = write_temp(&bad);
        assert!(matches!(
            load_patterns(f.path()),
            Err(PatternError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn rejects_unknown_fields() {
        let bad = VALID.replace("severity_multiplier: 1.5", "severity_multiplier: 1.5\n    bogus: 1");
        let f = write_temp(&bad);
        assert!(matches!(load_patterns(f.path()), Err(PatternError::Yaml(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            load_patterns("/definitely/not/here.yml"),
            Err(PatternError::Io(_))
        ));
    }
}
