//! Config Synchronizer: writes extracted revision ids back into the artifact.

use crate::backend::BackendKind;
use crate::config::settings::{ConfigError, ConfigResult};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::info;

/// Replace the `revisions` field of the artifact at `config_path`
///
/// The file is rewritten through a sibling temporary file and a rename, so a
/// failure leaves the previous contents in place.
pub fn update(config_path: &Path, kind: BackendKind, revisions: &[String]) -> ConfigResult<()> {
    let contents = fs::read_to_string(config_path)?;
    let updated = replace_revisions(&contents, kind, revisions)?;

    let mut staging = config_path.as_os_str().to_owned();
    staging.push(".tmp");
    fs::write(&staging, updated)?;
    fs::rename(&staging, config_path)?;

    info!(
        config = %config_path.display(),
        backend = %kind,
        revisions = revisions.len(),
        "Updated known revisions"
    );
    Ok(())
}

/// Fail with the error [`update`] would raise, without writing anything
pub fn check(config_path: &Path, kind: BackendKind) -> ConfigResult<()> {
    let contents = fs::read_to_string(config_path)?;
    replace_revisions(&contents, kind, &[]).map(|_| ())
}

/// Return `contents` with its `revisions` value replaced
///
/// Key order and every other field are preserved. Subversion revisions are
/// written as numbers, content hashes as strings.
pub fn replace_revisions(
    contents: &str,
    kind: BackendKind,
    revisions: &[String],
) -> ConfigResult<String> {
    let mut document: Value = serde_json::from_str(contents)?;
    let object = document
        .as_object_mut()
        .ok_or_else(|| ConfigError::Format("config root is not a JSON object".to_string()))?;
    let slot = object
        .get_mut("revisions")
        .ok_or_else(|| ConfigError::Format("no \"revisions\" field to update".to_string()))?;
    if !slot.is_array() {
        return Err(ConfigError::Format(
            "\"revisions\" is not an array".to_string(),
        ));
    }

    *slot = Value::Array(
        revisions
            .iter()
            .map(|id| revision_value(kind, id))
            .collect::<ConfigResult<Vec<_>>>()?,
    );

    let mut text = serde_json::to_string_pretty(&document)?;
    text.push('\n');
    Ok(text)
}

fn revision_value(kind: BackendKind, id: &str) -> ConfigResult<Value> {
    if kind.has_content_addressed_ids() {
        return Ok(Value::String(id.to_string()));
    }
    id.parse::<u64>().map(Value::from).map_err(|_| {
        ConfigError::InvalidValue(format!("{} revision is not a number: {}", kind, id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::ConfigArtifact;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_replace_keeps_other_fields_in_order() {
        let contents = r#"{"pathToGit": "git", "revisions": ["old"], "referenceProject": "/tmp/git"}"#;
        let updated = replace_revisions(contents, BackendKind::Git, &ids(&["a1", "b2"])).unwrap();
        assert_eq!(
            updated,
            "{\n  \"pathToGit\": \"git\",\n  \"revisions\": [\n    \"a1\",\n    \"b2\"\n  ],\n  \"referenceProject\": \"/tmp/git\"\n}\n"
        );
    }

    #[test]
    fn test_svn_revisions_are_numbers() {
        let updated =
            replace_revisions(r#"{"revisions": []}"#, BackendKind::Svn, &ids(&["1", "2"])).unwrap();
        let value: Value = serde_json::from_str(&updated).unwrap();
        assert_eq!(value["revisions"], serde_json::json!([1, 2]));

        assert!(matches!(
            replace_revisions(r#"{"revisions": []}"#, BackendKind::Svn, &ids(&["abc"])),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_missing_revisions_is_a_format_error() {
        for contents in [r#"{"other": 1}"#, "[1, 2]", r#"{"revisions": "x"}"#] {
            assert!(matches!(
                replace_revisions(contents, BackendKind::Git, &ids(&["a"])),
                Err(ConfigError::Format(_))
            ));
        }
    }

    #[test]
    fn test_check_reports_shape_without_writing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("git-config.json");
        let original = r#"{"referenceProject": "/tmp/git", "authorWithEmail": "A <a@b.c>"}"#;
        fs::write(&path, original).unwrap();

        assert!(matches!(check(&path, BackendKind::Git), Err(ConfigError::Format(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), original);

        fs::write(&path, r#"{"revisions": ["old"]}"#).unwrap();
        assert!(check(&path, BackendKind::Git).is_ok());
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"revisions": ["old"]}"#);
    }

    #[test]
    fn test_update_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("hg-config.json");
        fs::write(
            &path,
            r#"{"referenceProject": "/tmp/hg", "authorWithEmail": "A <a@b.c>", "revisions": []}"#,
        )
        .unwrap();

        update(&path, BackendKind::Hg, &ids(&["n1", "n2", "n3"])).unwrap();

        let config = ConfigArtifact::load(&path).unwrap();
        assert_eq!(config.revisions(), ids(&["n1", "n2", "n3"]));
        assert_eq!(config.reference_project().unwrap(), Path::new("/tmp/hg"));
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_update_leaves_file_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("unrelated.json");
        let original = r#"{"name": "not a fixture config"}"#;
        fs::write(&path, original).unwrap();

        assert!(update(&path, BackendKind::Git, &ids(&["a"])).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }
}
