//! `wayfinder check-config`.

use std::path::Path;

use anyhow::{bail, Context};
use tracing::info;

use wayfinder_config::{ConfigLoader, ConfigValidator, ValidationResult};

/// Load and validate `path`.
pub(crate) fn check(path: &Path) -> anyhow::Result<ValidationResult> {
    let config = ConfigLoader::load(path)
        .with_context(|| format!("loading configuration {}", path.display()))?;
    Ok(ConfigValidator::validate(&config)?)
}

/// Handle `wayfinder check-config`.
pub(crate) fn handle_check_config(path: Option<&Path>) -> anyhow::Result<()> {
    let Some(path) = path else {
        bail!("no configuration file given");
    };
    let result = check(path)?;

    for warning in &result.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        println!("error: {}: {}", error.path, error.message);
    }
    if !result.is_valid() {
        bail!("{} has {} error(s)", path.display(), result.errors.len());
    }
    info!(path = %path.display(), "Configuration is valid");
    println!("{}: ok", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_is_valid() {
        let file = file("");
        assert!(check(file.path()).unwrap().is_valid());
        assert!(handle_check_config(Some(file.path())).is_ok());
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let file = file("[positioner]\nmargin = -4.0\n");
        let result = check(file.path()).unwrap();
        assert!(!result.is_valid());
        assert!(handle_check_config(Some(file.path())).is_err());
    }

    #[test]
    fn test_missing_file_fails() {
        assert!(check(Path::new("/nonexistent/wayfinder.toml")).is_err());
        assert!(handle_check_config(None).is_err());
    }
}
