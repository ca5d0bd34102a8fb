use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use slides::DEFAULT_PLACEHOLDER;

/// Looked up in the working directory when `--config` is not given.
pub const CONFIG_FILE: &str = "slides.toml";

/// Settings read from `slides.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Markdown document to render.
    #[serde(default)]
    pub input: Option<PathBuf>,

    /// Page skeleton containing the placeholder.
    #[serde(default)]
    pub template: Option<PathBuf>,

    /// Where the composed page is written.
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// Text in the template replaced by the slides.
    #[serde(default)]
    pub placeholder: Option<String>,
}

/// Fully resolved render settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub input: PathBuf,
    pub template: PathBuf,
    pub output: PathBuf,
    pub placeholder: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            input: PathBuf::from("slides.md"),
            template: PathBuf::from("index.template.html"),
            output: PathBuf::from("index.html"),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

impl RenderConfig {
    /// Defaults, overridden by the file, overridden by `overrides`.
    pub fn resolve(file: FileConfig, overrides: FileConfig) -> Self {
        let defaults = RenderConfig::default();
        RenderConfig {
            input: overrides.input.or(file.input).unwrap_or(defaults.input),
            template: overrides
                .template
                .or(file.template)
                .unwrap_or(defaults.template),
            output: overrides.output.or(file.output).unwrap_or(defaults.output),
            placeholder: overrides
                .placeholder
                .or(file.placeholder)
                .unwrap_or(defaults.placeholder),
        }
    }
}

pub fn parse_config(text: &str) -> Result<FileConfig> {
    toml::from_str(text).context("invalid configuration")
}

/// Read the configuration file. An explicit path must exist; the implicit
/// `slides.toml` is skipped when missing.
pub fn load_config(explicit: Option<&Path>) -> Result<FileConfig> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(CONFIG_FILE), false),
    };

    if !required && !path.exists() {
        return Ok(FileConfig::default());
    }

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("cannot read '{}'", path.display()))?;
    let config =
        parse_config(&text).with_context(|| format!("in '{}'", path.display()))?;
    log::debug!("loaded configuration from '{}'", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let file = parse_config("").unwrap();
        assert_eq!(file, FileConfig::default());
        assert_eq!(
            RenderConfig::resolve(file, FileConfig::default()),
            RenderConfig::default()
        );
    }

    #[test]
    fn flags_override_file_values() {
        let file = parse_config(
            r#"
input = "talk.md"
output = "public/talk.html"
placeholder = "{{slides}}"
"#,
        )
        .unwrap();
        let overrides = FileConfig {
            output: Some(PathBuf::from("out.html")),
            ..FileConfig::default()
        };

        let config = RenderConfig::resolve(file, overrides);
        assert_eq!(config.input, PathBuf::from("talk.md"));
        assert_eq!(config.template, PathBuf::from("index.template.html"));
        assert_eq!(config.output, PathBuf::from("out.html"));
        assert_eq!(config.placeholder, "{{slides}}");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_config("inptu = \"typo.md\"").is_err());
    }

    #[test]
    fn explicit_config_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.toml");
        std::fs::write(&path, "template = \"base.html\"\n").unwrap();

        let file = load_config(Some(path.as_path())).unwrap();
        assert_eq!(file.template, Some(PathBuf::from("base.html")));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let error = load_config(Some(path.as_path())).unwrap_err();
        assert!(error.to_string().starts_with("cannot read"));
    }
}
