//! YAML tool manifest.
//!
//! Declares command-backed tools for the CLI:
//!
//! ```yaml
//! tools:
//!   - name: read_file
//!     description: Read a UTF-8 text file and return its contents
//!     command: ["python3", "tools/read_file.py"]
//!     timeout_secs: 30
//! ```
//!
//! Relative `working_dir` values resolve against the manifest's own
//! directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::{CommandTool, Tool};

/// One tool entry in the manifest.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Program followed by its arguments.
    pub command: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Top-level manifest document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolManifest {
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    /// Directory relative paths resolve against; set by [`load`](Self::load).
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl ToolManifest {
    /// Read and parse a manifest file.
    pub async fn load(path: &Path) -> anyhow::Result<ToolManifest> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read tool manifest: {}", path.display()))?;
        let mut manifest = Self::parse(&contents)?;
        manifest.base_dir = path.parent().map(Path::to_path_buf);
        tracing::debug!(
            path = %path.display(),
            tools = manifest.tools.len(),
            "tool manifest loaded"
        );
        Ok(manifest)
    }

    /// Parse manifest YAML without touching the filesystem.
    pub fn parse(contents: &str) -> anyhow::Result<ToolManifest> {
        let manifest: ToolManifest =
            serde_yaml_ng::from_str(contents).context("failed to parse tool manifest YAML")?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for spec in &self.tools {
            if spec.name.trim().is_empty() {
                anyhow::bail!("manifest: tool with empty name");
            }
            if spec.command.first().map_or(true, |p| p.trim().is_empty()) {
                anyhow::bail!("manifest: tool '{}' has an empty command", spec.name);
            }
            if spec.timeout_secs == Some(0) {
                anyhow::bail!("manifest: tool '{}' has timeout_secs=0", spec.name);
            }
        }
        Ok(())
    }

    /// Materialize the declared tools, in manifest order.
    pub fn into_tools(self) -> Vec<Arc<dyn Tool>> {
        let base = self.base_dir;
        self.tools
            .into_iter()
            .filter_map(|spec| {
                let mut parts = spec.command.into_iter();
                let program = parts.next()?;
                let mut tool = CommandTool::new(spec.name, spec.description, program, parts.collect());
                if let Some(dir) = spec.working_dir {
                    let dir = PathBuf::from(dir);
                    let dir = match (&base, dir.is_relative()) {
                        (Some(b), true) => b.join(dir),
                        _ => dir,
                    };
                    tool = tool.with_working_dir(dir);
                }
                if let Some(secs) = spec.timeout_secs {
                    tool = tool.with_timeout(Duration::from_secs(secs));
                }
                Some(Arc::new(tool) as Arc<dyn Tool>)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
tools:
  - name: search_web
    description: Search the web for a phrase
    command: ["sh", "-c", "echo results"]
  - name: read_file
    description: Read a file from disk
    command: ["cat"]
    working_dir: data
    timeout_secs: 5
"#;

    #[test]
    fn parses_tools_in_order() {
        let manifest = ToolManifest::parse(SAMPLE).unwrap();
        let names: Vec<&str> = manifest.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["search_web", "read_file"]);
        assert_eq!(manifest.tools[1].timeout_secs, Some(5));
    }

    #[test]
    fn into_tools_keeps_names_and_descriptions() {
        let tools = ToolManifest::parse(SAMPLE).unwrap().into_tools();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name(), "search_web");
        assert_eq!(tools[1].description(), "Read a file from disk");
    }

    #[test]
    fn empty_command_rejected() {
        let err = ToolManifest::parse("tools:\n  - name: x\n    command: []\n").unwrap_err();
        assert!(err.to_string().contains("empty command"));
    }

    #[test]
    fn unknown_field_rejected() {
        let yaml = "tools:\n  - name: x\n    command: [ls]\n    colour: red\n";
        assert!(ToolManifest::parse(yaml).is_err());
    }

    #[test]
    fn empty_document_has_no_tools() {
        let manifest = ToolManifest::parse("{}").unwrap();
        assert!(manifest.into_tools().is_empty());
    }

    #[tokio::test]
    async fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.yaml");
        std::fs::write(&path, SAMPLE).unwrap();
        let manifest = ToolManifest::load(&path).await.unwrap();
        assert_eq!(manifest.tools.len(), 2);
    }

    #[tokio::test]
    async fn load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ToolManifest::load(&dir.path().join("nope.yaml")).await.is_err());
    }
}
