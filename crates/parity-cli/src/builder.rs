//! Building test projects into runnable artifacts.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

/// Default build tool, looked up on `PATH`.
pub const DEFAULT_BUILD_TOOL: &str = "msbuild";

/// Turns a solution file into the artifact it produces.
#[async_trait]
pub trait BuildProvider: Send + Sync {
    /// Build `solution` in `config` and return the artifact path.
    async fn build(&self, solution: &Path, config: &str) -> Result<PathBuf>;
}

/// Where a solution's build output lands: `<sln-dir>/bin/<config>/<stem>.exe`.
pub fn artifact_path(solution: &Path, config: &str) -> PathBuf {
    let dir = solution.parent().unwrap_or_else(|| Path::new("."));
    let stem = solution
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join("bin").join(config).join(format!("{}.exe", stem))
}

/// Builds by invoking `<tool> /p:configuration=<config> <sln>`.
pub struct CommandBuildProvider {
    tool: PathBuf,
}

impl CommandBuildProvider {
    pub fn new(tool: impl Into<PathBuf>) -> Self {
        Self { tool: tool.into() }
    }
}

#[async_trait]
impl BuildProvider for CommandBuildProvider {
    async fn build(&self, solution: &Path, config: &str) -> Result<PathBuf> {
        info!(solution = %solution.display(), config, "Building");

        let output = Command::new(&self.tool)
            .arg(format!("/p:configuration={}", config))
            .arg(solution)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to launch build tool {}", self.tool.display()))?;

        if !output.status.success() {
            bail!(
                "Build of {} ({}) failed with exit code {}:\n{}",
                solution.display(),
                config,
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stdout)
            );
        }
        debug!(solution = %solution.display(), "build succeeded");

        let artifact = artifact_path(solution, config);
        if !artifact.is_file() {
            bail!(
                "Build of {} ({}) produced no artifact at {}",
                solution.display(),
                config,
                artifact.display()
            );
        }
        Ok(artifact)
    }
}

/// Build every solution in order, stopping at the first failure.
pub async fn build_all(
    provider: &dyn BuildProvider,
    solutions: &[PathBuf],
    config: &str,
) -> Result<Vec<PathBuf>> {
    let mut artifacts = Vec::with_capacity(solutions.len());
    for sln in solutions {
        artifacts.push(provider.build(sln, config).await?);
    }
    Ok(artifacts)
}
