//! `RunArtifacts` — the single writer every phase's "persist this JSON/
//! markdown file under `runs/<run_id>/`" call goes through (§6), instead
//! of each phase repeating its own `tokio::fs` boilerplate.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;

pub struct RunArtifacts {
    dir: PathBuf,
}

impl RunArtifacts {
    pub async fn create(runs_dir: &Path, run_id: &str) -> Result<Self> {
        let dir = runs_dir.join(run_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn write_json<T: Serialize>(&self, filename: &str, value: &T) -> Result<()> {
        let body = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(self.dir.join(filename), body).await?;
        Ok(())
    }

    pub async fn write_text(&self, filename: &str, contents: &str) -> Result<()> {
        tokio::fs::write(self.dir.join(filename), contents.as_bytes()).await?;
        Ok(())
    }

    pub async fn write_plan_validated(&self, plan: &crate::domain::Plan) -> Result<()> {
        self.write_json("plan.validated.json", plan).await
    }

    pub async fn write_plan_enriched<T: Serialize>(&self, enriched: &T) -> Result<()> {
        self.write_json("plan.enriched.json", enriched).await
    }

    pub async fn write_debug_repair_input<T: Serialize>(&self, value: &T) -> Result<()> {
        self.write_json("debug_repair_input.json", value).await
    }

    pub async fn write_debug_repair_output<T: Serialize>(&self, value: &T) -> Result<()> {
        self.write_json("debug_repair_output.json", value).await
    }

    pub async fn write_report(&self, markdown: &str) -> Result<()> {
        self.write_text("report.md", markdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn write_json_lands_under_run_directory() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = RunArtifacts::create(dir.path(), "run-1").await.unwrap();
        artifacts.write_json("plan.validated.json", &json!({"ok": true})).await.unwrap();

        let path = artifacts.dir().join("plan.validated.json");
        assert!(path.exists());
        let contents = tokio::fs::read_to_string(path).await.unwrap();
        assert!(contents.contains("\"ok\""));
    }

    #[tokio::test]
    async fn write_report_writes_plain_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = RunArtifacts::create(dir.path(), "run-2").await.unwrap();
        artifacts.write_report("# Report").await.unwrap();
        let contents = tokio::fs::read_to_string(artifacts.dir().join("report.md")).await.unwrap();
        assert_eq!(contents, "# Report");
    }
}
