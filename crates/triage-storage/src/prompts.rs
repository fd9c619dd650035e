use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::{Result, StorageError};

/// Typed view of a saved prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptDocument {
    #[serde(default)]
    pub title: String,
    /// `per_ticket` or `bulk`
    #[serde(default, alias = "job_type", skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    pub prompt: String,
}

/// Directory of `*.json` prompt documents
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    root: PathBuf,
}

impl PromptLibrary {
    /// Open the library, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        debug!(dir = %root.display(), "prompt library opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sorted names of every `.json` file
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".json") && entry.file_type().await?.is_file() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub async fn exists(&self, filename: &str) -> bool {
        let name = sanitize_filename(filename);
        if name.is_empty() {
            return false;
        }
        tokio::fs::try_exists(self.root.join(name)).await.unwrap_or(false)
    }

    pub async fn load(&self, filename: &str) -> Result<Value> {
        let path = self.existing(filename).await?;
        let text = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn load_document(&self, filename: &str) -> Result<PromptDocument> {
        Ok(serde_json::from_value(self.load(filename).await?)?)
    }

    /// Write `content` with 4-space indentation and return the stored name
    pub async fn save(&self, filename: &str, content: &Value) -> Result<String> {
        let name = sanitize_filename(filename);
        if !name.ends_with(".json") {
            return Err(StorageError::InvalidFilename(filename.to_string()));
        }

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        content.serialize(&mut serializer)?;

        tokio::fs::write(self.root.join(&name), buf).await?;
        info!(prompt = %name, "prompt saved");
        Ok(name)
    }

    pub async fn delete(&self, filename: &str) -> Result<()> {
        let path = self.existing(filename).await?;
        tokio::fs::remove_file(path).await?;
        info!(prompt = %sanitize_filename(filename), "prompt deleted");
        Ok(())
    }

    async fn existing(&self, filename: &str) -> Result<PathBuf> {
        let name = sanitize_filename(filename);
        let path = self.root.join(&name);
        if name.is_empty() || !tokio::fs::try_exists(&path).await? {
            return Err(StorageError::NotFound(filename.to_string()));
        }
        Ok(path)
    }
}

/// Basename only, keeping `[A-Za-z0-9_.-]`
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    base.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect()
}
