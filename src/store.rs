use std::path::{Path, PathBuf};

use rand::RngCore;
use serde::Serialize;
use thiserror::Error;

use crate::apis::Article;

pub const INFO_FILE: &str = "info.json";
pub const CITATION_FILE: &str = "citation.bib";
pub const PDF_FILE: &str = "paper.pdf";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One entry of the saved-PDF listing.
#[derive(Debug, Clone, Serialize)]
pub struct AvailablePdf {
    pub url: String,
    pub title: String,
    pub authors: Vec<String>,
}

/// Directory of saved articles, one folder per save. Writes go through a
/// dot-prefixed staging directory that is renamed into place last, so a
/// folder either exists complete under its final id or not at all.
pub struct SavedArticles {
    root: PathBuf,
}

impl SavedArticles {
    /// Open the store, creating the root directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist an article: `info.json` always, `citation.bib` when BibTeX
    /// text was fetched, `paper.pdf` when the caller downloaded one. Returns
    /// the folder id. A failed save unwinds through the staging directory's
    /// cleanup and leaves no folder behind.
    pub async fn save(&self, article: &Article, pdf: Option<&[u8]>) -> Result<String, StoreError> {
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)?;

        let info = serde_json::to_vec_pretty(article)?;
        tokio::fs::write(staging.path().join(INFO_FILE), info).await?;
        if let Some(bibtex) = article.bibtex.as_option() {
            tokio::fs::write(staging.path().join(CITATION_FILE), bibtex).await?;
        }
        if let Some(bytes) = pdf {
            tokio::fs::write(staging.path().join(PDF_FILE), bytes).await?;
        }

        let folder_id = generate_folder_id();
        tokio::fs::rename(staging.path(), self.root.join(&folder_id)).await?;
        // The staging handle now points at nothing; its drop is a no-op.
        tracing::info!(folder_id, "article saved");
        Ok(folder_id)
    }

    /// Folders holding both a PDF and readable metadata, in directory-scan
    /// order. Folders without a PDF are ignored; folders with missing or
    /// malformed metadata are skipped with a warning.
    pub async fn list_available(&self) -> Result<Vec<AvailablePdf>, StoreError> {
        let mut listings = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            // Dot-prefixed dirs are staging leftovers, never listings.
            if name.starts_with('.') {
                continue;
            }
            match read_listing_entry(&entry.path(), &name).await {
                Ok(Some(listing)) => listings.push(listing),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(folder = name, error = %e, "skipping unreadable saved article");
                }
            }
        }
        Ok(listings)
    }
}

async fn read_listing_entry(folder: &Path, name: &str) -> Result<Option<AvailablePdf>, StoreError> {
    if !tokio::fs::try_exists(folder.join(PDF_FILE)).await? {
        return Ok(None);
    }
    let raw = tokio::fs::read(folder.join(INFO_FILE)).await?;
    let article: Article = serde_json::from_slice(&raw)?;
    let title = if article.title.trim().is_empty() {
        "Untitled".to_string()
    } else {
        article.title
    };
    Ok(Some(AvailablePdf {
        url: format!("/api/pdf/{}/{}", name, PDF_FILE),
        title,
        authors: article.authors,
    }))
}

fn generate_folder_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
