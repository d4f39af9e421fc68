//! Upload command handler.

use super::{open_service, print_json};
use anyhow::Context;
use clap::Args;
use docqa_core::AppConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Upload plain-text documents
#[derive(Args, Debug)]
pub struct UploadCommand {
    /// Files or directories; directories are searched for .txt files
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadOutcome {
    path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunks_created: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl UploadCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing upload command");

        let files = collect_files(&self.paths)?;
        if files.is_empty() {
            anyhow::bail!("No .txt files found in the given paths");
        }

        let service = open_service(config).await?;
        let mut outcomes = Vec::with_capacity(files.len());

        for path in files {
            let result = async {
                let filename = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .with_context(|| format!("Invalid file name: {}", path.display()))?;
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {} as UTF-8 text", path.display()))?;
                Ok::<_, anyhow::Error>(service.upload(filename, &content).await?)
            }
            .await;

            let outcome = match result {
                Ok(receipt) => UploadOutcome {
                    path,
                    document_id: Some(receipt.document.id),
                    chunks_created: Some(receipt.chunks_created),
                    error: None,
                },
                Err(e) => {
                    tracing::warn!("Upload of {:?} failed: {:#}", path, e);
                    UploadOutcome {
                        path,
                        document_id: None,
                        chunks_created: None,
                        error: Some(format!("{:#}", e)),
                    }
                }
            };
            outcomes.push(outcome);
        }

        if self.json {
            print_json(&outcomes)?;
        } else {
            for outcome in &outcomes {
                match (&outcome.document_id, &outcome.error) {
                    (Some(id), _) => println!(
                        "Uploaded {} ({} chunks) id={}",
                        outcome.path.display(),
                        outcome.chunks_created.unwrap_or(0),
                        id
                    ),
                    (None, Some(error)) => {
                        eprintln!("Failed {}: {}", outcome.path.display(), error)
                    }
                    (None, None) => {}
                }
            }
        }

        let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
        if failed > 0 {
            anyhow::bail!("{} of {} uploads failed", failed, outcomes.len());
        }
        Ok(())
    }
}

/// Expand `paths` into a sorted list of files.
///
/// Explicit files are kept as given; directories contribute only `.txt`
/// files.
fn collect_files(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_txt(e.path()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            anyhow::bail!("Path does not exist: {}", path.display());
        }
    }

    Ok(files)
}

fn is_txt(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("txt"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_files_filters_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), "beta").unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        std::fs::write(dir.path().join("notes.md"), "skip").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.TXT"), "gamma").unwrap();

        let files = collect_files(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["a.txt", "b.txt", "c.TXT"]);
    }

    #[test]
    fn test_collect_files_keeps_explicit_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("report.pdf");
        std::fs::write(&file, "binary").unwrap();

        let files = collect_files(&[file.clone()]).unwrap();
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn test_collect_files_missing_path() {
        let err = collect_files(&[PathBuf::from("/definitely/not/here")]).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
