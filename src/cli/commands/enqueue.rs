//! `bridge-audit enqueue --subject <node-id> --file <storage-item.json>`

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use std::path::PathBuf;

use crate::cli::open_queue;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, StorageItem};
use crate::domain::ports::AuditQueue;
use crate::services::create_jobs_from_storage_item;

#[derive(Args, Debug)]
pub struct EnqueueArgs {
    /// Node ID of the farmer holding the shard
    #[arg(long)]
    pub subject: String,

    /// Storage item JSON file
    #[arg(long)]
    pub file: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct EnqueueOutput {
    pub subject_id: String,
    pub data_hash: String,
    pub enqueued: u64,
    pub first_scheduled_at: Option<DateTime<Utc>>,
    pub last_scheduled_at: Option<DateTime<Utc>>,
}

impl CommandOutput for EnqueueOutput {
    fn to_human(&self) -> String {
        match (self.first_scheduled_at, self.last_scheduled_at) {
            (Some(first), Some(last)) => format!(
                "Enqueued {} audit(s) for {} ({})\n  first: {}\n  last:  {}",
                self.enqueued,
                self.subject_id,
                self.data_hash,
                first.to_rfc3339(),
                last.to_rfc3339()
            ),
            _ => format!("No challenges for {}; nothing enqueued", self.data_hash),
        }
    }
}

pub async fn read_storage_item(path: &std::path::Path) -> Result<StorageItem> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid storage item in {}", path.display()))
}

pub async fn execute(args: EnqueueArgs, config: Config, json_mode: bool) -> Result<()> {
    let item = read_storage_item(&args.file).await?;
    let audits = create_jobs_from_storage_item(&args.subject, &item);

    let queue = open_queue(&config).await?;
    let enqueued = queue
        .enqueue(&audits)
        .await
        .context("Failed to enqueue audits")?;

    output(
        &EnqueueOutput {
            subject_id: args.subject,
            data_hash: item.data_hash,
            enqueued,
            first_scheduled_at: audits.first().map(|a| a.scheduled_at),
            last_scheduled_at: audits.last().map(|a| a.scheduled_at),
        },
        json_mode,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_read_storage_item() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "data_hash": "cafe",
                "contract": {{
                    "store_begin": "2026-01-01T00:00:00Z",
                    "store_end": "2026-01-31T00:00:00Z"
                }},
                "challenges": {{ "challenges": ["01", "02"], "root": "ab", "depth": 2 }}
            }}"#
        )
        .unwrap();

        let item = read_storage_item(file.path()).await.unwrap();
        assert_eq!(item.data_hash, "cafe");
        assert_eq!(item.challenges.challenges.len(), 2);
        assert_eq!(item.challenges.depth, 2);
    }

    #[tokio::test]
    async fn test_read_storage_item_rejects_garbage() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = read_storage_item(file.path()).await.unwrap_err();
        assert!(format!("{err:#}").contains("Invalid storage item"));
    }
}
