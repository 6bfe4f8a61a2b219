//! Fingerprint command - Print the cache key of a dependency manifest

use anyhow::{Context, Result};
use preview_core::fingerprint;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct FingerprintReport<'a> {
    file: &'a Path,
    fingerprint: String,
}

pub async fn run(file: PathBuf, json: bool) -> Result<()> {
    let content = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let fingerprint = fingerprint(&content);

    if json {
        let report = FingerprintReport {
            file: &file,
            fingerprint: fingerprint.to_string(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", fingerprint);
    }
    Ok(())
}
