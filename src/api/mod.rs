//! API access for Figma files

pub mod access;
pub mod client;
pub mod transport;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

pub use access::FigmaAccess;
pub use client::{AuthScheme, FigmaClient};
pub use transport::{ReqwestTransport, Transport};

use crate::config::Config;
use crate::models::FigmaFile;

/// Build the access layer from configuration, with stored tokens restored.
pub fn open(config: &Config) -> Result<FigmaAccess<ReqwestTransport>> {
    let transport = Arc::new(ReqwestTransport::new()?);
    let access = FigmaAccess::new(transport, config.api_base_url.as_deref(), config.cache())?;
    access.auth().configure(config.oauth_credentials());
    access.auth().restore(config.tokens.clone());
    Ok(access)
}

/// Pull the file key out of a Figma URL such as
/// `https://www.figma.com/file/<key>/<name>` or `.../design/<key>/<name>`.
pub fn extract_file_key(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    let mut parts = url.split('/');
    while let Some(part) = parts.next() {
        if part == "file" || part == "design" {
            let key = parts.next()?;
            let key = key.split(['?', '#']).next().unwrap_or_default();
            return (!key.is_empty()).then(|| key.to_string());
        }
    }
    None
}

/// Accept either a bare file key or a Figma URL.
fn resolve_file_key(target: &str) -> Result<String> {
    let target = target.trim();
    if target.contains("://") || target.contains("figma.com") {
        return extract_file_key(target)
            .with_context(|| format!("Could not find a file key in {}", target));
    }
    if target.is_empty() {
        bail!("A file key or URL is required");
    }
    Ok(target.to_string())
}

/// Write back tokens a refresh may have replaced.
fn persist_tokens(config: &mut Config, access: &FigmaAccess<ReqwestTransport>) -> Result<()> {
    let tokens = access.auth().tokens();
    if *tokens != config.tokens {
        config.tokens = (*tokens).clone();
        config.save()?;
        tracing::debug!("Saved refreshed tokens");
    }
    Ok(())
}

/// Fetch a file (cache first) and print a summary, optionally saving its JSON.
pub async fn fetch(target: &str, refresh: bool, output: Option<&Path>) -> Result<()> {
    let mut config = Config::load()?;
    let file_key = resolve_file_key(target)?;
    let access = open(&config)?;

    if refresh {
        access.invalidate(&file_key);
    }
    let result = access
        .fetch_document(&file_key, &config.credentials())
        .await;
    persist_tokens(&mut config, &access)?;
    let file = result.with_context(|| format!("Failed to fetch file {}", file_key))?;

    print_summary(&file_key, &file);

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&file).context("Failed to serialize file")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Saved to {}", path.display());
    }
    Ok(())
}

fn print_summary(file_key: &str, file: &FigmaFile) {
    println!();
    println!("Name:          {}", file.name);
    println!("Key:           {}", file_key);
    println!(
        "Version:       {}",
        file.version.as_deref().unwrap_or("(none)")
    );
    println!(
        "Last modified: {}",
        file.last_modified.as_deref().unwrap_or("(unknown)")
    );
    println!("Nodes:         {}", file.node_count());
    println!("Components:    {}", file.components.len());
    println!("Pages:");
    for page in file.pages() {
        println!(
            "  {:<30} {} node(s)  [{}]",
            page.to_string(),
            page.descendant_count(),
            page.id
        );
    }
}

/// Fetch selected nodes of a file and print the raw JSON.
pub async fn nodes(target: &str, ids: &[String]) -> Result<()> {
    let mut config = Config::load()?;
    let file_key = resolve_file_key(target)?;
    let access = open(&config)?;

    let result = access
        .fetch_nodes(&file_key, ids, &config.credentials())
        .await;
    persist_tokens(&mut config, &access)?;
    let nodes = result.with_context(|| format!("Failed to fetch nodes of {}", file_key))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&nodes).context("Failed to format nodes")?
    );
    Ok(())
}

/// Show cache location, entry count and size.
pub fn cache_stats() -> Result<()> {
    let config = Config::load()?;
    let cache = config.cache();
    let stats = cache.stats();

    println!("Directory: {}", cache.root().display());
    println!("Files:     {}", stats.entries);
    println!(
        "Size:      {} bytes ({:.2} MB)",
        stats.total_bytes,
        stats.total_bytes as f64 / (1024.0 * 1024.0)
    );
    Ok(())
}

/// Clear one cached file, or all of them.
pub fn cache_clear(target: Option<&str>) -> Result<()> {
    let config = Config::load()?;
    let access = open(&config)?;

    match target {
        Some(target) => {
            let file_key = resolve_file_key(target)?;
            access.invalidate(&file_key);
            println!("Cleared cache for {}.", file_key);
        }
        None => {
            access.invalidate_all();
            println!("Cleared all cached files.");
        }
    }
    Ok(())
}
