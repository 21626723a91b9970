//! Caches
//!
//! - `pool_cache`: pool creation blocks and last available blocks (CSV)
//! - `token_cache`: token symbols/decimals (CSV) plus the resolver chain
//! - `ttl`: in-memory expiring map for the dashboard

pub mod pool_cache;
pub mod token_cache;
pub mod ttl;

pub use pool_cache::PoolCache;
pub use token_cache::{TokenCache, TokenResolver};
pub use ttl::TtlCache;

use eyre::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::warn;

/// File statistics shared by both CSV caches
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub path: String,
    pub entries: usize,
    pub file_size: u64,
    pub oldest: Option<String>,
    pub newest: Option<String>,
}

impl CacheStats {
    pub fn print(&self, title: &str) {
        println!("📦 {}", title);
        println!("   File:     {}", self.path);
        println!("   Entries:  {}", self.entries);
        println!("   Size:     {} bytes", self.file_size);
        if let Some(ref oldest) = self.oldest {
            println!("   Oldest:   {}", oldest);
        }
        if let Some(ref newest) = self.newest {
            println!("   Newest:   {}", newest);
        }
    }
}

/// Timestamp written to `last_updated` columns
pub(crate) fn now_stamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

pub(crate) fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Read every parseable row; bad rows and unreadable files are skipped
pub(crate) fn load_rows<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    if !path.exists() {
        return Vec::new();
    }

    let mut reader = match csv::Reader::from_path(path) {
        Ok(reader) => reader,
        Err(e) => {
            warn!("⚠️ Could not read cache {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let mut rows = Vec::new();
    for (i, record) in reader.deserialize::<T>().enumerate() {
        match record {
            Ok(row) => rows.push(row),
            Err(e) => warn!("⚠️ Skipping bad row {} in {}: {}", i + 1, path.display(), e),
        }
    }
    rows
}

/// Rewrite the whole file: explicit header, then one row per entry
pub(crate) fn write_rows<'a, T, I>(path: &Path, header: &[&str], rows: I) -> Result<()>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub(crate) fn remove_file(path: &Path) -> Result<bool> {
    if path.exists() {
        fs::remove_file(path)?;
        return Ok(true);
    }
    Ok(false)
}
