//! `memo ls` — lists cache entries.
//!
//! Entries are found at the top of the cache directory and one level down,
//! where sharded entries live. Files that do not follow the cache file name
//! grammar are skipped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use memo_cache::{parse_file_name, CacheFileInfo};

use crate::{GlobalArgs, LsArgs, ReportFormat};

/// One cache file found on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Full path.
    pub path: PathBuf,
    /// Parsed file name.
    pub info: CacheFileInfo,
    /// Size in bytes.
    pub size: u64,
}

/// Runs the `memo ls` command.
pub fn run(args: &LsArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let dir = crate::cache_dir(args.dir.as_deref(), global)?;
    let entries = scan(&dir, args.name.as_deref(), args.comment.as_deref())?;

    match args.format {
        ReportFormat::Text => {
            for entry in &entries {
                println!("{}", text_line(&dir, entry));
            }
            if !global.quiet {
                eprintln!("{} entries in {}", entries.len(), dir.display());
            }
        }
        ReportFormat::Json => {
            let rows: Vec<serde_json::Value> = entries.iter().map(json_row).collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(0)
}

/// Collects cache entries under `dir`, optionally only those of one function.
///
/// With a `name` but no `comment`, unsigned entries that carry a comment are
/// left out: their stem cannot be told apart from another function's name.
pub fn scan(dir: &Path, name: Option<&str>, comment: Option<&str>) -> io::Result<Vec<Entry>> {
    let wanted = |info: &CacheFileInfo| name.map_or(true, |n| info.matches(n, comment));
    let mut entries = Vec::new();
    for item in fs::read_dir(dir)? {
        let item = item?;
        let file_type = item.file_type()?;
        if file_type.is_dir() {
            for nested in fs::read_dir(item.path())? {
                let nested = nested?;
                if nested.file_type()?.is_file() {
                    push_entry(&mut entries, nested.path(), &wanted)?;
                }
            }
        } else if file_type.is_file() {
            push_entry(&mut entries, item.path(), &wanted)?;
        }
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!("found {} cache entries in {}", entries.len(), dir.display());
    Ok(entries)
}

fn push_entry(
    entries: &mut Vec<Entry>,
    path: PathBuf,
    wanted: &dyn Fn(&CacheFileInfo) -> bool,
) -> io::Result<()> {
    let Some(info) = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(parse_file_name)
    else {
        return Ok(());
    };
    if !wanted(&info) {
        return Ok(());
    }
    let size = fs::metadata(&path)?.len();
    entries.push(Entry { path, info, size });
    Ok(())
}

fn text_line(dir: &Path, entry: &Entry) -> String {
    let shown = entry.path.strip_prefix(dir).unwrap_or(&entry.path);
    let compression = entry.info.spec.compression.suffix().unwrap_or("-");
    format!(
        "{:>10}  {:<8} {:<3} {}",
        entry.size,
        entry.info.spec.format.as_str(),
        compression,
        shown.display()
    )
}

fn json_row(entry: &Entry) -> serde_json::Value {
    serde_json::json!({
        "path": entry.path.display().to_string(),
        "stem": entry.info.stem,
        "format": entry.info.spec.format.as_str(),
        "compressed": entry.info.spec.compression.suffix().is_some(),
        "size": entry.size,
    })
}
