//! `memo purge` — deletes cache entries.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::ls::scan;
use crate::{GlobalArgs, PurgeArgs};

/// Runs the `memo purge` command.
pub fn run(args: &PurgeArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let dir = crate::cache_dir(args.dir.as_deref(), global)?;
    let removed = purge(&dir, args.name.as_deref(), args.comment.as_deref(), args.dry_run)?;
    if !global.quiet {
        let verb = if args.dry_run { "Would remove" } else { "Removed" };
        for path in &removed {
            eprintln!("  {verb} {}", path.display());
        }
        eprintln!("{verb} {} entries from {}", removed.len(), dir.display());
    }
    Ok(0)
}

/// Deletes matching entries and returns their paths. Shard directories left
/// empty are removed too.
fn purge(
    dir: &Path,
    name: Option<&str>,
    comment: Option<&str>,
    dry_run: bool,
) -> io::Result<Vec<PathBuf>> {
    let entries = scan(dir, name, comment)?;
    let mut removed = Vec::with_capacity(entries.len());
    for entry in entries {
        if !dry_run {
            fs::remove_file(&entry.path)?;
            tracing::debug!("removed {}", entry.path.display());
            if let Some(parent) = entry.path.parent().filter(|p| *p != dir) {
                remove_if_empty(parent);
            }
        }
        removed.push(entry.path);
    }
    Ok(removed)
}

fn remove_if_empty(dir: &Path) {
    let empty = fs::read_dir(dir).is_ok_and(|mut it| it.next().is_none());
    if empty {
        if let Err(e) = fs::remove_dir(dir) {
            tracing::warn!("failed to remove empty shard {}: {e}", dir.display());
        }
    }
}
