//! `memo show` — decodes one cache entry to JSON.

use std::path::Path;

use memo_cache::backend;
use memo_cache::{parse_file_name, CacheFormat, ReadPolicy};

use crate::ShowArgs;

/// Runs the `memo show` command.
pub fn run(args: &ShowArgs) -> Result<i32, Box<dyn std::error::Error>> {
    println!("{}", render(Path::new(&args.file))?);
    Ok(0)
}

/// Reads the entry at `path` and pretty-prints it as JSON.
///
/// Bincode entries are refused: the format is not self-describing, so they
/// can only be decoded into the type that wrote them.
fn render(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let info = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(parse_file_name)
        .ok_or_else(|| format!("'{}' is not a cache file", path.display()))?;
    if info.spec.format == CacheFormat::Bincode {
        return Err(format!(
            "'{}' is a bincode entry and can only be decoded by the program that wrote it",
            path.display()
        )
        .into());
    }
    let value: serde_json::Value = backend::read(info.spec, path, ReadPolicy::Fail)?;
    Ok(serde_json::to_string_pretty(&value)?)
}
