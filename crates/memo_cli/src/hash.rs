//! `memo hash` — prints the hash a JSON value gets as cache arguments.

use memo_cache::ArgSignature;
use memo_common::{content_hash, Value};

use crate::HashArgs;

/// Runs the `memo hash` command.
pub fn run(args: &HashArgs) -> Result<i32, Box<dyn std::error::Error>> {
    print!("{}", report(&args.json)?);
    Ok(0)
}

/// Formats the hash, signature and shard of the JSON text.
fn report(json: &str) -> Result<String, Box<dyn std::error::Error>> {
    let parsed: serde_json::Value =
        serde_json::from_str(json).map_err(|e| format!("invalid JSON: {e}"))?;
    let hash = content_hash(&Value::from(parsed))?;
    let signature = ArgSignature::from_hash(hash);
    Ok(format!(
        "hash:      {hash}\nsignature: {signature}\nshard:     {}\n",
        signature.shard()
    ))
}
