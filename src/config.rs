//! Manager config-file loading: one mapping per line, two whitespace-separated
//! `path@host:port` specs, blank or malformed lines skipped.
//!
//! The format is not structured data, so this is a hand-written line parser,
//! not a serde/toml consumer.

use std::path::Path;

use tokio::io::AsyncReadExt;

use crate::registry::{parse_spec, SyncMapping};

/// Parse `contents` into the mappings it declares, skipping blank lines and
/// lines that don't parse as two `path@host:port` specs.
pub fn parse(contents: &str) -> Vec<SyncMapping> {
    contents
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let mut specs = line.split_whitespace();
            let src_spec = specs.next()?;
            let dst_spec = specs.next()?;
            let (src_path, src_host, src_port) = parse_spec(src_spec)?;
            let (dst_path, dst_host, dst_port) = parse_spec(dst_spec)?;
            Some(SyncMapping {
                src_path,
                src_host,
                src_port,
                dst_path,
                dst_host,
                dst_port,
            })
        })
        .collect()
}

/// Load and parse the config file at `path`.
pub async fn load(path: impl AsRef<Path>) -> std::io::Result<Vec<SyncMapping>> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).await?;
    Ok(parse(&contents))
}
