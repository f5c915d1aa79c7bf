//! The mapping registry: the set of active source -> destination sync pairs.
//!
//! A `Vec` behind a mutex, not a keyed map: identity is a 6-tuple and lookup
//! volume is small, a handful of live mappings rather than a per-file index.
//! New entries go in at the head, so `cancel`'s first-match-wins semantics
//! always hit the most recently registered mapping for a given source spec.

use tokio::sync::Mutex;

/// A registered source -> destination pair. Identity for deduplication is
/// the full 6-tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncMapping {
    pub src_path: String,
    pub src_host: String,
    pub src_port: u16,
    pub dst_path: String,
    pub dst_host: String,
    pub dst_port: u16,
}

impl SyncMapping {
    pub fn src_spec(&self) -> String {
        spec_string(&self.src_path, &self.src_host, self.src_port)
    }

    pub fn dst_spec(&self) -> String {
        spec_string(&self.dst_path, &self.dst_host, self.dst_port)
    }
}

fn spec_string(path: &str, host: &str, port: u16) -> String {
    format!("{}@{}:{}", path, host, port)
}

/// Parse a `path@host:port` specifier. The port is taken from the last `:`,
/// so a bare IPv6 host would not parse correctly — out of scope, since every
/// deployment target is an ordinary `host:port` pair.
pub fn parse_spec(spec: &str) -> Option<(String, String, u16)> {
    let (path, rest) = spec.split_once('@')?;
    let (host, port) = rest.rsplit_once(':')?;
    if path.is_empty() || host.is_empty() {
        return None;
    }
    let port: u16 = port.parse().ok()?;
    Some((path.to_string(), host.to_string(), port))
}

/// Outcome of an `add` call.
pub enum AddOutcome {
    Registered(SyncMapping),
    AlreadyExists(SyncMapping),
}

/// Outcome of a `cancel` call.
pub enum CancelOutcome {
    Removed(SyncMapping),
    NotFound,
}

#[derive(Default)]
pub struct MappingRegistry {
    entries: Mutex<Vec<SyncMapping>>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `mapping` at the head of the registry unless an entry with the
    /// same 6-tuple identity already exists.
    pub async fn add(&self, mapping: SyncMapping) -> AddOutcome {
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.iter().find(|m| **m == mapping) {
            return AddOutcome::AlreadyExists(existing.clone());
        }
        entries.insert(0, mapping.clone());
        AddOutcome::Registered(mapping)
    }

    /// Remove the first entry whose source spec matches `src_spec`.
    /// Destination is not part of cancel identity.
    pub async fn cancel(&self, src_spec: &str) -> CancelOutcome {
        let mut entries = self.entries.lock().await;
        if let Some(pos) = entries.iter().position(|m| m.src_spec() == src_spec) {
            return CancelOutcome::Removed(entries.remove(pos));
        }
        CancelOutcome::NotFound
    }

    /// Number of currently registered mappings.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
