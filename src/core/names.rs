//! Naming conventions of cluster metadata: server-id prefixes, shard names
//! and the system collections every database is expected to carry.

use lazy_static::lazy_static;
use regex::Regex;
use std::cmp::Ordering;

pub const PRIMARY_PREFIX: &str = "PRMR-";
pub const COORDINATOR_PREFIX: &str = "CRDN-";
pub const AGENT_PREFIX: &str = "AGNT-";
pub const SINGLE_PREFIX: &str = "SNGL-";

/// Prototype collection for all other system collections of a database.
pub const GRAPHS_COLLECTION: &str = "_graphs";

pub const SYSTEM_DATABASE: &str = "_system";

/// System collections a database must contain. `_graphs` comes first since
/// the others are created with `distributeShardsLike` pointing at it.
pub const REQUIRED_SYSTEM_COLLECTIONS: &[&str] = &[
    GRAPHS_COLLECTION,
    "_apps",
    "_appbundles",
    "_aqlfunctions",
    "_jobs",
    "_queues",
];

lazy_static! {
    static ref SHARD_NAME: Regex = Regex::new(r"^s(\d+)$").unwrap();
    static ref ENDPOINT_SCHEME: Regex = Regex::new(r"^(tcp|ssl|http|https)://").unwrap();
}

/// Role of a cluster member, derived from its id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerRole {
    Primary,
    Coordinator,
    Agent,
    Single,
    Unknown,
}

impl ServerRole {
    pub fn of(server_id: &str) -> Self {
        if server_id.starts_with(PRIMARY_PREFIX) {
            ServerRole::Primary
        } else if server_id.starts_with(COORDINATOR_PREFIX) {
            ServerRole::Coordinator
        } else if server_id.starts_with(AGENT_PREFIX) {
            ServerRole::Agent
        } else if server_id.starts_with(SINGLE_PREFIX) {
            ServerRole::Single
        } else {
            ServerRole::Unknown
        }
    }
}

pub fn is_primary(server_id: &str) -> bool {
    ServerRole::of(server_id) == ServerRole::Primary
}

pub fn is_system_name(name: &str) -> bool {
    name.starts_with('_')
}

/// Orders shard names by their numeric suffix (`s99` before `s100`), falling
/// back to plain string order for names that do not follow the `s<id>` form.
pub fn compare_shard_names(a: &str, b: &str) -> Ordering {
    match (shard_number(a), shard_number(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

fn shard_number(name: &str) -> Option<u64> {
    SHARD_NAME
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Orders collection ids numerically; ids are monotonically increasing so
/// the smaller one is the older record.
pub fn compare_cids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Converts an ArangoDB endpoint (`tcp://host:port`, `ssl://host:port`) into
/// an HTTP base URL. Endpoints that already carry an HTTP scheme are kept.
pub fn endpoint_to_url(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    match ENDPOINT_SCHEME.captures(trimmed).and_then(|c| c.get(1)) {
        Some(scheme) => {
            let rest = &trimmed[scheme.end() + 3..];
            match scheme.as_str() {
                "ssl" | "https" => format!("https://{}", rest),
                _ => format!("http://{}", rest),
            }
        }
        None => format!("http://{}", trimmed),
    }
}
