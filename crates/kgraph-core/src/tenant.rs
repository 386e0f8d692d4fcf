//! Tenant isolation: mapping a logical tenant onto a physical partition.
//!
//! The mapping is a pure function of the tenant id and the configured
//! strategy. Changing the strategy of a live deployment moves tenants to
//! different partitions and therefore requires an out-of-band data migration;
//! the resolver never tries to reconcile the two layouts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KgError, KgResult};
use crate::keys;

/// Length of the hash suffix appended when a tenant id had to be rewritten.
const LOSSY_SUFFIX_LEN: usize = 8;

/// How a partition is materialised by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationStrategy {
    /// One database per partition.
    PerDatabase,
    /// One schema (table namespace / scoped label set) per partition inside a
    /// shared database.
    PerSchema,
}

impl FromStr for IsolationStrategy {
    type Err = KgError;

    fn from_str(s: &str) -> KgResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "per-database" | "per_database" | "database" => Ok(Self::PerDatabase),
            "per-schema" | "per_schema" | "schema" => Ok(Self::PerSchema),
            other => Err(KgError::config(format!("unknown isolation strategy '{other}'"))),
        }
    }
}

/// How tenant ids are grouped into shards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ShardingStrategy {
    /// One shard per tenant.
    Passthrough,
    /// Numeric tenant ids grouped `size` at a time: shard `g{id / size}`.
    Grouped { size: u64 },
    /// Tenant ids hashed into `buckets` shards: shard `h{hash mod buckets}`.
    Hashed { buckets: u64 },
}

impl Default for ShardingStrategy {
    fn default() -> Self {
        Self::Passthrough
    }
}

impl ShardingStrategy {
    /// Group sizes and bucket counts must be positive.
    pub fn validate(&self) -> KgResult<()> {
        match *self {
            Self::Grouped { size: 0 } => {
                Err(KgError::config("grouped sharding size must be positive"))
            }
            Self::Hashed { buckets: 0 } => {
                Err(KgError::config("hashed sharding bucket count must be positive"))
            }
            _ => Ok(()),
        }
    }
}

impl FromStr for ShardingStrategy {
    type Err = KgError;

    /// Parses `passthrough`, `grouped:<N>` or `hashed:<N>`.
    fn from_str(s: &str) -> KgResult<Self> {
        let s = s.trim().to_lowercase();
        let (kind, arg) = match s.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (s.as_str(), None),
        };
        let count = |arg: Option<&str>| -> KgResult<u64> {
            arg.ok_or_else(|| KgError::config(format!("sharding strategy '{kind}' needs a size")))?
                .parse()
                .map_err(|_| KgError::config(format!("invalid sharding size in '{s}'")))
        };
        let strategy = match kind {
            "passthrough" | "none" => Self::Passthrough,
            "grouped" => Self::Grouped { size: count(arg)? },
            "hashed" => Self::Hashed { buckets: count(arg)? },
            other => return Err(KgError::config(format!("unknown sharding strategy '{other}'"))),
        };
        strategy.validate()?;
        Ok(strategy)
    }
}

impl fmt::Display for ShardingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passthrough => f.write_str("passthrough"),
            Self::Grouped { size } => write!(f, "grouped:{size}"),
            Self::Hashed { buckets } => write!(f, "hashed:{buckets}"),
        }
    }
}

/// Isolation settings of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationConfig {
    pub strategy: IsolationStrategy,
    #[serde(default)]
    pub sharding: ShardingStrategy,
    pub prefix: String,
}

impl IsolationConfig {
    pub fn validate(&self) -> KgResult<()> {
        if self.prefix.trim().is_empty() {
            return Err(KgError::config("partition prefix must not be empty"));
        }
        self.sharding.validate()
    }
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            strategy: IsolationStrategy::PerSchema,
            sharding: ShardingStrategy::Passthrough,
            prefix: "kg_tenant_".to_string(),
        }
    }
}

/// A tenant bound to its physical partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionHandle {
    pub tenant_id: String,
    pub partition: String,
    pub isolation: IsolationStrategy,
}

/// Pure tenant → partition mapping.
#[derive(Debug, Clone)]
pub struct TenantIsolationResolver {
    config: IsolationConfig,
}

impl TenantIsolationResolver {
    pub fn new(config: IsolationConfig) -> KgResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &IsolationConfig {
        &self.config
    }

    /// Physical partition name for `tenant_id`: `prefix + shard(tenant_id)`.
    pub fn physical_partition(&self, tenant_id: &str) -> KgResult<String> {
        if tenant_id.trim().is_empty() {
            return Err(KgError::validation("tenant id must not be empty"));
        }
        Ok(format!("{}{}", self.config.prefix, self.shard(tenant_id)?))
    }

    /// Resolve a tenant into a partition handle.
    pub fn resolve(&self, tenant_id: &str) -> KgResult<PartitionHandle> {
        Ok(PartitionHandle {
            tenant_id: tenant_id.to_string(),
            partition: self.physical_partition(tenant_id)?,
            isolation: self.config.strategy,
        })
    }

    fn shard(&self, tenant_id: &str) -> KgResult<String> {
        match self.config.sharding {
            ShardingStrategy::Passthrough => Ok(passthrough_shard(tenant_id)),
            ShardingStrategy::Grouped { size } => {
                let id: u64 = tenant_id.trim().parse().map_err(|_| {
                    KgError::validation(format!(
                        "grouped sharding needs a numeric tenant id, got '{tenant_id}'"
                    ))
                })?;
                let group = id
                    .checked_div(size)
                    .ok_or_else(|| KgError::config("grouped sharding size is zero"))?;
                Ok(format!("g{group}"))
            }
            ShardingStrategy::Hashed { buckets } => {
                let bucket = keys::hash_u64(tenant_id)
                    .checked_rem(buckets)
                    .ok_or_else(|| KgError::config("hashed sharding bucket count is zero"))?;
                Ok(format!("h{bucket}"))
            }
        }
    }
}

/// Lowercase and replace anything outside `[a-z0-9]` with `_`. When the
/// rewrite changed the id, a short hash of the raw id keeps distinct tenants
/// apart (`"A-b"` and `"a_b"` must not share a partition).
fn passthrough_shard(tenant_id: &str) -> String {
    let sanitized: String = tenant_id
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized == tenant_id {
        sanitized
    } else {
        format!("{sanitized}_{}", keys::short_hash(tenant_id, LOSSY_SUFFIX_LEN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(sharding: ShardingStrategy) -> TenantIsolationResolver {
        TenantIsolationResolver::new(IsolationConfig {
            strategy: IsolationStrategy::PerDatabase,
            sharding,
            prefix: "kg_".into(),
        })
        .unwrap()
    }

    #[test]
    fn passthrough_keeps_clean_ids() {
        let r = resolver(ShardingStrategy::Passthrough);
        assert_eq!(r.physical_partition("t1").unwrap(), "kg_t1");
        assert_eq!(r.physical_partition("t1").unwrap(), r.physical_partition("t1").unwrap());
    }

    #[test]
    fn passthrough_disambiguates_lossy_ids() {
        let r = resolver(ShardingStrategy::Passthrough);
        let a = r.physical_partition("a-b").unwrap();
        let b = r.physical_partition("a_b").unwrap();
        let c = r.physical_partition("A_B").unwrap();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert!(a.starts_with("kg_a_b_"));
        assert!(a.chars().all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_'));
    }

    #[test]
    fn grouped_sharding_buckets_numeric_ids() {
        let r = resolver(ShardingStrategy::Grouped { size: 100 });
        assert_eq!(r.physical_partition("42").unwrap(), "kg_g0");
        assert_eq!(r.physical_partition("199").unwrap(), "kg_g1");
        assert!(r.physical_partition("alice").is_err());
    }

    #[test]
    fn hashed_sharding_is_bounded_and_stable() {
        let r = resolver(ShardingStrategy::Hashed { buckets: 8 });
        for tenant in ["a", "b", "tenant-42", "ünïcode"] {
            let p = r.physical_partition(tenant).unwrap();
            let bucket: u64 = p.trim_start_matches("kg_h").parse().unwrap();
            assert!(bucket < 8);
            assert_eq!(p, r.physical_partition(tenant).unwrap());
        }
    }

    #[test]
    fn parses_strategy_strings() {
        assert_eq!(
            "passthrough".parse::<ShardingStrategy>().unwrap(),
            ShardingStrategy::Passthrough
        );
        assert_eq!(
            "grouped:50".parse::<ShardingStrategy>().unwrap(),
            ShardingStrategy::Grouped { size: 50 }
        );
        assert_eq!(
            "HASHED:16".parse::<ShardingStrategy>().unwrap(),
            ShardingStrategy::Hashed { buckets: 16 }
        );
        assert!("grouped".parse::<ShardingStrategy>().is_err());
        assert!("hashed:0".parse::<ShardingStrategy>().is_err());
        assert!("round-robin".parse::<ShardingStrategy>().is_err());
        assert_eq!(
            "per-schema".parse::<IsolationStrategy>().unwrap(),
            IsolationStrategy::PerSchema
        );
    }

    #[test]
    fn empty_prefix_and_tenant_are_rejected() {
        let config = IsolationConfig { prefix: " ".into(), ..Default::default() };
        let err = TenantIsolationResolver::new(config);
        assert!(matches!(err, Err(KgError::Config(_))));
        assert!(resolver(ShardingStrategy::Passthrough).resolve("  ").is_err());
    }

    #[test]
    fn zero_sized_shards_are_rejected() {
        for sharding in
            [ShardingStrategy::Grouped { size: 0 }, ShardingStrategy::Hashed { buckets: 0 }]
        {
            let config = IsolationConfig { sharding, ..Default::default() };
            assert!(matches!(config.validate(), Err(KgError::Config(_))));
            let err = TenantIsolationResolver::new(config);
            assert!(matches!(err, Err(KgError::Config(_))));
        }
        assert!("grouped:0".parse::<ShardingStrategy>().is_err());
    }

    #[test]
    fn partition_handles_can_key_maps() {
        let handle = resolver(ShardingStrategy::Passthrough).resolve("t1").unwrap();
        let mut seen = std::collections::HashSet::new();
        assert!(seen.insert(handle.clone()));
        assert!(!seen.insert(handle));
    }
}
