use crate::utils::describe_key;
use crate::{Result, SandboxError};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use stellar_xdr::curr::{LedgerFootprint, LedgerKey, VecM};

/// Read-only and read-write key sets of a transaction.
///
/// A key is in at most one of the two sets; read-write wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Footprint {
    read_only: BTreeSet<LedgerKey>,
    read_write: BTreeSet<LedgerKey>,
}

impl Footprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_xdr(footprint: &LedgerFootprint) -> Self {
        let read_write: BTreeSet<LedgerKey> = footprint.read_write.iter().cloned().collect();
        let read_only = footprint
            .read_only
            .iter()
            .filter(|key| !read_write.contains(*key))
            .cloned()
            .collect();
        Self {
            read_only,
            read_write,
        }
    }

    pub fn to_xdr(&self) -> Result<LedgerFootprint> {
        Ok(LedgerFootprint {
            read_only: to_vecm(&self.read_only)?,
            read_write: to_vecm(&self.read_write)?,
        })
    }

    pub fn add_read(&mut self, key: LedgerKey) {
        if !self.read_write.contains(&key) {
            self.read_only.insert(key);
        }
    }

    pub fn add_write(&mut self, key: LedgerKey) {
        self.read_only.remove(&key);
        self.read_write.insert(key);
    }

    pub fn contains(&self, key: &LedgerKey) -> bool {
        self.read_only.contains(key) || self.read_write.contains(key)
    }

    pub fn is_writable(&self, key: &LedgerKey) -> bool {
        self.read_write.contains(key)
    }

    pub fn read_only(&self) -> impl Iterator<Item = &LedgerKey> {
        self.read_only.iter()
    }

    pub fn read_write(&self) -> impl Iterator<Item = &LedgerKey> {
        self.read_write.iter()
    }

    pub fn len(&self) -> usize {
        self.read_only.len() + self.read_write.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn to_vecm(keys: &BTreeSet<LedgerKey>) -> Result<VecM<LedgerKey>> {
    VecM::try_from(keys.iter().cloned().collect::<Vec<_>>())
        .map_err(|e| SandboxError::ResourceLimitExceeded(format!("footprint too large: {e}")))
}

/// How storage access is checked during one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationMode {
    /// Discover the footprint: every access is allowed and recorded.
    Recording,
    /// Only keys of the declared footprint may be touched.
    Enforcing(Footprint),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FootprintViolation {
    pub key: LedgerKey,
    pub access: AccessKind,
}

impl fmt::Display for FootprintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access = match self.access {
            AccessKind::Read => "read",
            AccessKind::Write => "write",
        };
        write!(
            f,
            "{access} of {} outside the declared footprint",
            describe_key(&self.key)
        )
    }
}

impl std::error::Error for FootprintViolation {}

/// Records every storage access of an evaluation and checks it against the
/// declared footprint when enforcing.
#[derive(Debug, Clone)]
pub struct FootprintTracker {
    mode: EvaluationMode,
    recorded: Footprint,
    read_sizes: BTreeMap<LedgerKey, u32>,
    write_sizes: BTreeMap<LedgerKey, u32>,
    violations: Vec<FootprintViolation>,
}

impl FootprintTracker {
    pub fn new(mode: EvaluationMode) -> Self {
        Self {
            mode,
            recorded: Footprint::new(),
            read_sizes: BTreeMap::new(),
            write_sizes: BTreeMap::new(),
            violations: Vec::new(),
        }
    }

    pub fn mode(&self) -> &EvaluationMode {
        &self.mode
    }

    /// Record a read of `key` whose current encoding is `size` bytes
    /// (zero when absent).
    pub fn record_read(&mut self, key: &LedgerKey, size: u32) -> std::result::Result<(), FootprintViolation> {
        self.recorded.add_read(key.clone());
        self.read_sizes.entry(key.clone()).or_insert(size);
        match &self.mode {
            EvaluationMode::Enforcing(declared) if !declared.contains(key) => {
                Err(self.violate(key, AccessKind::Read))
            }
            _ => Ok(()),
        }
    }

    /// Record a write of `key` with a new encoding of `size` bytes.
    pub fn record_write(&mut self, key: &LedgerKey, size: u32) -> std::result::Result<(), FootprintViolation> {
        self.recorded.add_write(key.clone());
        self.write_sizes.insert(key.clone(), size);
        match &self.mode {
            EvaluationMode::Enforcing(declared) if !declared.is_writable(key) => {
                Err(self.violate(key, AccessKind::Write))
            }
            _ => Ok(()),
        }
    }

    fn violate(&mut self, key: &LedgerKey, access: AccessKind) -> FootprintViolation {
        let violation = FootprintViolation {
            key: key.clone(),
            access,
        };
        if !self.violations.contains(&violation) {
            self.violations.push(violation.clone());
        }
        violation
    }

    pub fn footprint(&self) -> &Footprint {
        &self.recorded
    }

    pub fn violations(&self) -> &[FootprintViolation] {
        &self.violations
    }

    pub fn read_bytes(&self) -> u32 {
        self.read_sizes.values().fold(0u32, |acc, n| acc.saturating_add(*n))
    }

    pub fn write_bytes(&self) -> u32 {
        self.write_sizes.values().fold(0u32, |acc, n| acc.saturating_add(*n))
    }
}
