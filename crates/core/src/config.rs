//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into
//! services by `Arc`. Nothing in the core reads environment variables during
//! request handling; that keeps behaviour consistent across threads and test
//! harnesses.

use crate::catalog::RangeCatalog;
use crate::constants::{MAX_RECOLLECTIONS_PER_CHAIN, MAX_RETESTS_PER_LINEAGE};
use crate::physiologic::PhysiologicLimitTable;
use crate::{LabError, LabResult};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    catalog: RangeCatalog,
    limits: PhysiologicLimitTable,
    max_retests_per_lineage: u32,
    max_recollections_per_chain: u32,
}

impl CoreConfig {
    /// Create a configuration with the default attempt ceilings.
    pub fn new(catalog: RangeCatalog, limits: PhysiologicLimitTable) -> Self {
        Self {
            catalog,
            limits,
            max_retests_per_lineage: MAX_RETESTS_PER_LINEAGE,
            max_recollections_per_chain: MAX_RECOLLECTIONS_PER_CHAIN,
        }
    }

    /// Override the attempt ceilings. Zero ceilings would make every
    /// rejection force escalation immediately, which is a misconfiguration.
    pub fn with_ceilings(
        mut self,
        max_retests_per_lineage: u32,
        max_recollections_per_chain: u32,
    ) -> LabResult<Self> {
        if max_retests_per_lineage == 0 || max_recollections_per_chain == 0 {
            return Err(LabError::Validation(
                "attempt ceilings must be at least 1".into(),
            ));
        }
        self.max_retests_per_lineage = max_retests_per_lineage;
        self.max_recollections_per_chain = max_recollections_per_chain;
        Ok(self)
    }

    pub fn catalog(&self) -> &RangeCatalog {
        &self.catalog
    }

    pub fn limits(&self) -> &PhysiologicLimitTable {
        &self.limits
    }

    pub fn max_retests_per_lineage(&self) -> u32 {
        self.max_retests_per_lineage
    }

    pub fn max_recollections_per_chain(&self) -> u32 {
        self.max_recollections_per_chain
    }
}

impl Default for CoreConfig {
    /// Built-in catalog and limit tables with default ceilings.
    fn default() -> Self {
        Self::new(RangeCatalog::builtin(), PhysiologicLimitTable::builtin())
    }
}
