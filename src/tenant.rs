use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tracing::info;

use crate::compactor;
use crate::engine::Engine;
use crate::limits::*;
use crate::notify::NotifyHub;

/// Per-tenant engines. Each tenant gets its own Engine, WAL file and compactor.
pub struct TenantManager {
    engines: DashMap<String, Arc<Engine>>,
    /// Held while a tenant is opened so one WAL file never gets two engines.
    opening: Mutex<()>,
    data_dir: PathBuf,
    compact_threshold: u64,
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64) -> Self {
        Self {
            engines: DashMap::new(),
            opening: Mutex::new(()),
            data_dir,
            compact_threshold,
        }
    }

    /// Get or lazily open the engine for `tenant`.
    ///
    /// Tenant names become file names, so only lowercase ASCII letters,
    /// digits, `_` and `-` are accepted; anything else is `InvalidInput`
    /// rather than being rewritten onto another tenant's file.
    pub fn get_or_create(&self, tenant: &str) -> io::Result<Arc<Engine>> {
        if let Some(engine) = self.engines.get(tenant) {
            return Ok(engine.value().clone());
        }
        validate_name(tenant)?;

        let _opening = self
            .opening
            .lock()
            .map_err(|_| io::Error::other("tenant registry poisoned"))?;
        // Another caller may have opened it while we waited
        if let Some(engine) = self.engines.get(tenant) {
            return Ok(engine.value().clone());
        }
        if self.engines.len() >= MAX_TENANTS {
            return Err(io::Error::other("too many tenants"));
        }

        std::fs::create_dir_all(&self.data_dir)?;
        let wal_path = self.data_dir.join(format!("{tenant}.wal"));
        let engine = Arc::new(Engine::new(wal_path, Arc::new(NotifyHub::new()))?);
        self.engines.insert(tenant.to_string(), engine.clone());

        let compactor_engine = engine.clone();
        let threshold = self.compact_threshold;
        tokio::spawn(async move {
            compactor::run_compactor(compactor_engine, threshold).await;
        });

        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.engines.len() as f64);
        info!("tenant {tenant} open");
        Ok(engine)
    }

    /// Open tenants, sorted.
    pub fn tenants(&self) -> Vec<String> {
        let mut names: Vec<String> = self.engines.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

fn validate_name(tenant: &str) -> io::Result<()> {
    if tenant.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty tenant name"));
    }
    if tenant.len() > MAX_TENANT_NAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "tenant name too long",
        ));
    }
    let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-';
    if !tenant.chars().all(allowed) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid tenant name `{tenant}`"),
        ));
    }
    Ok(())
}
