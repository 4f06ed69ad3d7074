//! Registry Module
//!
//! Process-wide bookkeeping of configured cache instances. Two callers
//! asking for the same tier configuration get the same shared instance,
//! which keeps a single store owning each persistent directory and a
//! single accounting domain per memory budget.

use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::cache::{DiskTier, LayeredCache, MemoryTier};
use crate::config::{DiskConfig, MemoryConfig, RegistryConfig, SizeMode};
use crate::encrypt::CipherProvider;
use crate::error::Result;

// == Registry ==
/// Interns memory tiers, persistent tiers, and layered caches by their
/// configuration.
pub struct Registry {
    config: RegistryConfig,
    cipher: Option<Arc<dyn CipherProvider>>,
    memory_tiers: Mutex<HashMap<String, Arc<MemoryTier>>>,
    disk_tiers: Mutex<HashMap<String, Arc<DiskTier>>>,
    caches: Mutex<HashMap<String, Arc<LayeredCache>>>,
}

impl Registry {
    // == Constructors ==
    /// A registry with the given defaults and no cipher provider; caches it
    /// hands out store plaintext regardless of `encrypt` flags.
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_cipher_opt(config, None)
    }

    /// A registry whose persistent tiers run payloads through `cipher` when
    /// a write or read asks for encryption.
    pub fn with_cipher(config: RegistryConfig, cipher: Arc<dyn CipherProvider>) -> Self {
        Self::with_cipher_opt(config, Some(cipher))
    }

    fn with_cipher_opt(config: RegistryConfig, cipher: Option<Arc<dyn CipherProvider>>) -> Self {
        Self {
            config,
            cipher,
            memory_tiers: Mutex::new(HashMap::new()),
            disk_tiers: Mutex::new(HashMap::new()),
            caches: Mutex::new(HashMap::new()),
        }
    }

    /// The defaults this registry resolves omitted parameters against.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // == Memory tiers ==
    /// Returns the memory tier for this budget and accounting mode,
    /// constructing it on first request.
    pub fn memory_tier(&self, max_units: u64, mode: SizeMode) -> Arc<MemoryTier> {
        let key = format!("{max_units}:{mode:?}");
        let mut tiers = lock(&self.memory_tiers);
        if let Some(tier) = tiers.get(&key) {
            return Arc::clone(tier);
        }
        debug!(max_units, ?mode, "constructing memory tier");
        let tier = Arc::new(MemoryTier::new(max_units, mode));
        tiers.insert(key, Arc::clone(&tier));
        tier
    }

    /// [`memory_tier`](Self::memory_tier) with the parameters bundled in a
    /// [`MemoryConfig`].
    pub fn memory_tier_from(&self, config: &MemoryConfig) -> Arc<MemoryTier> {
        self.memory_tier(config.max_units, config.mode)
    }

    /// The memory tier built from the registry defaults, sized by bytes.
    pub fn default_memory_tier(&self) -> Arc<MemoryTier> {
        self.memory_tier(self.config.memory_max_units, SizeMode::BySize)
    }

    // == Persistent tiers ==
    /// Returns the persistent tier over `config.path`, constructing it on
    /// first request. Construction can fail on I/O and surfaces the error.
    ///
    /// Tiers are interned by the resolved directory, so two spellings of
    /// one path can never yield two independent stores over the same files.
    pub fn disk_tier(&self, config: &DiskConfig) -> Result<Arc<DiskTier>> {
        fs::create_dir_all(&config.path)?;
        let resolved = fs::canonicalize(&config.path)?;
        let key = format!("{}:{}", resolved.display(), config.max_bytes);
        let mut tiers = lock(&self.disk_tiers);
        if let Some(tier) = tiers.get(&key) {
            return Ok(Arc::clone(tier));
        }
        debug!(path = %config.path.display(), max_bytes = config.max_bytes, "opening persistent tier");
        let tier = Arc::new(DiskTier::open(config, self.cipher.clone())?);
        tiers.insert(key, Arc::clone(&tier));
        Ok(tier)
    }

    /// The persistent tier built from the registry defaults, under a
    /// subdirectory of the configured cache path.
    pub fn default_disk_tier(&self, name: &str) -> Result<Arc<DiskTier>> {
        let mut config = DiskConfig::new(self.config.cache_path.join(name));
        config.schema_version = self.config.schema_version;
        config.max_bytes = self.config.disk_max_bytes;
        self.disk_tier(&config)
    }

    // == Layered caches ==
    /// Returns the layered cache over this tier pair, constructing it on
    /// first request. Identity follows the tier instances plus the
    /// encryption parameters, so two calls with the same tiers but a
    /// different default or key hint get distinct caches.
    pub fn cache(
        &self,
        memory: Arc<MemoryTier>,
        disk: Arc<DiskTier>,
        default_encrypt: bool,
        key_hint: Option<String>,
    ) -> Arc<LayeredCache> {
        let key = format!(
            "{:p}:{:p}:{default_encrypt}:{key_hint:?}",
            Arc::as_ptr(&memory),
            Arc::as_ptr(&disk)
        );
        let mut caches = lock(&self.caches);
        if let Some(cache) = caches.get(&key) {
            return Arc::clone(cache);
        }
        let cache = Arc::new(LayeredCache::new(memory, disk, default_encrypt, key_hint));
        caches.insert(key, Arc::clone(&cache));
        cache
    }

    /// A layered cache named `name`, built entirely from registry defaults:
    /// default memory budget, persistent data under `<cache_path>/<name>`,
    /// plaintext unless a call opts in.
    pub fn default_cache(&self, name: &str) -> Result<Arc<LayeredCache>> {
        let memory = self.default_memory_tier();
        let disk = self.default_disk_tier(name)?;
        Ok(self.cache(memory, disk, false, None))
    }

    /// Drops every interned instance. Existing `Arc` handles stay valid;
    /// later requests construct fresh tiers.
    pub fn clear(&self) {
        lock(&self.memory_tiers).clear();
        lock(&self.disk_tiers).clear();
        lock(&self.caches).clear();
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("memory_tiers", &lock(&self.memory_tiers).len())
            .field("disk_tiers", &lock(&self.disk_tiers).len())
            .field("caches", &lock(&self.caches).len())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
