//! Proving and verification material, resolved per tree depth.
//!
//! Every depth has its own circuit, so each depth needs its own IPA
//! parameters and keys. The [`ArtifactResolver`] keeps one shared entry per
//! [`ArtifactKey`]: concurrent requests for the same key wait on a single
//! fetch, and a fetched entry stays cached until it is invalidated.

use crate::circuit::{circuit_k, keygen};
use crate::config::ArtifactsConfig;
use crate::error::ArtifactError;
use crate::{MAX_DEPTH, MIN_DEPTH};
use halo2_proofs::plonk::{ProvingKey, VerifyingKey};
use halo2_proofs::poly::commitment::Params;
use log::{debug, info, warn};
use parking_lot::Mutex;
use pasta_curves::vesta;
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Protocol name in every [`ArtifactKey`] and persisted file name.
pub const PROTOCOL: &str = "semaphore";

/// Bumped whenever the circuit layout changes.
pub const ARTIFACT_VERSION: &str = "1";

const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Identifies the artifacts for one circuit.
///
/// Displays as `semaphore-20-v1`. Artifacts from different versions are
/// never interchangeable, even at the same depth.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub protocol: String,
    /// Merkle tree depth of the circuit.
    pub depth: usize,
    pub version: String,
}

impl ArtifactKey {
    /// A key for this crate's protocol at `depth`.
    pub fn new(depth: usize, version: impl Into<String>) -> Self {
        ArtifactKey {
            protocol: PROTOCOL.to_string(),
            depth,
            version: version.into(),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-v{}", self.protocol, self.depth, self.version)
    }
}

/// Parameters and keys for the circuit of one depth.
///
/// Provers need all three parts. Verifiers only read `params` and `vk`.
pub struct SnarkArtifacts {
    pub depth: usize,
    /// IPA commitment parameters of size `2^circuit_k(depth)`.
    pub params: Params<vesta::Affine>,
    pub pk: ProvingKey<vesta::Affine>,
    pub vk: VerifyingKey<vesta::Affine>,
}

impl fmt::Debug for SnarkArtifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnarkArtifacts")
            .field("depth", &self.depth)
            .field("k", &self.params.k())
            .finish_non_exhaustive()
    }
}

/// Where artifacts come from. Fetching may block for a long time; the
/// resolver always calls it on the blocking pool.
pub trait ArtifactSource: Send + Sync {
    /// Produces the artifacts for `key`.
    ///
    /// # Errors
    ///
    /// Return [`ArtifactError::Unavailable`] for failures worth retrying and
    /// any other variant for permanent ones.
    fn fetch(&self, key: &ArtifactKey) -> Result<SnarkArtifacts, ArtifactError>;
}

/// Derives artifacts locally: IPA parameters for `circuit_k(depth)` followed
/// by key generation. Parameters can be persisted to and reloaded from a
/// cache directory; keys are always regenerated.
#[derive(Debug, Clone, Default)]
pub struct KeygenSource {
    cache_dir: Option<PathBuf>,
}

impl KeygenSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        KeygenSource {
            cache_dir: Some(cache_dir.into()),
        }
    }

    fn params(&self, key: &ArtifactKey, k: u32) -> Params<vesta::Affine> {
        let Some(dir) = &self.cache_dir else {
            return Params::new(k);
        };

        let path = dir.join(format!("{}-v{}-k{k}.params", key.protocol, key.version));
        if path.exists() {
            match File::open(&path).and_then(|file| Params::read(&mut BufReader::new(file))) {
                Ok(params) if params.k() == k => {
                    debug!("Loaded parameters from {}", path.display());
                    return params;
                }
                Ok(params) => warn!(
                    "Parameters in {} are for k={}, expected k={k}; regenerating",
                    path.display(),
                    params.k()
                ),
                Err(e) => warn!("Failed to read {}: {e}; regenerating", path.display()),
            }
        }

        let params = Params::new(k);
        match persist(&params, dir, &path) {
            Ok(()) => debug!("Saved parameters to {}", path.display()),
            Err(e) => warn!("Failed to save parameters to {}: {e}", path.display()),
        }
        params
    }
}

fn persist(params: &Params<vesta::Affine>, dir: &Path, path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let staging = path.with_extension("params.tmp");
    let mut writer = BufWriter::new(File::create(&staging)?);
    params.write(&mut writer)?;
    writer.flush()?;
    drop(writer);
    fs::rename(staging, path)
}

impl ArtifactSource for KeygenSource {
    fn fetch(&self, key: &ArtifactKey) -> Result<SnarkArtifacts, ArtifactError> {
        if !(MIN_DEPTH..=MAX_DEPTH).contains(&key.depth) {
            return Err(ArtifactError::UnsupportedDepth(key.depth));
        }
        let k = circuit_k(key.depth);
        info!("Generating artifacts for {key} (k={k})");

        let params = self.params(key, k);
        let (vk, pk) = keygen(key.depth, &params).map_err(|e| ArtifactError::Keygen {
            depth: key.depth,
            reason: format!("{e:?}"),
        })?;

        Ok(SnarkArtifacts {
            depth: key.depth,
            params,
            pk,
            vk,
        })
    }
}

type Entry = Arc<OnceCell<Arc<SnarkArtifacts>>>;

/// Depth-indexed cache in front of an [`ArtifactSource`].
///
/// Share one resolver between proof generation and verification so each
/// depth is fetched once per process. The key map lock is only held to look
/// up or insert an entry, never across a fetch.
pub struct ArtifactResolver {
    source: Arc<dyn ArtifactSource>,
    version: String,
    max_retries: u32,
    retry_backoff: Duration,
    entries: Mutex<HashMap<ArtifactKey, Entry>>,
}

impl Default for ArtifactResolver {
    fn default() -> Self {
        Self::new(KeygenSource::new())
    }
}

impl fmt::Debug for ArtifactResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactResolver")
            .field("version", &self.version)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff", &self.retry_backoff)
            .field("entries", &self.entries.lock().len())
            .finish_non_exhaustive()
    }
}

impl ArtifactResolver {
    /// A resolver over `source` with the current [`ARTIFACT_VERSION`] and
    /// default retry policy.
    pub fn new(source: impl ArtifactSource + 'static) -> Self {
        Self::with_source(Arc::new(source))
    }

    /// Like [`ArtifactResolver::new`], for a source that is already shared.
    pub fn with_source(source: Arc<dyn ArtifactSource>) -> Self {
        ArtifactResolver {
            source,
            version: ARTIFACT_VERSION.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// A [`KeygenSource`] resolver configured from the `[artifacts]` section.
    ///
    /// Parameters are persisted under `cache_dir` only when
    /// `enable_persistence` is set.
    pub fn from_config(config: &ArtifactsConfig) -> Self {
        let source = if config.enable_persistence {
            KeygenSource::with_cache_dir(&config.cache_dir)
        } else {
            KeygenSource::new()
        };
        Self::new(source)
            .with_version(config.version.clone())
            .with_retries(
                config.max_retries,
                Duration::from_millis(config.retry_backoff_ms),
            )
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Retries transient failures `max_retries` times, waiting
    /// `backoff * attempt` before each retry.
    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    /// The key this resolver uses for `depth`.
    #[must_use]
    pub fn key(&self, depth: usize) -> ArtifactKey {
        ArtifactKey::new(depth, self.version.clone())
    }

    /// Artifacts for `depth`, fetched on first use.
    ///
    /// # Errors
    /// [`ArtifactError::UnsupportedDepth`] outside `MIN_DEPTH..=MAX_DEPTH`,
    /// otherwise whatever the source reports once retries are exhausted.
    /// A failed fetch is not cached.
    pub async fn resolve(&self, depth: usize) -> Result<Arc<SnarkArtifacts>, ArtifactError> {
        if !(MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
            return Err(ArtifactError::UnsupportedDepth(depth));
        }
        let key = self.key(depth);
        let entry = Arc::clone(self.entries.lock().entry(key.clone()).or_default());

        entry
            .get_or_try_init(|| self.fetch_with_retry(&key))
            .await
            .map(Arc::clone)
    }

    /// Cached artifacts for `depth`, without fetching.
    #[must_use]
    pub fn cached(&self, depth: usize) -> Option<Arc<SnarkArtifacts>> {
        let key = self.key(depth);
        self.entries
            .lock()
            .get(&key)
            .and_then(|entry| entry.get().cloned())
    }

    /// Drops the entry for `key`. Returns whether there was one.
    pub fn invalidate(&self, key: &ArtifactKey) -> bool {
        let removed = self.entries.lock().remove(key).is_some();
        if removed {
            debug!("Invalidated artifacts for {key}");
        }
        removed
    }

    async fn fetch_with_retry(&self, key: &ArtifactKey) -> Result<Arc<SnarkArtifacts>, ArtifactError> {
        let mut attempt = 0;
        loop {
            let source = Arc::clone(&self.source);
            let request = key.clone();
            let result = tokio::task::spawn_blocking(move || source.fetch(&request))
                .await
                .unwrap_or_else(|e| {
                    Err(ArtifactError::Unavailable {
                        depth: key.depth,
                        reason: format!("fetch task failed: {e}"),
                    })
                });

            match result {
                Ok(artifacts) => {
                    info!("Resolved artifacts for {key}");
                    return Ok(Arc::new(artifacts));
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "Fetching artifacts for {key} failed ({e}), retry {attempt}/{}",
                        self.max_retries
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
