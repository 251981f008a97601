//! Contract byte sources.
//!
//! Sources are tried in order and the first one that yields bytes wins. A
//! source that is absent or empty passes to the next one; a source that fails
//! to read stops the chain.

use std::borrow::Cow;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::SourceError;

/// Contract compiled into the binary.
#[cfg(feature = "bundled-contract")]
pub const BUNDLED_CONTRACT: &[u8] =
    include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/openapi/openapi.yml"));

/// Contract compiled into the binary (empty: bundling disabled).
#[cfg(not(feature = "bundled-contract"))]
pub const BUNDLED_CONTRACT: &[u8] = &[];

/// A provider of raw contract bytes.
pub trait ContractSource: Send + Sync {
    /// Human-readable description used in logs and errors.
    fn describe(&self) -> String;

    /// Read the contract.
    ///
    /// `Ok(None)` means the source has nothing to offer and the next one
    /// should be tried. `Err` is fatal.
    fn read(&self) -> io::Result<Option<Cow<'static, [u8]>>>;
}

/// Bytes embedded at compile time.
#[derive(Debug, Clone, Copy)]
pub struct BundledSource {
    bytes: &'static [u8],
}

impl BundledSource {
    /// Wrap an embedded byte slice.
    pub fn new(bytes: &'static [u8]) -> Self {
        Self { bytes }
    }
}

impl Default for BundledSource {
    fn default() -> Self {
        Self::new(BUNDLED_CONTRACT)
    }
}

impl ContractSource for BundledSource {
    fn describe(&self) -> String {
        "bundled contract".to_string()
    }

    fn read(&self) -> io::Result<Option<Cow<'static, [u8]>>> {
        // Embedding cannot fail at runtime; only emptiness matters.
        if self.bytes.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Cow::Borrowed(self.bytes)))
        }
    }
}

/// Contract file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Read from `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path this source reads.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ContractSource for FileSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn read(&self) -> io::Result<Option<Cow<'static, [u8]>>> {
        let bytes = std::fs::read(&self.path)?;
        if bytes.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Cow::Owned(bytes)))
        }
    }
}

/// Bytes produced by a [`SourceChain`].
#[derive(Debug, Clone)]
pub struct ResolvedContract {
    /// Description of the source that produced the bytes.
    pub origin: String,
    /// Raw contract bytes.
    pub bytes: Cow<'static, [u8]>,
}

/// Ordered list of contract sources.
#[derive(Default)]
pub struct SourceChain {
    sources: Vec<Box<dyn ContractSource>>,
}

impl SourceChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source; earlier sources take precedence.
    pub fn with(mut self, source: impl ContractSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Bundled contract first, then `fallback` on disk.
    pub fn bundled_then_file(fallback: impl AsRef<Path>) -> Self {
        Self::new()
            .with(BundledSource::default())
            .with(FileSource::new(fallback))
    }

    /// Number of sources in the chain.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the chain has no sources.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Return the bytes of the first source that has any.
    pub fn resolve(&self) -> Result<ResolvedContract, SourceError> {
        let mut tried = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let origin = source.describe();
            match source.read() {
                Ok(Some(bytes)) => {
                    debug!(source = %origin, bytes = bytes.len(), "Contract source resolved");
                    return Ok(ResolvedContract { origin, bytes });
                }
                Ok(None) => {
                    debug!(source = %origin, "Contract source empty, trying next");
                    tried.push(origin);
                }
                Err(error) => return Err(SourceError::Read { origin, error }),
            }
        }

        Err(SourceError::Exhausted { tried })
    }
}
