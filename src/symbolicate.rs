use std::path::PathBuf;
use std::time::Duration;

use futures_util::future::join_all;
use rustc_hash::FxHashMap;

use crate::classify::{find_owning_lib, relative_offset, OffsetAdjustment};
use crate::error::Error;
use crate::profile::{Lib, Profile, Thread};
use crate::registry::LibraryRegistry;
use crate::resolve::{fallback_label, BatchResolver};

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// A string-table slot that's waiting for its symbol: `index` is the
/// position in the owning thread's string table, `offset` the
/// file-relative offset to resolve.
struct PendingOffset {
    index: usize,
    offset: u64,
}

pub struct Symbolicator {
    registry: LibraryRegistry,
    resolver: BatchResolver,
    batch_size: usize,
    adjustment: OffsetAdjustment,
}

impl Symbolicator {
    pub fn new(
        lib_dirs: Vec<PathBuf>,
        addr2line: PathBuf,
        timeout: Duration,
        batch_size: usize,
        adjustment: OffsetAdjustment,
    ) -> Self {
        Self {
            registry: LibraryRegistry::new(lib_dirs),
            resolver: BatchResolver::new(addr2line, timeout),
            batch_size: batch_size.max(1),
            adjustment,
        }
    }

    /// Replaces raw `0xHEX` entries in every thread's string table with
    /// resolved symbols, in place. All threads are processed
    /// concurrently; only registry scan I/O errors are hard failures,
    /// everything else degrades per-address.
    pub async fn symbolicate_profile(&self, profile: &mut Profile) -> Result<(), Error> {
        let libs = &profile.libs;
        let results = join_all(
            profile
                .threads
                .iter_mut()
                .map(|thread| self.symbolicate_thread(libs, thread)),
        )
        .await;
        results.into_iter().collect()
    }

    async fn symbolicate_thread(&self, libs: &[Lib], thread: &mut Thread) -> Result<(), Error> {
        let Some(strings) = thread.string_table.as_mut() else {
            return Ok(());
        };

        let mut lib_offsets: FxHashMap<&str, Vec<PendingOffset>> = FxHashMap::default();
        for (index, entry) in strings.iter().enumerate() {
            let Some(address) = parse_address_token(entry) else {
                continue;
            };
            // Addresses outside every library's range stay as they are.
            let Some(lib) = find_owning_lib(libs, address) else {
                continue;
            };
            let offset = relative_offset(lib, address, self.adjustment);
            lib_offsets
                .entry(lib.name.as_str())
                .or_default()
                .push(PendingOffset { index, offset });
        }

        let groups = join_all(
            lib_offsets
                .into_iter()
                .map(|(lib_name, pending)| self.resolve_for_lib(lib_name, pending)),
        )
        .await;

        for group in groups {
            for (index, symbol) in group? {
                strings[index] = symbol;
            }
        }
        Ok(())
    }

    /// Resolves all pending offsets of one library: looks up the binary
    /// path (once per run per library, via the registry), then resolves
    /// batches of at most `batch_size` offsets concurrently.
    async fn resolve_for_lib(
        &self,
        lib_name: &str,
        pending: Vec<PendingOffset>,
    ) -> Result<Vec<(usize, String)>, Error> {
        let Some(lib_path) = self.registry.resolve_library_path(lib_name).await? else {
            log::warn!("No binary found for {lib_name}, using fallback labels");
            return Ok(pending
                .into_iter()
                .map(|p| (p.index, fallback_label(p.offset, lib_name)))
                .collect());
        };

        log::debug!(
            "Resolving {} addresses in {lib_name} via {}",
            pending.len(),
            lib_path.display()
        );
        let lib_path = &lib_path;
        let batches = join_all(pending.chunks(self.batch_size).map(|chunk| async move {
            let offsets: Vec<u64> = chunk.iter().map(|p| p.offset).collect();
            let symbols = self.resolver.resolve_batch(lib_path, lib_name, &offsets).await;
            chunk
                .iter()
                .zip(symbols)
                .map(|(p, symbol)| (p.index, symbol))
                .collect::<Vec<_>>()
        }))
        .await;

        let mut resolved = Vec::with_capacity(pending.len());
        for batch in batches {
            resolved.extend(batch);
        }
        Ok(resolved)
    }
}

/// Parses a string-table entry of the form `0x` + hex digits. Anything
/// else, including an already-substituted fallback label like
/// `"0x50 in libxul.so"`, is not a candidate; this is what makes
/// symbolication idempotent.
fn parse_address_token(entry: &str) -> Option<u64> {
    let hex = entry.strip_prefix("0x")?;
    if hex.is_empty() {
        return None;
    }
    u64::from_str_radix(hex, 16).ok()
}
