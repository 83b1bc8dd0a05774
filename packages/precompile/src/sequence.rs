//! Monotonic identifier allocation.
//!
//! Counters are 8-byte big-endian blobs in the precompile store. The host
//! serializes precompile calls, so a plain read/format/increment/write is
//! race-free; a port to a concurrently-executing host must serialize these
//! per key.

use ibc_precompile_state::{StoreReader, StoreWriter};

/// Reads the counter under `path` without advancing it; absent or malformed
/// counters read as zero.
pub(crate) fn peek(store: &dyn StoreReader, path: &str) -> u64 {
    store.get(path).map_or(0, |bytes| {
        <[u8; 8]>::try_from(bytes.as_slice()).map_or(0, u64::from_be_bytes)
    })
}

/// Persists `current + 1` under `path`.
pub(crate) fn bump(store: &mut dyn StoreWriter, path: &str, current: u64) {
    store.set(path, (current + 1).to_be_bytes().to_vec());
}

#[cfg(test)]
mod tests {
    use ibc_precompile_state::memory::InMemoryStateDb;
    use ibc_precompile_state::PrecompileStore;

    use super::{bump, peek};

    #[test]
    fn fresh_counter_reads_zero() {
        let mut db = InMemoryStateDb::default();
        let store = PrecompileStore::new(&mut db);
        assert_eq!(0, peek(&store, "nextClientSeq"));
    }

    #[test]
    fn bump_advances_by_one() {
        let mut db = InMemoryStateDb::default();
        let mut store = PrecompileStore::new(&mut db);
        bump(&mut store, "nextClientSeq", 3454);
        assert_eq!(3455, peek(&store, "nextClientSeq"));
    }
}
