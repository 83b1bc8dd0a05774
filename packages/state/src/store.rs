use crate::{paths, StateDb};

/// Read capability over IBC store paths.
pub trait StoreReader {
    /// Returns the record stored under `path`, if any.
    fn get(&self, path: &str) -> Option<Vec<u8>>;

    /// Returns whether a record exists under `path`.
    fn exists(&self, path: &str) -> bool {
        self.get(path).is_some()
    }
}

/// Write capability over IBC store paths.
pub trait StoreWriter: StoreReader {
    /// Stores `value` under `path`, overwriting any previous record.
    fn set(&mut self, path: &str, value: Vec<u8>);
}

/// Binds the path-addressed store capabilities to a backend [`StateDb`].
///
/// All reads observe writes made earlier in the same execution context;
/// rollback on failure is the host's concern.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct PrecompileStore<'a, S: StateDb> {
    db: &'a mut S,
}

impl<'a, S: StateDb> PrecompileStore<'a, S> {
    /// Creates a store view over `db`.
    #[must_use]
    pub const fn new(db: &'a mut S) -> Self {
        Self { db }
    }
}

impl<S: StateDb> StoreReader for PrecompileStore<'_, S> {
    fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.db.get(paths::key(path))
    }

    fn exists(&self, path: &str) -> bool {
        self.db.exists(paths::key(path))
    }
}

impl<S: StateDb> StoreWriter for PrecompileStore<'_, S> {
    fn set(&mut self, path: &str, value: Vec<u8>) {
        tracing::trace!(path, len = value.len(), "store write");
        self.db.set(paths::key(path), value);
    }
}

#[cfg(test)]
mod tests {
    use super::{PrecompileStore, StoreReader, StoreWriter};
    use crate::memory::InMemoryStateDb;
    use crate::{paths, StateDb};

    #[test]
    fn write_then_read_within_one_context() {
        let mut db = InMemoryStateDb::default();
        let mut store = PrecompileStore::new(&mut db);

        assert!(!store.exists("connections/connection-0"));
        store.set("connections/connection-0", b"record".to_vec());
        assert_eq!(Some(b"record".to_vec()), store.get("connections/connection-0"));
    }

    #[test]
    fn values_land_under_the_hashed_key() {
        let mut db = InMemoryStateDb::default();
        let mut store = PrecompileStore::new(&mut db);
        store.set("nextClientSeq", vec![7]);

        assert_eq!(Some(vec![7]), db.get(paths::key("nextClientSeq")));
    }
}
