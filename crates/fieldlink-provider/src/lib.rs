//! Read-only, path-keyed game content tree.
//!
//! Static game-content templates live in asset archives that are parsed
//! elsewhere; this crate is the narrow interface the session core
//! consumes them through: a property tree resolved by slash-delimited
//! paths (`"Server/Spawns/3"`), where a node carries an optional typed
//! leaf value and an ordered list of children. Child order is the source
//! data's declared order — template parsers depend on it.
//!
//! Resolution may be backed by lazy archive reads, so [`DataProvider`]
//! is async; [`InMemoryProvider`] is the eager implementation used by
//! tests and by content baked at startup.

#![allow(async_fn_in_trait)]

mod error;
mod templates;
mod tree;

pub use error::ProviderError;
pub use templates::TemplateCollection;
pub use tree::{DataNode, DataValue};

/// Resolves content nodes by path.
///
/// Returns `Ok(None)` for a path that does not exist — absence is an
/// ordinary answer, not an error. Errors are reserved for the backing
/// store failing (corrupt archive, I/O).
pub trait DataProvider: Send + Sync + 'static {
    /// Resolves a slash-delimited path to a node, cloning it out of the
    /// backing store.
    async fn resolve(&self, path: &str) -> Result<Option<DataNode>, ProviderError>;
}

/// An eagerly loaded, fully in-memory provider.
pub struct InMemoryProvider {
    root: DataNode,
}

impl InMemoryProvider {
    /// Wraps an already-built tree. The root node's own name and value
    /// are ignored; paths resolve against its children.
    pub fn new(root: DataNode) -> Self {
        Self { root }
    }
}

impl DataProvider for InMemoryProvider {
    async fn resolve(&self, path: &str) -> Result<Option<DataNode>, ProviderError> {
        Ok(self.root.resolve(path).cloned())
    }
}
