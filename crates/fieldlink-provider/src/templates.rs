//! Eager template collections built over the content tree.

use std::collections::HashMap;

use crate::{DataNode, DataProvider, ProviderError};

/// Templates of one kind, parsed once at startup and immutable after.
///
/// `load_all` resolves a single root path and parses every child node
/// through the supplied parser; lookups afterwards are plain map reads
/// with no provider round trips.
pub struct TemplateCollection<T> {
    root_path: String,
    templates: HashMap<i32, T>,
}

impl<T> TemplateCollection<T> {
    /// Creates an empty collection rooted at `root_path`.
    pub fn new(root_path: impl Into<String>) -> Self {
        Self {
            root_path: root_path.into(),
            templates: HashMap::new(),
        }
    }

    /// Loads every template under the root path.
    ///
    /// `parse` maps a child node to `(id, template)`; returning `Err`
    /// aborts the load — half-parsed content is worse than no content.
    pub async fn load_all<P, F>(
        &mut self,
        provider: &P,
        mut parse: F,
    ) -> Result<(), ProviderError>
    where
        P: DataProvider,
        F: FnMut(&DataNode) -> Result<(i32, T), ProviderError>,
    {
        let root = provider
            .resolve(&self.root_path)
            .await?
            .ok_or_else(|| ProviderError::MissingPath(self.root_path.clone()))?;

        for child in root.children() {
            let (id, template) = parse(child)?;
            self.templates.insert(id, template);
        }

        tracing::info!(
            path = %self.root_path,
            count = self.templates.len(),
            "templates loaded"
        );
        Ok(())
    }

    /// Looks up a template by ID.
    pub fn get(&self, id: i32) -> Option<&T> {
        self.templates.get(&id)
    }

    /// Number of loaded templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// `true` before a successful load (or for empty content).
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DataValue, InMemoryProvider};

    fn provider() -> InMemoryProvider {
        let mut root = DataNode::directory("");
        let mut fields = DataNode::directory("Fields");
        for (id, name) in [(1, "plains"), (2, "cave")] {
            let mut node = DataNode::directory(id.to_string());
            node.push_child(DataNode::leaf("name", DataValue::String(name.into())));
            fields.push_child(node);
        }
        root.push_child(fields);
        InMemoryProvider::new(root)
    }

    #[tokio::test]
    async fn test_load_all_parses_each_child() {
        let mut collection: TemplateCollection<String> =
            TemplateCollection::new("Fields");

        collection
            .load_all(&provider(), |node| {
                let id = node.name().parse::<i32>().map_err(|_| {
                    ProviderError::Store(format!("bad id {}", node.name()))
                })?;
                let name = node
                    .child("name")
                    .and_then(DataNode::as_str)
                    .ok_or(ProviderError::TypeMismatch {
                        path: node.name().to_string(),
                        expected: "string",
                    })?;
                Ok((id, name.to_string()))
            })
            .await
            .unwrap();

        assert_eq!(collection.len(), 2);
        assert_eq!(collection.get(2).map(String::as_str), Some("cave"));
    }

    #[tokio::test]
    async fn test_load_all_missing_root_is_error() {
        let mut collection: TemplateCollection<String> =
            TemplateCollection::new("NoSuch");

        let err = collection
            .load_all(&provider(), |_| unreachable!("no children to parse"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingPath(_)));
    }
}
