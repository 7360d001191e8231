//! The property tree: nodes, values, path resolution.

/// A typed leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// Integer leaf (covers every integer width in the source data).
    Int(i64),
    /// Floating-point leaf.
    Float(f64),
    /// String leaf.
    String(String),
    /// 2D vector leaf.
    Vector(i32, i32),
}

/// One node of the content tree.
///
/// Children keep their declared order; lookups by name scan rather than
/// hash because nodes rarely have more than a handful of children and
/// the scan preserves a single ordered representation.
#[derive(Debug, Clone, PartialEq)]
pub struct DataNode {
    name: String,
    value: Option<DataValue>,
    children: Vec<DataNode>,
}

impl DataNode {
    /// A node with children and no value.
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            children: Vec::new(),
        }
    }

    /// A node with a value and no children.
    pub fn leaf(name: impl Into<String>, value: DataValue) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
            children: Vec::new(),
        }
    }

    /// This node's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This node's leaf value, if any.
    pub fn value(&self) -> Option<&DataValue> {
        self.value.as_ref()
    }

    /// Appends a child, preserving declaration order.
    pub fn push_child(&mut self, child: DataNode) -> &mut Self {
        self.children.push(child);
        self
    }

    /// Children in declared order.
    pub fn children(&self) -> impl Iterator<Item = &DataNode> {
        self.children.iter()
    }

    /// Number of children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Direct child by name.
    pub fn child(&self, name: &str) -> Option<&DataNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Resolves a slash-delimited path relative to this node.
    ///
    /// An empty path resolves to the node itself. Empty segments (from
    /// doubled or trailing slashes) are skipped.
    pub fn resolve(&self, path: &str) -> Option<&DataNode> {
        let mut node = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            node = node.child(segment)?;
        }
        Some(node)
    }

    /// Integer leaf value, narrowed to i32. `None` if absent, another
    /// type, or out of range.
    pub fn as_i32(&self) -> Option<i32> {
        match self.value {
            Some(DataValue::Int(v)) => i32::try_from(v).ok(),
            _ => None,
        }
    }

    /// Integer leaf value.
    pub fn as_i64(&self) -> Option<i64> {
        match self.value {
            Some(DataValue::Int(v)) => Some(v),
            _ => None,
        }
    }

    /// Float leaf value. Integer leaves widen losslessly enough for
    /// content data.
    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            Some(DataValue::Float(v)) => Some(v),
            Some(DataValue::Int(v)) => Some(v as f64),
            _ => None,
        }
    }

    /// String leaf value.
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Some(DataValue::String(v)) => Some(v),
            _ => None,
        }
    }

    /// Vector leaf value.
    pub fn as_vector(&self) -> Option<(i32, i32)> {
        match self.value {
            Some(DataValue::Vector(x, y)) => Some((x, y)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> DataNode {
        let mut root = DataNode::directory("");
        let mut field = DataNode::directory("Field");
        field.push_child(DataNode::leaf("id", DataValue::Int(104_000_000)));
        field.push_child(DataNode::leaf("name", DataValue::String("Lith".into())));
        field.push_child(DataNode::leaf("spawn", DataValue::Vector(12, -4)));
        root.push_child(field);
        root
    }

    #[test]
    fn test_resolve_nested_path() {
        let root = tree();
        assert_eq!(
            root.resolve("Field/id").unwrap().as_i32(),
            Some(104_000_000)
        );
    }

    #[test]
    fn test_resolve_empty_path_is_self() {
        let root = tree();
        assert_eq!(root.resolve("").unwrap().name(), "");
    }

    #[test]
    fn test_resolve_tolerates_redundant_slashes() {
        let root = tree();
        assert!(root.resolve("Field//name/").is_some());
    }

    #[test]
    fn test_resolve_missing_segment_is_none() {
        assert!(tree().resolve("Field/hp").is_none());
    }

    #[test]
    fn test_children_preserve_declared_order() {
        let root = tree();
        let names: Vec<_> = root
            .resolve("Field")
            .unwrap()
            .children()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, ["id", "name", "spawn"]);
    }

    #[test]
    fn test_typed_accessors_reject_wrong_types() {
        let root = tree();
        let name = root.resolve("Field/name").unwrap();
        assert_eq!(name.as_str(), Some("Lith"));
        assert_eq!(name.as_i32(), None);

        let spawn = root.resolve("Field/spawn").unwrap();
        assert_eq!(spawn.as_vector(), Some((12, -4)));
    }
}
