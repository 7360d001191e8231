//! Field partitions and the objects placed in them.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use fieldlink_packet::{Packet, Point};

/// Anything that occupies a position in a field and can be shown to or
/// hidden from other clients in it.
pub trait FieldObject: Send + Sync {
    /// Identity within the current field; 0 before placement.
    fn object_id(&self) -> i32;

    /// The field the object currently occupies.
    fn field(&self) -> Option<Arc<Field>>;

    /// Current position.
    fn position(&self) -> Point;

    /// Moves the object.
    fn set_position(&self, position: Point);

    /// Packet that makes this object appear on a remote client.
    fn enter_field_packet(&self) -> Packet;

    /// Packet that removes this object from a remote client.
    fn leave_field_packet(&self) -> Packet;
}

/// One spatial partition of the game world.
///
/// The field hands out object identities; broadcast membership and
/// spatial queries live above this crate.
pub struct Field {
    id: i32,
    template_path: String,
    next_object_id: AtomicI32,
}

impl Field {
    /// Creates a field with the given template identity and the content
    /// path its template was loaded from.
    pub fn new(id: i32, template_path: impl Into<String>) -> Self {
        Self {
            id,
            template_path: template_path.into(),
            next_object_id: AtomicI32::new(1),
        }
    }

    /// The field's template identity.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// The content path of the field's template.
    pub fn template_path(&self) -> &str {
        &self.template_path
    }

    /// Issues the next object identity. Identities are unique within
    /// the field for its lifetime and never reused.
    pub fn assign_object_id(&self) -> i32 {
        self.next_object_id.fetch_add(1, Ordering::Relaxed)
    }
}
