//! Minimal view of a bookable resource, as seen by the webhook engine.

use uuid::Uuid;

/// Resource lookup result from the [`crate::store::ResourceDirectory`]
/// collaborator. The engine only needs identity, type, parent, and site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub id: Uuid,

    /// None when the type record was deleted mid-event; type-scope matching
    /// is then skipped rather than erroring.
    pub resource_type_id: Option<Uuid>,

    /// Parent in the resource hierarchy (e.g. a GPU inside a server).
    pub parent_id: Option<Uuid>,

    /// Site (federation) owning the resource.
    pub site_id: Uuid,
}
