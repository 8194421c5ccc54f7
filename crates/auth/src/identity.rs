//! The resolved caller of an authenticated request.

use shared_types::EndpointId;

/// What the authentication middleware injects into request context
/// after resolving a bearer token (§4.8 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Endpoint(EndpointId),
    Admin,
}

impl Identity {
    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Identity::Admin)
    }

    /// True when this identity IS the endpoint named `id`. Admin is
    /// never automatically self — routes that also allow admin access
    /// (e.g. `DELETE /api/endpoints/{id}`) check `is_admin()` in
    /// addition to this.
    #[must_use]
    pub fn is_endpoint(self, id: EndpointId) -> bool {
        matches!(self, Identity::Endpoint(self_id) if self_id == id)
    }
}
