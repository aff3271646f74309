//! Tenancy scope.

use serde::{Deserialize, Serialize};

use super::id::{BranchId, OrganizationId};

/// The organization and branch an operation runs under.
///
/// Every read and write is filtered by both ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Branch within the organization.
    pub branch_id: BranchId,
}

impl Scope {
    /// Creates a scope.
    #[must_use]
    pub const fn new(organization_id: OrganizationId, branch_id: BranchId) -> Self {
        Self {
            organization_id,
            branch_id,
        }
    }

    /// True when a record carrying these ids belongs to this scope.
    #[must_use]
    pub fn owns(&self, organization_id: OrganizationId, branch_id: BranchId) -> bool {
        self.organization_id == organization_id && self.branch_id == branch_id
    }
}
