//! # Access Rules
//!
//! Who may do what.
//!
//! ```text
//! ┌──────────────────────┬───────┬─────────┬────────────────┬───────────────┐
//! │ Capability           │ Admin │ Manager │ Viewer (write) │ Viewer (read) │
//! ├──────────────────────┼───────┼─────────┼────────────────┼───────────────┤
//! │ Manage users         │  yes  │   no    │      no        │      no       │
//! │ Catalog CRUD, import │  yes  │   yes   │      no        │      no       │
//! │ Bookings, customers  │  yes  │   yes   │      yes       │      no       │
//! │ Product columns      │  all  │   all   │   assigned     │   assigned    │
//! │ Activity feed        │  yes  │   yes   │      no        │      no       │
//! └──────────────────────┴───────┴─────────┴────────────────┴───────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::columns::ProductColumn;
use crate::error::{CoreError, CoreResult};
use crate::types::{AccessLevel, Role, UserProfile};

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub access_level: AccessLevel,
    pub assigned_columns: Vec<ProductColumn>,
}

impl From<&UserProfile> for Principal {
    fn from(user: &UserProfile) -> Self {
        Principal {
            user_id: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            access_level: user.access_level,
            assigned_columns: user.assigned_columns.clone(),
        }
    }
}

impl Principal {
    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Manager)
    }

    pub fn can_manage_users(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn can_manage_catalog(&self) -> bool {
        self.is_staff()
    }

    pub fn can_write_bookings(&self) -> bool {
        self.is_staff() || self.access_level == AccessLevel::Write
    }

    pub fn can_view_activity(&self) -> bool {
        self.is_staff()
    }

    /// Product columns this caller may read.
    ///
    /// Viewers never see internal notes even if assigned. A viewer with no
    /// assignment gets `ProductColumn::VIEWER_DEFAULT`.
    pub fn visible_columns(&self) -> Vec<ProductColumn> {
        if self.is_staff() {
            return ProductColumn::ALL.to_vec();
        }

        let assigned: Vec<ProductColumn> = self
            .assigned_columns
            .iter()
            .copied()
            .filter(|c| !c.is_internal())
            .collect();

        if assigned.is_empty() {
            ProductColumn::VIEWER_DEFAULT.to_vec()
        } else {
            assigned
        }
    }

    /// Turns a capability check into a `Forbidden` error.
    pub fn require(&self, allowed: bool, action: &str) -> CoreResult<()> {
        if allowed {
            Ok(())
        } else {
            Err(CoreError::forbidden(action))
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
