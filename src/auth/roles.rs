// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Project group prefixes for RBAC bindings.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Role a user holds inside a project.
///
/// ## Group Names
///
/// The actual group string stored on a binding is `<prefix>-<project_id>`,
/// e.g. `editors-3xkw9`. See [`GroupPrefix::group_name_for`].
///
/// - `Owners` - manage members and service accounts
/// - `Editors` - modify project resources
/// - `Viewers` - read-only access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GroupPrefix {
    Owners,
    Editors,
    Viewers,
}

impl GroupPrefix {
    /// Every prefix bindings may carry.
    pub const ALL: [GroupPrefix; 3] = [GroupPrefix::Owners, GroupPrefix::Editors, GroupPrefix::Viewers];

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupPrefix::Owners => "owners",
            GroupPrefix::Editors => "editors",
            GroupPrefix::Viewers => "viewers",
        }
    }

    /// Parse a prefix (exact, lowercase match).
    pub fn parse(s: &str) -> Option<GroupPrefix> {
        GroupPrefix::ALL.into_iter().find(|p| p.as_str() == s)
    }

    /// Project-scoped group name, `<prefix>-<project_id>`.
    pub fn group_name_for(&self, project_id: &str) -> String {
        format!("{}-{}", self.as_str(), project_id)
    }
}

impl std::fmt::Display for GroupPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strip the `-<project_id>` suffix from a group name.
pub fn extract_group_prefix(group: &str) -> &str {
    group.split('-').next().unwrap_or(group)
}
