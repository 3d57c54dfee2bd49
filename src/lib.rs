// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Project Identity Server - identity and multi-tenant authorization
//!
//! This crate authenticates API callers (OIDC ID tokens and locally issued
//! service account tokens), manages project-scoped role bindings and
//! resolves credential presets for the authenticated user.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token extraction, verification and the authentication middleware
//! - `projects` - Project creation, listing and deletion
//! - `membership` - Project membership management
//! - `service_accounts` - Service accounts and their tokens
//! - `presets` - Credential presets and cloud specs
//! - `storage` - Store traits and the in-memory backend

pub mod access;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod membership;
pub mod models;
pub mod presets;
pub mod projects;
pub mod service_accounts;
pub mod state;
pub mod storage;
