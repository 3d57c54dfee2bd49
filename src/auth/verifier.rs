// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token verification capability and the ordered plugin aggregate.

use async_trait::async_trait;
use tracing::debug;

use super::{AuthError, Claims};

/// Validates a raw token and produces its claims.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn verify(&self, token: &str) -> Result<Claims, AuthError>;
}

/// Ordered, immutable list of verifiers. The first success wins.
///
/// The aggregate failure does not enumerate what each plugin reported; the
/// individual causes only reach the debug log.
pub struct PluginAggregateVerifier {
    plugins: Vec<Box<dyn TokenVerifier>>,
}

impl PluginAggregateVerifier {
    pub fn new(plugins: Vec<Box<dyn TokenVerifier>>) -> Self {
        Self { plugins }
    }
}

#[async_trait]
impl TokenVerifier for PluginAggregateVerifier {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        if self.plugins.is_empty() {
            return Err(AuthError::NoPluginsRegistered);
        }
        for plugin in &self.plugins {
            match plugin.verify(token).await {
                Ok(claims) => return Ok(claims),
                Err(e) => debug!(verifier = plugin.name(), error = %e, "verifier rejected token"),
            }
        }
        Err(AuthError::UnableToVerify)
    }
}
