//! Structured observability hooks for module lifecycle operations.
//!
//! This module provides:
//! - Reconcile-scoped tracing spans via the `ReconcileSpan` RAII guard
//! - Emission functions for reconcile start/finish, config fallbacks,
//!   consistency evaluations and decrypt failures
//!
//! Events are emitted at `info!` level unless noted. Set `RUST_LOG` to
//! filter them and pass `--json` to the CLI for JSON output.

use tracing::{info, warn};

/// RAII guard that enters a span tagged with the module and policy being
/// reconciled.
///
/// # Example
///
/// ```ignore
/// let _span = ReconcileSpan::enter("syslog", 12);
/// // every tracing call now carries module = "syslog", policy_id = 12
/// ```
pub struct ReconcileSpan {
    _span: tracing::span::EnteredSpan,
}

impl ReconcileSpan {
    pub fn enter(module: &str, policy_id: u64) -> Self {
        let span = tracing::info_span!("modplane.reconcile", module = %module, policy_id = policy_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: reconciliation of a module instance started.
pub fn emit_reconcile_started(module: &str, from_version: &str, to_version: &str) {
    info!(
        event = "reconcile.started",
        module = %module,
        from_version = %from_version,
        to_version = %to_version,
    );
}

/// Emit event: reconciliation finished, with the config kinds that fell back.
pub fn emit_reconcile_finished(module: &str, fallbacks: &[&str], dynamic_dependencies: usize) {
    info!(
        event = "reconcile.finished",
        module = %module,
        fallbacks = ?fallbacks,
        dynamic_dependencies = dynamic_dependencies,
    );
}

/// Emit event: a config kind was replaced by its default (warning level).
pub fn emit_config_fallback(module: &str, kind: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "reconcile.fallback", module = %module, kind = %kind, reason = %reason);
}

/// Emit event: consistency evaluated for a scope.
pub fn emit_consistency_evaluated(scope: &str, modules: usize, dependencies: usize, consistent: bool) {
    info!(
        event = "consistency.evaluated",
        scope = %scope,
        modules = modules,
        dependencies = dependencies,
        consistent = consistent,
    );
}

/// Emit event: a secure parameter could not be decrypted (warning level).
pub fn emit_decrypt_failed(param: &str, reason: &str) {
    warn!(event = "secure.decrypt_failed", param = %param, reason = %reason);
}
