// Structured audit trail for gate outcomes and re-seal events
// Events are emitted through tracing under the `audit` target

use crate::enforcer::EnforcementReport;
use crate::errors::SealError;
use crate::seal::SealDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Severity levels for structured log classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Critical,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Which pipeline produced the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditAction {
    Enforce,
    CheckRegistry,
    UpdateSeal,
    ShowRegistry,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Enforce => "enforce",
            AuditAction::CheckRegistry => "check-registry",
            AuditAction::UpdateSeal => "update-seal",
            AuditAction::ShowRegistry => "show-registry",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Pass,
    Violation,
    Failure,
    Resealed,
}

/// Core audit event record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub who: String,
    pub action: AuditAction,
    pub outcome: AuditOutcome,
    pub severity: LogLevel,
    pub context: Option<String>,
    pub category: Option<String>,
    pub registry_hash: Option<String>,
    pub master_hash: Option<String>,
}

impl AuditEvent {
    pub fn new(action: AuditAction, outcome: AuditOutcome) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            who: current_actor(),
            action,
            outcome,
            severity: LogLevel::Info,
            context: None,
            category: None,
            registry_hash: None,
            master_hash: None,
        }
    }

    /// A passing `enforce` or `check-registry` run.
    pub fn gate_passed(action: AuditAction, report: &EnforcementReport) -> Self {
        Self::new(action, AuditOutcome::Pass)
            .with_registry_hash(&report.registry_hash)
            .with_context(format!(
                "version {} with {} modules",
                report.version, report.module_count
            ))
    }

    /// A run that ended in an integrity violation or a setup failure.
    pub fn gate_failed(action: AuditAction, err: &SealError) -> Self {
        let (outcome, severity) = match err.exit_status() {
            crate::errors::ExitStatus::IntegrityViolation => {
                (AuditOutcome::Violation, LogLevel::Critical)
            }
            _ => (AuditOutcome::Failure, LogLevel::Error),
        };
        let mut event = Self::new(action, outcome)
            .with_severity(severity)
            .with_context(err.to_string());
        event.category = Some(err.category().to_string());
        event
    }

    /// A new baseline was written.
    pub fn resealed(doc: &SealDocument) -> Self {
        let mut event = Self::new(AuditAction::UpdateSeal, AuditOutcome::Resealed)
            .with_severity(LogLevel::Warn)
            .with_context(format!("{} {} sealed at {}", doc.repo, doc.phase, doc.timestamp));
        event.master_hash = Some(doc.master_hash.clone());
        if let Some(hash) = &doc.runtime.registry_hash {
            event.registry_hash = Some(hash.clone());
        }
        event
    }

    pub fn with_severity(mut self, level: LogLevel) -> Self {
        self.severity = level;
        self
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }

    pub fn with_registry_hash(mut self, hash: &str) -> Self {
        self.registry_hash = Some(hash.to_string());
        self
    }

    /// Hand the event to the tracing subscriber at its severity.
    pub fn emit(&self) {
        let action = self.action.as_str();
        let context = self.context.as_deref().unwrap_or("");
        let registry_hash = self.registry_hash.as_deref().unwrap_or("");
        let master_hash = self.master_hash.as_deref().unwrap_or("");
        let category = self.category.as_deref().unwrap_or("");
        match self.severity {
            LogLevel::Info => tracing::info!(
                target: "audit", id = %self.id, who = %self.who, action, outcome = ?self.outcome,
                category, registry_hash, master_hash, "{context}"
            ),
            LogLevel::Warn => tracing::warn!(
                target: "audit", id = %self.id, who = %self.who, action, outcome = ?self.outcome,
                category, registry_hash, master_hash, "{context}"
            ),
            LogLevel::Error | LogLevel::Critical => tracing::error!(
                target: "audit", id = %self.id, who = %self.who, action, outcome = ?self.outcome,
                severity = %self.severity, category, registry_hash, master_hash, "{context}"
            ),
        }
    }
}

fn current_actor() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
