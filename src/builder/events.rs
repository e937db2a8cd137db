//! Build event types for JSON output.
//!
//! This module defines the JSON schema for machine-readable build output.
//! These events are emitted when using `--message-format=json`.
//!
//! # Event Types
//!
//! - `build-started`: The run began
//! - `stage-finished`: One stage of one package completed
//! - `package-finished`: A package reached a terminal state
//! - `diagnostic`: A warning or error message
//! - `build-finished`: The run completed (success or failure)
//!
//! # Stability
//!
//! New fields may be added, but existing fields should not be removed or renamed.

use std::path::PathBuf;

use serde::Serialize;

use crate::core::artifact::{BuildOutcome, Stage};
use crate::util::diagnostic::Diagnostic;

/// A build event emitted during the build process.
///
/// Each event is serialized as a single JSON object per line.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason")]
pub enum BuildEvent {
    /// The run began.
    #[serde(rename = "build-started")]
    BuildStarted {
        /// Operating system of the resolved platform profile
        platform: String,
        /// Number of packages to build
        package_count: u64,
    },

    /// A stage of one package completed.
    #[serde(rename = "stage-finished")]
    StageFinished {
        package: String,
        stage: Stage,
        /// Files the stage produced or rewrote
        #[serde(skip_serializing_if = "Vec::is_empty")]
        filenames: Vec<PathBuf>,
        /// Duration of the external command in milliseconds
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },

    /// A package reached a terminal state.
    #[serde(rename = "package-finished")]
    PackageFinished {
        #[serde(flatten)]
        outcome: BuildOutcome,
    },

    /// A generic diagnostic message.
    #[serde(rename = "diagnostic")]
    Diagnostic {
        /// Severity level ("error", "warning", "note")
        level: String,
        /// Message text
        message: String,
        /// Captured tool output and other context lines
        #[serde(skip_serializing_if = "Vec::is_empty")]
        context: Vec<String>,
    },

    /// Build completed (success or failure).
    #[serde(rename = "build-finished")]
    BuildFinished {
        /// Whether every package built and packaged
        success: bool,
        /// Total build duration in milliseconds
        duration_ms: u64,
        /// Path of the written bundle manifest
        #[serde(skip_serializing_if = "Option::is_none")]
        bundle_manifest: Option<PathBuf>,
    },
}

impl BuildEvent {
    /// Create a build started event.
    pub fn started(platform: impl Into<String>, package_count: u64) -> Self {
        BuildEvent::BuildStarted {
            platform: platform.into(),
            package_count,
        }
    }

    /// Create a stage finished event.
    pub fn stage(
        package: impl Into<String>,
        stage: Stage,
        filenames: Vec<PathBuf>,
        duration_ms: Option<u64>,
    ) -> Self {
        BuildEvent::StageFinished {
            package: package.into(),
            stage,
            filenames,
            duration_ms,
        }
    }

    /// Create a package finished event.
    pub fn package(outcome: BuildOutcome) -> Self {
        BuildEvent::PackageFinished { outcome }
    }

    /// Create a diagnostic event, keeping its context lines.
    pub fn from_diagnostic(diagnostic: &Diagnostic) -> Self {
        BuildEvent::Diagnostic {
            level: diagnostic.severity.to_string(),
            message: diagnostic.message.clone(),
            context: diagnostic.context.clone(),
        }
    }

    /// Create a build finished event.
    pub fn finished(success: bool, duration_ms: u64) -> Self {
        BuildEvent::BuildFinished {
            success,
            duration_ms,
            bundle_manifest: None,
        }
    }

    /// Attach the written bundle manifest to a build finished event.
    pub fn with_bundle_manifest(mut self, path: Option<PathBuf>) -> Self {
        if let BuildEvent::BuildFinished {
            bundle_manifest, ..
        } = &mut self
        {
            *bundle_manifest = path;
        }
        self
    }

    /// Serialize this event to a JSON value.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_serialization() {
        let event = BuildEvent::stage(
            "ta",
            Stage::BuildLibrary,
            vec![PathBuf::from("banbta/ta/libta_go.so")],
            Some(1200),
        );
        let json = event.to_value().to_string();
        assert!(json.contains("\"reason\":\"stage-finished\""));
        assert!(json.contains("\"stage\":\"build-library\""));
        assert!(json.contains("libta_go.so"));
        assert!(json.contains("\"duration_ms\":1200"));
    }

    #[test]
    fn test_package_outcome_is_flattened() {
        let event = BuildEvent::package(BuildOutcome::failed("tav", Stage::Link, "exit 1"));
        let json = event.to_value().to_string();
        assert!(json.contains("\"reason\":\"package-finished\""));
        assert!(json.contains("\"package-name\":\"tav\""));
        assert!(json.contains("\"status\":\"failed\""));
        assert!(json.contains("\"failed-stage\":\"link\""));
    }

    #[test]
    fn test_finished_serialization() {
        let event = BuildEvent::finished(true, 2340);
        let json = event.to_value().to_string();
        assert!(json.contains("\"reason\":\"build-finished\""));
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"duration_ms\":2340"));
        assert!(!json.contains("bundle_manifest"));
    }

    #[test]
    fn test_diagnostic_keeps_tool_output() {
        let diagnostic = Diagnostic::error("go build failed for `ta`")
            .with_context("stderr:\nta.go:3:1: undefined: Foo");
        let value = BuildEvent::from_diagnostic(&diagnostic).to_value();
        assert_eq!(value["reason"], "diagnostic");
        assert_eq!(value["level"], "error");
        assert!(value["context"][0]
            .as_str()
            .unwrap()
            .contains("undefined: Foo"));
    }
}
