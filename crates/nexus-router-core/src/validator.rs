// crates/nexus-router-core/src/validator.rs
// ============================================================================
// Module: Plugin validator / introspector
// Description: Read-only lint over adapter factories and their optional
//              declarative manifests.
// Purpose: Let a host vet a third-party adapter before registering it,
//          without ever invoking `call`.
// Dependencies: crate::{adapter, error, model}, serde
// ============================================================================

//! ## Overview
//! Rust has no dynamic `module:function` import, so `factory_ref` resolution
//! is realized as a caller-supplied closure already constructed in-process:
//! [`load_adapter`] takes a `factory: impl FnOnce() -> Result<Box<dyn
//! Adapter>, AdapterLoadError>` instead of a load-by-string-reference
//! mechanism. The validator's check list and [`ValidationResult`] /
//! [`ValidationCheck`] shapes are otherwise unchanged; the decision is
//! recorded in `DESIGN.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::adapter::Adapter;
use crate::error::AdapterError;
use crate::model::Capability;

// ============================================================================
// SECTION: Manifest
// ============================================================================

/// The only manifest schema version this validator accepts. A manifest
/// declaring any other value fails `MANIFEST_SCHEMA_VERSION` rather than
/// being parsed best-effort.
pub const EXPECTED_SCHEMA_VERSION: &str = "1";

/// An optional declarative manifest an adapter author ships alongside its
/// factory, checked by the `MANIFEST_*` validations when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterManifest {
    /// Manifest schema version, e.g. `"1"`.
    pub schema_version: String,
    /// Declared transport kind, expected to match `adapter.adapter_kind()`.
    pub kind: String,
    /// Declared capabilities, expected to match `adapter.capabilities()`.
    pub capabilities: Vec<String>,
    /// Router protocol versions this adapter claims to support.
    #[serde(default)]
    pub supported_router_versions: Option<Vec<String>>,
    /// Error codes this adapter claims it may raise.
    #[serde(default)]
    pub error_codes: Option<Vec<String>>,
    /// JSON Schema for this adapter's `call` config, if any.
    #[serde(default)]
    pub config_schema: Option<serde_json::Value>,
}

// ============================================================================
// SECTION: Checks
// ============================================================================

/// A single named check's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// The check passed.
    Pass,
    /// The check failed.
    Fail,
    /// The check could not be evaluated (e.g. no manifest present) and is
    /// not fatal.
    Warn,
}

/// One entry in a [`ValidationResult`]'s check list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationCheck {
    /// The check's stable name, e.g. `"LOAD_OK"`.
    pub name: String,
    /// The check's outcome.
    pub status: CheckStatus,
    /// Human-readable detail, e.g. what failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ValidationCheck {
    fn pass(name: &str) -> Self {
        Self { name: name.to_string(), status: CheckStatus::Pass, detail: None }
    }
    fn fail(name: &str, detail: impl Into<String>) -> Self {
        Self { name: name.to_string(), status: CheckStatus::Fail, detail: Some(detail.into()) }
    }
    fn warn(name: &str, detail: impl Into<String>) -> Self {
        Self { name: name.to_string(), status: CheckStatus::Warn, detail: Some(detail.into()) }
    }
}

/// A loaded adapter's identity, echoed back by a successful validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterMetadata {
    /// The adapter's stable identifier.
    pub adapter_id: String,
    /// The adapter's transport family.
    pub adapter_kind: String,
    /// The adapter's declared capabilities, as wire strings.
    pub capabilities: Vec<String>,
}

/// The full result of validating one adapter factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// `true` iff every check passed or warned (no `Fail`).
    pub ok: bool,
    /// The loaded adapter's metadata, present iff `LOAD_OK` passed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AdapterMetadata>,
    /// Every check run, in the order listed below.
    pub checks: Vec<ValidationCheck>,
}

/// Error raised when the supplied factory itself fails to produce an
/// adapter. Distinct from [`AdapterError`], which is raised from `call`.
#[derive(Debug, thiserror::Error)]
#[error("adapter load failed: {0}")]
pub struct AdapterLoadError(pub String);

// ============================================================================
// SECTION: Validation
// ============================================================================

const KNOWN_CAPABILITIES: [&str; 4] = ["dry_run", "apply", "timeout", "external"];

/// Loads `factory` and runs the fixed check list against the resulting
/// adapter and optional `manifest`, without ever invoking `call`.
///
/// `strict` makes an unrecognized capability a `Fail` rather than a `Warn`.
#[must_use]
pub fn validate_adapter(
    factory: impl FnOnce() -> Result<Box<dyn Adapter>, AdapterLoadError>,
    manifest: Option<&AdapterManifest>,
    strict: bool,
) -> ValidationResult {
    let mut checks = Vec::new();
    let adapter = match factory() {
        Ok(adapter) => {
            checks.push(ValidationCheck::pass("LOAD_OK"));
            adapter
        }
        Err(err) => {
            checks.push(ValidationCheck::fail("LOAD_OK", err.0));
            return ValidationResult { ok: false, metadata: None, checks };
        }
    };

    check_protocol_fields(adapter.as_ref(), &mut checks);
    check_adapter_id_format(adapter.as_ref(), &mut checks);
    check_adapter_kind_format(adapter.as_ref(), &mut checks);
    let capability_strings = check_capabilities(adapter.as_ref(), strict, &mut checks);

    if let Some(manifest) = manifest {
        check_manifest(adapter.as_ref(), manifest, &mut checks);
    }

    let ok = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let metadata = Some(AdapterMetadata {
        adapter_id: adapter.adapter_id().to_string(),
        adapter_kind: adapter.adapter_kind().to_string(),
        capabilities: capability_strings,
    });
    ValidationResult { ok, metadata, checks }
}

fn check_protocol_fields(adapter: &dyn Adapter, checks: &mut Vec<ValidationCheck>) {
    if adapter.adapter_id().is_empty() || adapter.adapter_kind().is_empty() {
        checks.push(ValidationCheck::fail(
            "PROTOCOL_FIELDS",
            "adapter_id and adapter_kind must both be non-empty",
        ));
    } else {
        checks.push(ValidationCheck::pass("PROTOCOL_FIELDS"));
    }
}

fn check_adapter_id_format(adapter: &dyn Adapter, checks: &mut Vec<ValidationCheck>) {
    let valid = is_snake_case_identifier(adapter.adapter_id());
    if valid {
        checks.push(ValidationCheck::pass("ADAPTER_ID_FORMAT"));
    } else {
        checks.push(ValidationCheck::fail(
            "ADAPTER_ID_FORMAT",
            format!("adapter_id {:?} is not a lowercase snake_case identifier", adapter.adapter_id()),
        ));
    }
}

fn check_adapter_kind_format(adapter: &dyn Adapter, checks: &mut Vec<ValidationCheck>) {
    let valid = is_snake_case_identifier(adapter.adapter_kind());
    if valid {
        checks.push(ValidationCheck::pass("ADAPTER_KIND_FORMAT"));
    } else {
        checks.push(ValidationCheck::fail(
            "ADAPTER_KIND_FORMAT",
            format!("adapter_kind {:?} is not a lowercase snake_case identifier", adapter.adapter_kind()),
        ));
    }
}

fn check_capabilities(
    adapter: &dyn Adapter,
    strict: bool,
    checks: &mut Vec<ValidationCheck>,
) -> Vec<String> {
    checks.push(ValidationCheck::pass("CAPABILITIES_TYPE"));
    let capability_strings: Vec<String> =
        adapter.capabilities().iter().map(|cap| cap.as_str().to_string()).collect();
    let all_known = capability_strings.iter().all(|cap| KNOWN_CAPABILITIES.contains(&cap.as_str()));
    if all_known {
        checks.push(ValidationCheck::pass("CAPABILITIES_VALID"));
    } else if strict {
        checks.push(ValidationCheck::fail("CAPABILITIES_VALID", "unrecognized capability in strict mode"));
    } else {
        checks.push(ValidationCheck::warn("CAPABILITIES_VALID", "unrecognized capability"));
    }
    capability_strings
}

fn check_manifest(adapter: &dyn Adapter, manifest: &AdapterManifest, checks: &mut Vec<ValidationCheck>) {
    if manifest.schema_version == EXPECTED_SCHEMA_VERSION {
        checks.push(ValidationCheck::pass("MANIFEST_SCHEMA_VERSION"));
    } else {
        checks.push(ValidationCheck::fail(
            "MANIFEST_SCHEMA_VERSION",
            format!(
                "manifest schema_version {:?} is not the supported version {EXPECTED_SCHEMA_VERSION:?}",
                manifest.schema_version
            ),
        ));
    }

    if manifest.kind == adapter.adapter_kind() {
        checks.push(ValidationCheck::pass("MANIFEST_KIND_MATCH"));
    } else {
        checks.push(ValidationCheck::fail(
            "MANIFEST_KIND_MATCH",
            format!(
                "manifest kind {:?} does not match adapter_kind {:?}",
                manifest.kind,
                adapter.adapter_kind()
            ),
        ));
    }

    let declared: Vec<Capability> = manifest.capabilities.iter().filter_map(|cap| Capability::parse(cap)).collect();
    let actual = adapter.capabilities();
    if declared.len() == actual.len() && declared.iter().all(|cap| actual.contains(cap)) {
        checks.push(ValidationCheck::pass("MANIFEST_CAPABILITIES_MATCH"));
    } else {
        checks.push(ValidationCheck::fail(
            "MANIFEST_CAPABILITIES_MATCH",
            "manifest capabilities do not match the adapter's declared set",
        ));
    }

    match &manifest.config_schema {
        Some(serde_json::Value::Object(_)) | None => {
            checks.push(ValidationCheck::pass("MANIFEST_CONFIG_SCHEMA"));
        }
        Some(_) => {
            checks.push(ValidationCheck::fail("MANIFEST_CONFIG_SCHEMA", "config_schema must be a JSON object"));
        }
    }
}

fn is_snake_case_identifier(value: &str) -> bool {
    !value.is_empty()
        && value.chars().all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_')
        && value.chars().next().is_some_and(|ch| ch.is_ascii_lowercase())
}
