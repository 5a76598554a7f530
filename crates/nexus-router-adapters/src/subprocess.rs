// crates/nexus-router-adapters/src/subprocess.rs
// ============================================================================
// Module: Subprocess Adapter
// Description: Adapter that dispatches a call to an external command.
// Purpose: Let a Router run real tools out-of-process, with a timeout,
//          redaction, and the full operational error taxonomy.
// Dependencies: nexus-router-core, tempfile, sha2, regex, tracing
// ============================================================================

//! ## Overview
//! One call is one child process: the adapter writes a canonical JSON
//! `{tool, method, args}` payload to a private temp file, invokes
//! `<base_cmd...> call <tool> <method> --json-args-file <path>`, and expects
//! exactly one JSON object on stdout with exit status zero. Wall-clock
//! timeout is enforced from a dedicated waiter thread so the calling thread
//! never blocks past `timeout_s`, the same blocking, thread-per-call style
//! used elsewhere in this workspace for other I/O providers. Every error
//! this adapter raises carries an `args_digest` so operators can correlate
//! failures with logged calls without the arguments themselves ever leaving
//! the process.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;
use std::process::Stdio;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::time::Duration;

use nexus_router_core::adapter::Adapter;
use nexus_router_core::canonical::canonical_json_bytes;
use nexus_router_core::canonical::sha256_hex;
use nexus_router_core::error::AdapterError;
use nexus_router_core::model::Capability;
use nexus_router_core::model::CapabilitySet;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use tempfile::NamedTempFile;

use crate::redact::Redactor;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for one [`SubprocessAdapter`] instance.
#[derive(Debug, Clone, Deserialize)]
pub struct SubprocessConfig {
    /// Executable and leading arguments. Must be non-empty.
    pub base_cmd: Vec<String>,
    /// Overrides the derived `adapter_id` when set.
    #[serde(default)]
    pub adapter_id: Option<String>,
    /// Wall-clock limit for one call, in seconds.
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
    /// Working directory for the child process. Must exist and be a
    /// directory if set.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Environment overrides merged onto the parent environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Truncation length for stdout stored in events. Parsing always uses
    /// the full stdout.
    #[serde(default = "default_max_stdout_chars")]
    pub max_stdout_chars: usize,
    /// Truncation length for stderr stored in events and error details.
    #[serde(default = "default_max_stderr_chars")]
    pub max_stderr_chars: usize,
    /// Delay before retrying temp-file cleanup once, in milliseconds.
    #[serde(default = "default_cleanup_retry_delay_ms")]
    pub cleanup_retry_delay_ms: u64,
    /// If set, non-blank stderr on an otherwise-successful call is an error.
    #[serde(default)]
    pub strict_stderr: bool,
}

const fn default_timeout_s() -> u64 {
    30
}

const fn default_max_stdout_chars() -> usize {
    4096
}

const fn default_max_stderr_chars() -> usize {
    4096
}

const fn default_cleanup_retry_delay_ms() -> u64 {
    50
}

impl SubprocessConfig {
    /// Builds a config with `base_cmd` and the documented defaults for
    /// every other field.
    #[must_use]
    pub fn new(base_cmd: Vec<String>) -> Self {
        Self {
            base_cmd,
            adapter_id: None,
            timeout_s: default_timeout_s(),
            cwd: None,
            env: BTreeMap::new(),
            max_stdout_chars: default_max_stdout_chars(),
            max_stderr_chars: default_max_stderr_chars(),
            cleanup_retry_delay_ms: default_cleanup_retry_delay_ms(),
            strict_stderr: false,
        }
    }
}

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// Dispatches each call to an external command as a child process.
pub struct SubprocessAdapter {
    adapter_id: String,
    config: SubprocessConfig,
    capabilities: CapabilitySet,
    redactor: Redactor,
    /// Set when two consecutive temp-file cleanup attempts both failed.
    /// Diagnostic only; never fails a call.
    last_cleanup_failed: AtomicBool,
}

impl SubprocessAdapter {
    /// Builds a subprocess adapter from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Bug`] when `config.base_cmd` is empty.
    pub fn new(config: SubprocessConfig) -> Result<Self, AdapterError> {
        if config.base_cmd.is_empty() {
            return Err(AdapterError::Bug {
                code: "SUBPROCESS_EMPTY_BASE_CMD".to_string(),
                message: "base_cmd must contain at least the executable".to_string(),
                details: Value::Null,
            });
        }
        let adapter_id = config.adapter_id.clone().unwrap_or_else(|| derive_adapter_id(&config.base_cmd));
        Ok(Self {
            adapter_id,
            config,
            capabilities: [Capability::Apply, Capability::Timeout, Capability::External].into_iter().collect(),
            redactor: Redactor::new(),
            last_cleanup_failed: AtomicBool::new(false),
        })
    }

    /// Whether the most recent call's temp-file cleanup ultimately failed
    /// after its retry. Diagnostic only.
    #[must_use]
    pub fn last_cleanup_failed(&self) -> bool {
        self.last_cleanup_failed.load(Ordering::Relaxed)
    }
}

/// Derives `"subprocess:<basename>:<6-hex>"` from the full command line.
fn derive_adapter_id(base_cmd: &[String]) -> String {
    let basename = Path::new(&base_cmd[0])
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| base_cmd[0].clone());
    let joined = base_cmd.join(" ");
    let digest = sha256_hex(joined.as_bytes());
    format!("subprocess:{basename}:{}", &digest[..6])
}

impl Adapter for SubprocessAdapter {
    fn adapter_id(&self) -> &str {
        &self.adapter_id
    }

    fn adapter_kind(&self) -> &str {
        "subprocess"
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    fn redact_args_for_event(&self, args: &Value) -> Value {
        self.redactor.redact_args(args)
    }

    #[allow(clippy::too_many_lines)]
    fn call(&self, tool: &str, method: &str, args: &Value) -> Result<Value, AdapterError> {
        let args_digest = compute_args_digest(args)?;

        validate_cwd(self.config.cwd.as_deref(), &args_digest)?;
        validate_env(&self.config.env, &args_digest)?;

        let payload = json!({ "tool": tool, "method": method, "args": args });
        let payload_bytes = canonical_json_bytes(&payload).map_err(|err| AdapterError::Bug {
            code: "SUBPROCESS_PAYLOAD_SERIALIZATION".to_string(),
            message: err.to_string(),
            details: json!({ "args_digest": args_digest }),
        })?;

        let temp_file = write_payload_file(&payload_bytes, &args_digest)?;
        let temp_path = temp_file.path().to_path_buf();

        let mut command = Command::new(&self.config.base_cmd[0]);
        command.args(&self.config.base_cmd[1..]);
        command.arg("call").arg(tool).arg(method).arg("--json-args-file").arg(&temp_path);
        if let Some(cwd) = &self.config.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &self.config.env {
            command.env(key, value);
        }
        command.stdout(Stdio::piped()).stderr(Stdio::piped()).stdin(Stdio::null());

        let spawned = command.spawn();
        let result = match spawned {
            Ok(child) => self.run_to_completion(child, &args_digest),
            Err(io_err) => Err(classify_spawn_error(&io_err, &args_digest)),
        };

        cleanup_temp_file(temp_file, self.config.cleanup_retry_delay_ms, &self.last_cleanup_failed);

        result
    }
}

impl SubprocessAdapter {
    /// Runs `child` to completion under the configured timeout, via a
    /// dedicated waiter thread so the calling thread never blocks past
    /// `timeout_s` regardless of how long the child takes to exit.
    fn run_to_completion(&self, child: std::process::Child, args_digest: &str) -> Result<Value, AdapterError> {
        let pid = child.id();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let outcome = child.wait_with_output();
            let _ignored = tx.send(outcome);
        });

        let deadline = Duration::from_secs(self.config.timeout_s);
        match rx.recv_timeout(deadline) {
            Ok(Ok(output)) => self.interpret_output(&output, args_digest),
            Ok(Err(io_err)) => Err(AdapterError::Operational {
                code: "OS_ERROR".to_string(),
                message: io_err.to_string(),
                details: json!({ "args_digest": args_digest }),
            }),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                terminate_process(pid);
                tracing::warn!(pid, args_digest, "subprocess adapter call timed out");
                Err(AdapterError::Operational {
                    code: "TIMEOUT".to_string(),
                    message: format!("call exceeded {}s timeout", self.config.timeout_s),
                    details: json!({ "args_digest": args_digest, "timeout_s": self.config.timeout_s }),
                })
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(AdapterError::Bug {
                code: "SUBPROCESS_WAITER_DISCONNECTED".to_string(),
                message: "waiter thread dropped its result channel without sending".to_string(),
                details: json!({ "args_digest": args_digest }),
            }),
        }
    }

    /// Interprets a completed child process's output into a result.
    fn interpret_output(&self, output: &Output, args_digest: &str) -> Result<Value, AdapterError> {
        let stderr_text = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let excerpt = truncate_chars(&self.redactor.redact_text(&stderr_text), self.config.max_stderr_chars);
            return Err(AdapterError::Operational {
                code: "NONZERO_EXIT".to_string(),
                message: "child process exited with a non-zero status".to_string(),
                details: json!({
                    "args_digest": args_digest,
                    "returncode": output.status.code(),
                    "stderr_excerpt": excerpt,
                }),
            });
        }

        let stdout_text = String::from_utf8_lossy(&output.stdout);
        let parsed: Result<Value, serde_json::Error> = serde_json::from_slice(&output.stdout);
        let parsed = match parsed {
            Ok(value) => value,
            Err(json_err) => {
                let redacted = self.redactor.redact_text(&stdout_text);
                let head = truncate_chars(&redacted, self.config.max_stdout_chars / 2);
                let tail = truncate_chars_from_end(&redacted, self.config.max_stdout_chars / 2);
                return Err(AdapterError::Operational {
                    code: "INVALID_JSON_OUTPUT".to_string(),
                    message: "child process stdout was not a single JSON object".to_string(),
                    details: json!({
                        "args_digest": args_digest,
                        "stdout_len": output.stdout.len(),
                        "json_error": json_err.to_string(),
                        "stdout_head": head,
                        "stdout_tail": tail,
                    }),
                });
            }
        };

        if self.config.strict_stderr && !stderr_text.trim().is_empty() {
            let excerpt = truncate_chars(&self.redactor.redact_text(&stderr_text), self.config.max_stderr_chars);
            return Err(AdapterError::Operational {
                code: "STDERR_ON_SUCCESS".to_string(),
                message: "child process wrote to stderr despite a successful exit".to_string(),
                details: json!({ "args_digest": args_digest, "stderr_excerpt": excerpt }),
            });
        }

        Ok(parsed)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn compute_args_digest(args: &Value) -> Result<String, AdapterError> {
    let bytes = canonical_json_bytes(args).map_err(|err| AdapterError::Bug {
        code: "SUBPROCESS_ARGS_SERIALIZATION".to_string(),
        message: err.to_string(),
        details: Value::Null,
    })?;
    let full = sha256_hex(&bytes);
    Ok(full[..12].to_string())
}

fn validate_cwd(cwd: Option<&Path>, args_digest: &str) -> Result<(), AdapterError> {
    let Some(cwd) = cwd else {
        return Ok(());
    };
    if !cwd.exists() {
        return Err(AdapterError::Operational {
            code: "CWD_NOT_FOUND".to_string(),
            message: format!("configured cwd does not exist: {}", cwd.display()),
            details: json!({ "args_digest": args_digest }),
        });
    }
    if !cwd.is_dir() {
        return Err(AdapterError::Operational {
            code: "CWD_NOT_DIRECTORY".to_string(),
            message: format!("configured cwd is not a directory: {}", cwd.display()),
            details: json!({ "args_digest": args_digest }),
        });
    }
    Ok(())
}

fn validate_env(env: &BTreeMap<String, String>, args_digest: &str) -> Result<(), AdapterError> {
    for (key, value) in env {
        if key.contains('\0') || value.contains('\0') {
            return Err(AdapterError::Operational {
                code: "ENV_INVALID".to_string(),
                message: format!("environment variable {key} contains a NUL byte"),
                details: json!({ "args_digest": args_digest }),
            });
        }
    }
    Ok(())
}

fn write_payload_file(payload_bytes: &[u8], args_digest: &str) -> Result<NamedTempFile, AdapterError> {
    let mut temp_file = NamedTempFile::with_prefix("nexus-router-call-").map_err(|err| AdapterError::Operational {
        code: "OS_ERROR".to_string(),
        message: format!("failed to create temp file: {err}"),
        details: json!({ "args_digest": args_digest }),
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        if let Err(err) = std::fs::set_permissions(temp_file.path(), permissions) {
            return Err(AdapterError::Operational {
                code: "OS_ERROR".to_string(),
                message: format!("failed to set temp file permissions: {err}"),
                details: json!({ "args_digest": args_digest }),
            });
        }
    }

    temp_file.write_all(payload_bytes).map_err(|err| AdapterError::Operational {
        code: "OS_ERROR".to_string(),
        message: format!("failed to write temp file: {err}"),
        details: json!({ "args_digest": args_digest }),
    })?;
    temp_file.flush().map_err(|err| AdapterError::Operational {
        code: "OS_ERROR".to_string(),
        message: format!("failed to flush temp file: {err}"),
        details: json!({ "args_digest": args_digest }),
    })?;
    Ok(temp_file)
}

fn classify_spawn_error(io_err: &std::io::Error, args_digest: &str) -> AdapterError {
    let code = match io_err.kind() {
        std::io::ErrorKind::NotFound => "COMMAND_NOT_FOUND",
        std::io::ErrorKind::PermissionDenied => "PERMISSION_DENIED",
        _ => "OS_ERROR",
    };
    AdapterError::Operational {
        code: code.to_string(),
        message: io_err.to_string(),
        details: json!({ "args_digest": args_digest }),
    }
}

/// Sends a best-effort termination signal to `pid`. POSIX uses `kill`;
/// other platforms use `taskkill`. Either is shelled out to rather than
/// linking a signal-handling crate, since this is the single call site that
/// needs it.
fn terminate_process(pid: u32) {
    #[cfg(unix)]
    {
        let _ignored = Command::new("kill").arg("-TERM").arg(pid.to_string()).status();
    }
    #[cfg(windows)]
    {
        let _ignored = Command::new("taskkill").arg("/PID").arg(pid.to_string()).arg("/F").status();
    }
}

fn cleanup_temp_file(temp_file: NamedTempFile, retry_delay_ms: u64, last_cleanup_failed: &AtomicBool) {
    let temp_path = temp_file.into_temp_path();
    let path_buf = temp_path.to_path_buf();
    if temp_path.close().is_ok() {
        last_cleanup_failed.store(false, Ordering::Relaxed);
        return;
    }
    std::thread::sleep(Duration::from_millis(retry_delay_ms));
    let failed = std::fs::remove_file(&path_buf).is_err();
    last_cleanup_failed.store(failed, Ordering::Relaxed);
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn truncate_chars_from_end(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    text.chars().skip(total - max_chars).collect()
}
