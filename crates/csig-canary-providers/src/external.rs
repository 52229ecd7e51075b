// crates/csig-canary-providers/src/external.rs
// ============================================================================
// Module: External Process Collaborators
// Description: Verification primitive and addon installer as child processes.
// Purpose: Reach the host-provided black boxes without linking against them.
// Dependencies: csig-canary-core, serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! Each call spawns the configured command, writes one JSON request to its
//! stdin, closes stdin, and reads one JSON reply from stdout.
//!
//! Verifier request: `{input, signature, certificate_chain, signer,
//! trust_root}` where `input` is the signed bytes as a UTF-8 string. Reply:
//! `{"verified": bool, "status": code?, "error": {"key", "code"}?}` or
//! `{"exception": string}` when the verifier raised. Reported codes are fed
//! into the caller's telemetry recorder.
//!
//! Installer request: `{url, dev_root}`. Reply: `{"signed_state": int}` or
//! `{"install_error": int}`.
//!
//! A failing child's stderr is appended to the error so the collaborator's own
//! diagnostics reach the report.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::process::Stdio;

use async_trait::async_trait;
use csig_canary_core::AddonInstaller;
use csig_canary_core::ContentSignaturePrimitive;
use csig_canary_core::InstallError;
use csig_canary_core::PrimitiveError;
use csig_canary_core::PrimitiveRequest;
use csig_canary_core::SignedState;
use csig_canary_core::TelemetryRecorder;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum characters of child stderr carried into an error message.
const MAX_STDERR_CHARS: usize = 512;

// ============================================================================
// SECTION: Command
// ============================================================================

/// Program and arguments of an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    /// Executable to spawn.
    pub program: String,
    /// Arguments passed before any request data.
    pub args: Vec<String>,
}

impl ExternalCommand {
    /// Creates a command.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Spawns the command, exchanges one JSON request for one JSON reply.
    async fn exchange<Req, Resp>(&self, request: &Req) -> Result<Resp, String>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let payload =
            serde_json::to_vec(request).map_err(|err| format!("encode request failed: {err}"))?;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| format!("spawn {} failed: {err}", self.program))?;
        let mut stdin = child.stdin.take().ok_or_else(|| "missing child stdin".to_string())?;
        stdin.write_all(&payload).await.map_err(|err| format!("write stdin failed: {err}"))?;
        stdin.shutdown().await.map_err(|err| format!("close stdin failed: {err}"))?;
        drop(stdin);
        let output =
            child.wait_with_output().await.map_err(|err| format!("wait failed: {err}"))?;
        if !output.status.success() {
            return Err(with_stderr(
                format!("{} exited with {}", self.program, output.status),
                &output.stderr,
            ));
        }
        serde_json::from_slice(&output.stdout)
            .map_err(|err| with_stderr(format!("decode reply failed: {err}"), &output.stderr))
    }
}

/// Appends the child's trimmed stderr, capped at [`MAX_STDERR_CHARS`], to `message`.
fn with_stderr(message: String, stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.is_empty() {
        return message;
    }
    let excerpt: String = text.chars().take(MAX_STDERR_CHARS).collect();
    format!("{message}: {excerpt}")
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Verifier request body.
#[derive(Serialize)]
struct VerifyRequest<'a> {
    /// Signed bytes as text.
    input: &'a str,
    /// Tagged signature.
    signature: &'a str,
    /// PEM chain.
    certificate_chain: &'a str,
    /// Expected signer identity.
    signer: &'a str,
    /// Pinned trust root.
    trust_root: &'a str,
}

/// Error histogram entry reported by the verifier.
#[derive(Deserialize)]
struct ReportedError {
    /// Identity the error is keyed by.
    key: String,
    /// Error code.
    code: u32,
}

/// Verifier reply body.
#[derive(Deserialize)]
#[serde(untagged)]
enum VerifyReply {
    /// The verifier raised.
    Raised {
        /// Exception name or message.
        exception: String,
    },
    /// The verifier returned a verdict.
    Verdict {
        /// Whether the signature validated.
        verified: bool,
        /// Verification status code.
        #[serde(default)]
        status: Option<u32>,
        /// Error histogram entry.
        #[serde(default)]
        error: Option<ReportedError>,
    },
}

/// Content-signature primitive implemented by an external process.
pub struct ExternalVerifier {
    /// Verifier command.
    command: ExternalCommand,
}

impl ExternalVerifier {
    /// Creates a verifier that spawns `command` for every call.
    #[must_use]
    pub const fn new(command: ExternalCommand) -> Self {
        Self {
            command,
        }
    }
}

#[async_trait]
impl ContentSignaturePrimitive for ExternalVerifier {
    async fn verify_content_signature(
        &self,
        request: PrimitiveRequest<'_>,
        telemetry: &TelemetryRecorder,
    ) -> Result<bool, PrimitiveError> {
        let input = std::str::from_utf8(request.input)
            .map_err(|err| PrimitiveError::Unavailable(format!("signed input is not UTF-8: {err}")))?;
        let body = VerifyRequest {
            input,
            signature: request.signature,
            certificate_chain: request.certificate_chain,
            signer: request.signer.as_str(),
            trust_root: request.trust_root.as_str(),
        };
        let reply: VerifyReply =
            self.command.exchange(&body).await.map_err(PrimitiveError::Unavailable)?;
        match reply {
            VerifyReply::Raised {
                exception,
            } => Err(PrimitiveError::Raised(exception)),
            VerifyReply::Verdict {
                verified,
                status,
                error,
            } => {
                if let Some(code) = status {
                    telemetry.record_verification(code);
                }
                if let Some(ReportedError {
                    key,
                    code,
                }) = error
                {
                    telemetry.record_error(&key, code);
                }
                Ok(verified)
            }
        }
    }
}

// ============================================================================
// SECTION: Installer
// ============================================================================

/// Installer request body.
#[derive(Serialize)]
struct InstallRequest<'a> {
    /// XPI URL.
    url: &'a str,
    /// Whether the development signing root is trusted.
    dev_root: bool,
}

/// Installer reply body.
#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum InstallReply {
    /// Install completed with this signed state.
    SignedState(i32),
    /// Install was rejected with this error code.
    InstallError(i32),
}

/// Addon installer implemented by an external process.
pub struct ExternalInstaller {
    /// Installer command.
    command: ExternalCommand,
}

impl ExternalInstaller {
    /// Creates an installer that spawns `command` for every install.
    #[must_use]
    pub const fn new(command: ExternalCommand) -> Self {
        Self {
            command,
        }
    }
}

#[async_trait]
impl AddonInstaller for ExternalInstaller {
    async fn install(&self, url: &str, dev_root: bool) -> Result<SignedState, InstallError> {
        let body = InstallRequest {
            url,
            dev_root,
        };
        let reply: InstallReply =
            self.command.exchange(&body).await.map_err(InstallError::Unavailable)?;
        match reply {
            InstallReply::SignedState(code) => SignedState::from_code(code)
                .ok_or_else(|| InstallError::Unavailable(format!("unknown signed state {code}"))),
            InstallReply::InstallError(code) => Err(InstallError::Rejected {
                code,
            }),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
