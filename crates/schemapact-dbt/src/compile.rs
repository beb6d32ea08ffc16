//! Running the project compiler to produce manifest.json
//!
//! The compiler is an external program (`dbt compile --quiet` by default).
//! Runs are bounded by a timeout, and failures are classified from the
//! compiler's output so the message points at the likely fix.

use schemapact_core::SourceConfig;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Output kept from a failed run
const DETAIL_LIMIT: usize = 2000;

/// Likely cause of a failed compile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// Credentials or profile authentication rejected
    Authentication,

    /// Warehouse unreachable
    Connectivity,

    /// Project or profile misconfiguration, or a model that fails to compile
    Project,

    /// Nothing recognizable in the output
    Unknown,
}

impl FailureCategory {
    /// Classify from the compiler's combined stdout and stderr
    pub fn classify(output: &str) -> Self {
        let lower = output.to_lowercase();

        const AUTH: &[&str] = &[
            "authentication",
            "permission denied",
            "access denied",
            "unauthorized",
            "invalid credentials",
            "password",
            "credentials",
        ];
        const CONNECTIVITY: &[&str] = &[
            "could not connect",
            "connection refused",
            "connection timed out",
            "could not translate host",
            "name or service not known",
            "network is unreachable",
            "connection error",
        ];
        const PROJECT: &[&str] = &[
            "compilation error",
            "parsing error",
            "dbt_project.yml",
            "profiles.yml",
            "could not find profile",
            "not a dbt project",
            "runtime error",
        ];

        if AUTH.iter().any(|k| lower.contains(k)) {
            Self::Authentication
        } else if CONNECTIVITY.iter().any(|k| lower.contains(k)) {
            Self::Connectivity
        } else if PROJECT.iter().any(|k| lower.contains(k)) {
            Self::Project
        } else {
            Self::Unknown
        }
    }

    /// Remediation hint for this category
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Authentication => "check the credentials in your warehouse profile",
            Self::Connectivity => "check that the warehouse host is reachable from this machine",
            Self::Project => "check dbt_project.yml, profiles.yml and the failing model",
            Self::Unknown => "run the compile command manually to see the full output",
        }
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Authentication => "authentication",
            Self::Connectivity => "connectivity",
            Self::Project => "project configuration",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Compile errors
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Compile did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Failed to run `{command}`: {reason}")]
    Spawn { command: String, reason: String },

    #[error("Compile failed ({category} error, exit code {exit_code:?}): {detail}")]
    Failed {
        category: FailureCategory,
        exit_code: Option<i32>,
        detail: String,
    },
}

impl CompileError {
    /// Failure category, when the compiler ran and failed
    pub fn category(&self) -> Option<FailureCategory> {
        match self {
            Self::Failed { category, .. } => Some(*category),
            _ => None,
        }
    }
}

/// Captured output of a finished compile
#[derive(Debug)]
pub struct CompileOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Runs `<command> compile --quiet` in a project directory
#[derive(Debug, Clone)]
pub struct DbtCompiler {
    command: String,
    timeout: Duration,
}

impl DbtCompiler {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    /// Compiler configured from the `[source]` section
    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(config.compile_command.clone(), config.compile_timeout())
    }

    /// Compile the project; success means the manifest was (re)written
    pub fn compile(&self, project_root: &Path) -> Result<CompileOutput, CompileError> {
        tracing::info!(command = %self.command, project = %project_root.display(), "compiling project");

        let child = Command::new(&self.command)
            .args(["compile", "--quiet"])
            .current_dir(project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CompileError::Spawn {
                command: self.command.clone(),
                reason: e.to_string(),
            })?;

        let output = self.wait_for_child(child)?;

        if output.status.success() {
            tracing::info!(elapsed_ms = output.elapsed.as_millis() as u64, "compile finished");
            return Ok(output);
        }

        let combined = format!("{}\n{}", output.stdout, output.stderr);
        let category = FailureCategory::classify(&combined);
        Err(CompileError::Failed {
            category,
            exit_code: output.status.code(),
            detail: tail(combined.trim(), DETAIL_LIMIT),
        })
    }

    fn wait_for_child(&self, mut child: Child) -> Result<CompileOutput, CompileError> {
        let spawn_error = |reason: String| CompileError::Spawn {
            command: self.command.clone(),
            reason,
        };

        // Drain both pipes concurrently so a chatty compiler cannot block on a full pipe
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error("missing stdout pipe".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| spawn_error("missing stderr pipe".into()))?;
        let stdout_reader = thread::spawn(move || read_all(stdout));
        let stderr_reader = thread::spawn(move || read_all(stderr));

        let start = Instant::now();
        let status = loop {
            match child.try_wait().map_err(|e| spawn_error(e.to_string()))? {
                Some(status) => break status,
                None => {
                    if start.elapsed() >= self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(CompileError::Timeout(self.timeout));
                    }
                    thread::sleep(Duration::from_millis(50));
                }
            }
        };

        Ok(CompileOutput {
            status,
            stdout: stdout_reader.join().unwrap_or_default(),
            stderr: stderr_reader.join().unwrap_or_default(),
            elapsed: start.elapsed(),
        })
    }
}

fn read_all(mut pipe: impl Read) -> String {
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Last `limit` characters of `text`
fn tail(text: &str, limit: usize) -> String {
    let count = text.chars().count();
    if count <= limit {
        text.to_string()
    } else {
        let skipped: String = text.chars().skip(count - limit).collect();
        format!("...{}", skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_failures() {
        assert_eq!(
            FailureCategory::classify("Database Error\n  Authentication failed for user 'ci'"),
            FailureCategory::Authentication
        );
        assert_eq!(
            FailureCategory::classify("could not connect to server: Connection refused"),
            FailureCategory::Connectivity
        );
        assert_eq!(
            FailureCategory::classify("Compilation Error in model users (models/users.sql)"),
            FailureCategory::Project
        );
        assert_eq!(FailureCategory::classify("segfault"), FailureCategory::Unknown);
    }

    #[test]
    fn tail_keeps_the_end() {
        assert_eq!(tail("abcdef", 10), "abcdef");
        assert_eq!(tail("abcdef", 3), "...def");
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = DbtCompiler::new("schemapact-no-such-compiler", Duration::from_secs(5));
        let err = compiler.compile(dir.path()).unwrap_err();
        assert!(matches!(err, CompileError::Spawn { .. }));
        assert!(err.category().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn failing_compile_is_categorized() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-dbt");
        std::fs::write(&script, "#!/bin/sh\necho 'Could not find profile named shop' >&2\nexit 2\n").unwrap();
        make_executable(&script);

        let compiler = DbtCompiler::new(script.display().to_string(), Duration::from_secs(10));
        match compiler.compile(dir.path()).unwrap_err() {
            CompileError::Failed { category, exit_code, detail } => {
                assert_eq!(category, FailureCategory::Project);
                assert_eq!(exit_code, Some(2));
                assert!(detail.contains("Could not find profile"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn slow_compile_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow-dbt");
        std::fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
        make_executable(&script);

        let compiler = DbtCompiler::new(script.display().to_string(), Duration::from_millis(200));
        assert!(matches!(compiler.compile(dir.path()), Err(CompileError::Timeout(_))));
    }

    #[cfg(unix)]
    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).unwrap();
    }
}
