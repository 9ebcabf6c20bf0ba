use const_format::concatcp;
use log::debug;
use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::process::Command;

pub const ENV_PREFIX: &str = "DISCSHELF_";
pub const CHDMAN_ENV: &str = concatcp!(ENV_PREFIX, "CHDMAN");
pub const SEVENZIP_ENV: &str = concatcp!(ENV_PREFIX, "SEVENZIP");

pub const CHDMAN_HINT: &str = "chdman is part of the MAME tools. On Linux install 'mame-tools' or 'mame', on macOS 'brew install mame', on Windows use the official MAME release and pass --chdman with the path to chdman.exe";
pub const SEVENZIP_HINT: &str = "Install p7zip (Linux), 'brew install p7zip' (macOS) or 7-Zip (Windows) and pass --sevenzip if it is not on PATH";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Could not find {name}. {hint}")]
    NotFound { name: String, hint: &'static str },

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

pub type ToolResult<T> = Result<T, ToolError>;

/// A single external program call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

impl Display for ToolInvocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
}

/// Runs external programs. The process backed runner is used by the CLI,
/// tests substitute a recording fake.
pub trait ToolRunner {
    fn run(
        &self,
        invocation: &ToolInvocation,
    ) -> impl Future<Output = ToolResult<ToolOutput>> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: &ToolInvocation) -> ToolResult<ToolOutput> {
        debug!("Running: {invocation}");

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }

        let output = command.output().await.map_err(|source| ToolError::Spawn {
            program: invocation.program_name(),
            source,
        })?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                program: invocation.program_name(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

/// Resolves an executable: explicit path first, then the environment
/// variable `env_key`, then every candidate name on `PATH`.
pub fn resolve_tool(
    candidates: &[&str],
    user_path: Option<&Path>,
    env_key: &str,
    hint: &'static str,
) -> ToolResult<PathBuf> {
    let name = candidates.first().copied().unwrap_or_default().to_string();
    let not_found = || ToolError::NotFound {
        name: name.clone(),
        hint,
    };

    let configured = user_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(env_key).map(PathBuf::from));

    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path);
        }
        return find_on_path(&path.to_string_lossy()).ok_or_else(not_found);
    }

    candidates
        .iter()
        .find_map(|candidate| find_on_path(candidate))
        .ok_or_else(not_found)
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;

    std::env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{name}.exe"));
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Handler = dyn Fn(&ToolInvocation) -> ToolResult<ToolOutput> + Send + Sync;

    /// Records invocations and answers them with a handler instead of spawning.
    #[derive(Clone)]
    pub struct FakeRunner {
        calls: Arc<Mutex<Vec<ToolInvocation>>>,
        handler: Arc<Handler>,
    }

    impl FakeRunner {
        pub fn new(
            handler: impl Fn(&ToolInvocation) -> ToolResult<ToolOutput> + Send + Sync + 'static,
        ) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                handler: Arc::new(handler),
            }
        }

        pub fn succeeding() -> Self {
            Self::new(|_| Ok(ToolOutput::default()))
        }

        pub fn calls(&self) -> Vec<ToolInvocation> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ToolRunner for FakeRunner {
        async fn run(&self, invocation: &ToolInvocation) -> ToolResult<ToolOutput> {
            self.calls.lock().unwrap().push(invocation.clone());
            (self.handler)(invocation)
        }
    }
}
