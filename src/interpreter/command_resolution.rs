//! Command Resolution
//!
//! PATH-based lookup of external commands and the collaborator that runs
//! them. The runner only talks to the [`CommandExecutor`] trait; the default
//! [`OsExecutor`] spawns real processes with `std::process::Command`.

use std::fs;
use std::io::{self, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Command, Stdio as ProcessStdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::interpreter::stdio::{InStream, OutStream, Stdio};

/// Status of a command that could not be found.
pub const NOT_FOUND_EXIT_CODE: i32 = 127;
/// Status of a command that exists but cannot be executed.
pub const NOT_EXECUTABLE_EXIT_CODE: i32 = 126;

/// Result type for command resolution
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveCommandResult {
    /// Found an executable file at the given path
    Command { path: String },
    /// Command not found
    NotFound,
    /// Permission denied (file exists but not executable, or is a directory)
    PermissionDenied { path: String },
}

/// Default PATH value when not set in environment
pub const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Split PATH into individual directories
pub fn split_path(path_env: &str) -> Vec<&str> {
    path_env.split(':').filter(|s| !s.is_empty()).collect()
}

/// Check if a command name contains a path separator (making it a path reference)
pub fn is_path_command(command_name: &str) -> bool {
    command_name.contains('/')
}

/// Build a full path from a directory and command name
pub fn build_command_path(dir: &str, command_name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, command_name)
    } else {
        format!("{}/{}", dir, command_name)
    }
}

/// Check if a file mode indicates the file is executable
pub fn is_executable_mode(mode: u32) -> bool {
    (mode & 0o111) != 0
}

fn resolve_against(cwd: &str, path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        build_command_path(cwd, path)
    }
}

/// Resolve a command name to an executable path.
///
/// Resolution order:
/// 1. If command contains "/", resolve it as a path relative to `cwd`
/// 2. Otherwise search PATH directories (relative entries against `cwd`),
///    skipping directories and non-executable files
pub fn resolve_command(cwd: &str, env_path: Option<&str>, command_name: &str) -> ResolveCommandResult {
    if is_path_command(command_name) {
        let path = resolve_against(cwd, command_name);
        return match fs::metadata(&path) {
            Err(_) => ResolveCommandResult::NotFound,
            Ok(meta) if meta.is_dir() || !is_executable_mode(meta.permissions().mode()) => {
                ResolveCommandResult::PermissionDenied { path }
            }
            Ok(_) => ResolveCommandResult::Command { path },
        };
    }

    let mut denied = None;
    for dir in split_path(env_path.unwrap_or(DEFAULT_PATH)) {
        let full_path = build_command_path(&resolve_against(cwd, dir), command_name);
        let Ok(meta) = fs::metadata(&full_path) else {
            continue;
        };
        if meta.is_dir() {
            continue;
        }
        if is_executable_mode(meta.permissions().mode()) {
            return ResolveCommandResult::Command { path: full_path };
        }
        denied.get_or_insert(full_path);
    }

    match denied {
        Some(path) => ResolveCommandResult::PermissionDenied { path },
        None => ResolveCommandResult::NotFound,
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Everything needed to start one external command.
#[derive(Debug, Clone, Copy)]
pub struct ExternalCommand<'a> {
    /// Argument vector; `argv[0]` is the command name
    pub argv: &'a [String],
    /// Exported variables, layered over the process environment
    pub env: &'a [(String, String)],
    pub cwd: &'a str,
    /// Value of the shell's PATH, if set
    pub path: Option<&'a str>,
}

/// Capability to run external commands.
///
/// Implementations report spawn failures as statuses (127/126 plus a message
/// on `stdio.stderr`); an `Err` means the shell's own streams failed.
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, cmd: &ExternalCommand<'_>, stdio: &Stdio) -> io::Result<i32>;
}

/// Runs commands as child processes of the current process.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsExecutor;

impl OsExecutor {
    fn spawn_failure(name: &str, err: &io::Error, stdio: &Stdio) -> io::Result<i32> {
        tracing::debug!(command = name, error = %err, "spawn failed");
        let (message, status) = match err.kind() {
            io::ErrorKind::PermissionDenied => ("Permission denied", NOT_EXECUTABLE_EXIT_CODE),
            io::ErrorKind::NotFound => ("command not found", NOT_FOUND_EXIT_CODE),
            _ => ("cannot execute", NOT_EXECUTABLE_EXIT_CODE),
        };
        stdio.stderr.write_str(&format!("treesh: {}: {}\n", name, message))?;
        Ok(status)
    }
}

impl CommandExecutor for OsExecutor {
    fn execute(&self, cmd: &ExternalCommand<'_>, stdio: &Stdio) -> io::Result<i32> {
        let Some(name) = cmd.argv.first() else {
            return Ok(0);
        };

        let path = match resolve_command(cmd.cwd, cmd.path, name) {
            ResolveCommandResult::Command { path } => path,
            ResolveCommandResult::NotFound => {
                stdio.stderr.write_str(&format!("treesh: {}: command not found\n", name))?;
                return Ok(NOT_FOUND_EXIT_CODE);
            }
            ResolveCommandResult::PermissionDenied { .. } => {
                stdio.stderr.write_str(&format!("treesh: {}: Permission denied\n", name))?;
                return Ok(NOT_EXECUTABLE_EXIT_CODE);
            }
        };

        let mut command = Command::new(&path);
        command
            .arg0(name)
            .args(&cmd.argv[1..])
            .envs(cmd.env.iter().map(|(k, v)| (k, v)))
            .current_dir(cmd.cwd)
            .stdout(ProcessStdio::piped())
            .stderr(ProcessStdio::piped());

        // The child reads from an OS pipe; a second read end lets the shell
        // take back whatever the child leaves unread.
        let feed = match &stdio.stdin {
            Some(input) => {
                let (child_end, feeder_end) = io::pipe()?;
                let reclaim = child_end.try_clone()?;
                command.stdin(child_end);
                Some((input.clone(), feeder_end, reclaim))
            }
            None => {
                command.stdin(ProcessStdio::null());
                None
            }
        };

        let spawned = command.spawn();
        drop(command);
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => return Self::spawn_failure(name, &e, stdio),
        };
        tracing::debug!(command = %path, pid = child.id(), "spawned external command");

        let out = child.stdout.take();
        let err = child.stderr.take();
        let exited = AtomicBool::new(false);
        let (status, out_result, err_result) = thread::scope(|s| {
            let feeder = feed.map(|(input, pipe, reclaim)| {
                let source = input.clone();
                let exited = &exited;
                let handle = s.spawn(move || feed_child(source, pipe, exited));
                (input, reclaim, handle)
            });
            let out_copier = s.spawn(|| copy_stream(out, stdio.stdout.clone()));
            let err_result = copy_stream(err, stdio.stderr.clone());
            let out_result = out_copier.join().unwrap_or(Ok(()));
            let status = child.wait();

            exited.store(true, Ordering::SeqCst);
            if let Some((input, mut reclaim, handle)) = feeder {
                // Ends once the feeder drops its write end.
                let mut unread = Vec::new();
                let _ = reclaim.read_to_end(&mut unread);
                unread.extend(handle.join().unwrap_or_default());
                if !unread.is_empty() {
                    tracing::debug!(bytes = unread.len(), "returning unread input");
                    input.unread(&unread);
                }
            }
            (status, out_result, err_result)
        });
        let status = status?;
        out_result?;
        err_result?;

        Ok(status
            .code()
            .or_else(|| status.signal().map(|sig| 128 + sig))
            .unwrap_or(1))
    }
}

/// Copy `input` into a child's stdin until input ends or the child exits.
/// The child is checked between reads; a chunk read after it exited, or one
/// it stopped accepting, is returned.
fn feed_child(mut input: InStream, mut pipe: io::PipeWriter, exited: &AtomicBool) -> Vec<u8> {
    let mut buf = [0u8; 8192];
    while !exited.load(Ordering::SeqCst) {
        let n = match input.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        if exited.load(Ordering::SeqCst) {
            return buf[..n].to_vec();
        }
        let mut written = 0;
        while written < n {
            match pipe.write(&buf[written..n]) {
                Ok(0) => break,
                Ok(k) => written += k,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }
        if written < n {
            return buf[written..n].to_vec();
        }
    }
    Vec::new()
}

fn copy_stream<R: Read>(source: Option<R>, mut sink: OutStream) -> io::Result<()> {
    let Some(mut source) = source else {
        return Ok(());
    };
    let mut buf = [0u8; 8192];
    loop {
        let n = source.read(&mut buf)?;
        if n == 0 {
            return Ok(());
        }
        sink.write_all(&buf[..n])?;
        sink.flush()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::stdio::CaptureBuffer;

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("/usr/bin::/bin:"), vec!["/usr/bin", "/bin"]);
    }

    #[test]
    fn test_path_helpers() {
        assert!(is_path_command("./script.sh"));
        assert!(!is_path_command("echo"));
        assert_eq!(build_command_path("/usr/bin/", "ls"), "/usr/bin/ls");
        assert!(is_executable_mode(0o755));
        assert!(!is_executable_mode(0o644));
    }

    #[test]
    fn test_resolve_command_in_path() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("tool");
        fs::write(&bin, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&bin, fs::Permissions::from_mode(0o755)).unwrap();
        let plain = dir.path().join("plain");
        fs::write(&plain, "").unwrap();
        fs::set_permissions(&plain, fs::Permissions::from_mode(0o644)).unwrap();

        let path_env = dir.path().to_string_lossy().into_owned();
        assert_eq!(
            resolve_command("/", Some(&path_env), "tool"),
            ResolveCommandResult::Command { path: bin.to_string_lossy().into_owned() }
        );
        assert!(matches!(
            resolve_command("/", Some(&path_env), "plain"),
            ResolveCommandResult::PermissionDenied { .. }
        ));
        assert_eq!(
            resolve_command("/", Some(&path_env), "missing"),
            ResolveCommandResult::NotFound
        );
    }

    #[test]
    fn test_resolve_relative_path_command() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let cwd = dir.path().to_string_lossy().into_owned();
        assert!(matches!(
            resolve_command(&cwd, None, "./sub"),
            ResolveCommandResult::PermissionDenied { .. }
        ));
        assert_eq!(resolve_command(&cwd, None, "./nope"), ResolveCommandResult::NotFound);
    }

    fn run_external(argv: &[&str], stdin: &InStream) -> String {
        let stdout = CaptureBuffer::default();
        let stdio = Stdio::new(Some(stdin.clone()), OutStream::new(stdout.clone()), OutStream::sink());
        let argv: Vec<String> = argv.iter().map(|a| a.to_string()).collect();
        let cmd = ExternalCommand { argv: &argv, env: &[], cwd: "/", path: None };
        assert_eq!(OsExecutor.execute(&cmd, &stdio).unwrap(), 0);
        stdout.contents()
    }

    #[test]
    fn test_input_not_read_by_child_stays_available() {
        let stdin = InStream::new(io::Cursor::new(b"abc\n".to_vec()));
        assert_eq!(run_external(&["/bin/true"], &stdin), "");
        assert_eq!(run_external(&["/bin/cat"], &stdin), "abc\n");
        assert_eq!(run_external(&["/bin/cat"], &stdin), "");
    }

    #[test]
    fn test_child_reads_all_input() {
        let text = "line\n".repeat(20_000);
        let stdin = InStream::new(io::Cursor::new(text.clone().into_bytes()));
        assert_eq!(run_external(&["/bin/cat"], &stdin), text);
    }

    #[test]
    fn test_executor_not_found() {
        let stderr = CaptureBuffer::default();
        let stdio = Stdio::new(None, OutStream::sink(), OutStream::new(stderr.clone()));
        let argv = vec!["treesh-no-such-command".to_string()];
        let cmd = ExternalCommand { argv: &argv, env: &[], cwd: "/", path: Some("/nonexistent") };

        assert_eq!(OsExecutor.execute(&cmd, &stdio).unwrap(), NOT_FOUND_EXIT_CODE);
        assert_eq!(stderr.contents(), "treesh: treesh-no-such-command: command not found\n");
    }
}
