use crate::error::CommandError;
use anyhow::{bail, Context, Result};
use log::debug;
use std::io::{self, BufRead, BufReader};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// How long a child gets to exit after SIGTERM before it is killed outright.
const TERM_GRACE:    Duration = Duration::from_millis(500);

/// Cancellation handle shared between the caller and every invocation it
/// governs. Fires when `cancel()` is called or the deadline passes.
#[derive(Debug, Clone, Default)]
pub struct Cancel {
    flag:     Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancel {
    /// Never fires unless cancelled by hand.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag:     Arc::default(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Line-by-line view of a child's stdout. Invalid UTF-8 is replaced rather
/// than ending the stream, so the pipe is always read to EOF.
pub struct LineStream {
    reader: BufReader<ChildStdout>,
    buf:    Vec<u8>,
}

impl LineStream {
    fn new(stdout: ChildStdout) -> Self {
        Self { reader: BufReader::new(stdout), buf: Vec::new() }
    }
}

impl Iterator for LineStream {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Err(e) => {
                debug!("reading output: {}", e);
                None
            }
            Ok(_) => {
                while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
                    self.buf.pop();
                }
                Some(String::from_utf8_lossy(&self.buf).into_owned())
            }
        }
    }
}

/// An external tool, optionally run through `sudo -n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRunner {
    program:      String,
    leading_args: Vec<String>,
    use_sudo:     bool,
}

impl CommandRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), leading_args: Vec::new(), use_sudo: false }
    }

    /// Build from a shell-style command line such as `smartctl` or
    /// `/opt/bin/smartctl --nocheck=standby`.
    pub fn from_command_line(line: &str) -> Result<Self> {
        let mut words = shell_words::split(line)
            .with_context(|| format!("invalid command line {:?}", line))?;
        if words.is_empty() {
            bail!("empty command line");
        }
        let program = words.remove(0);
        Ok(Self { program, leading_args: words, use_sudo: false })
    }

    pub fn with_sudo(mut self, use_sudo: bool) -> Self {
        self.use_sudo = use_sudo;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn uses_sudo(&self) -> bool {
        self.use_sudo
    }

    fn prepare(&self, args: &[&str]) -> Command {
        let mut cmd = if self.use_sudo {
            let mut c = Command::new("sudo");
            c.arg("-n").arg(&self.program);
            c
        } else {
            Command::new(&self.program)
        };
        cmd.args(&self.leading_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        // Own process group, so cancellation reaches anything the tool forks.
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut cmd, 0);
        cmd
    }

    /// Start the tool and hand its stdout to `drain`, which runs on its own
    /// thread while this one waits on the process. Returns once the process
    /// has exited and `drain` has finished; whatever `drain` stored through
    /// its captures survives a failed outcome.
    ///
    /// Lines `drain` leaves unread are discarded before joining, so the child
    /// can never stall on a full pipe. A token that has already fired means
    /// nothing is started at all.
    pub fn run<F>(&self, cancel: &Cancel, args: &[&str], drain: F) -> Result<(), CommandError>
    where
        F: FnOnce(&mut LineStream) + Send,
    {
        if cancel.is_cancelled() {
            debug!("skip: {} {} (cancelled)", self.program, args.join(" "));
            return Err(CommandError::Cancelled { program: self.program.clone() });
        }
        debug!("exec: {}{} {}", if self.use_sudo { "sudo -n " } else { "" }, self.program, args.join(" "));

        let mut child = self.prepare(args).spawn().map_err(|source| CommandError::Launch {
            program: self.program.clone(),
            source,
        })?;
        let pid = child.id();

        let Some(stdout) = child.stdout.take() else {
            kill_group(pid);
            let _ = child.kill();
            let _ = child.wait();
            return Err(CommandError::Wait {
                program: self.program.clone(),
                source:  io::Error::other("stdout was not captured"),
            });
        };

        let (waited, drained) = thread::scope(|scope| {
            let mut stream = LineStream::new(stdout);
            let reader = scope.spawn(move || {
                drain(&mut stream);
                stream.for_each(drop);
            });
            let mut waited = wait_or_cancel(&mut child, cancel);
            if matches!(waited, Ok(Waited::Exited(_))) && !reader_finishes(&reader, cancel) {
                // The tool is gone but something it started still holds stdout.
                kill_group(pid);
                waited = Ok(Waited::Cancelled);
            }
            (waited, reader.join())
        });

        let program = self.program.clone();
        match (waited, drained) {
            (Err(source), _)               => Err(CommandError::Wait { program, source }),
            (Ok(Waited::Cancelled), _)     => Err(CommandError::Cancelled { program }),
            (Ok(Waited::Exited(_)), Err(_)) => Err(CommandError::DrainPanicked { program }),
            (Ok(Waited::Exited(status)), Ok(())) => {
                if status.success() {
                    Ok(())
                } else {
                    Err(CommandError::Exit { program, status: status.to_string() })
                }
            }
        }
    }
}

enum Waited {
    Exited(ExitStatus),
    Cancelled,
}

fn wait_or_cancel(child: &mut Child, cancel: &Cancel) -> io::Result<Waited> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Waited::Exited(status)),
            Ok(None) => {}
            Err(e) => {
                // Still running as far as we know; don't leave the reader blocked.
                kill_group(child.id());
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        }
        if cancel.is_cancelled() {
            terminate(child)?;
            return Ok(Waited::Cancelled);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// False if the token fires before the reader reaches EOF.
fn reader_finishes<T>(reader: &thread::ScopedJoinHandle<'_, T>, cancel: &Cancel) -> bool {
    while !reader.is_finished() {
        if cancel.is_cancelled() {
            return false;
        }
        thread::sleep(POLL_INTERVAL);
    }
    true
}

fn terminate(child: &mut Child) -> io::Result<()> {
    let pid = child.id();
    #[cfg(unix)]
    {
        // SIGTERM first: sudo relays it, SIGKILL it can't.
        signal_group(pid, nix::sys::signal::Signal::SIGTERM);
        let grace = Instant::now() + TERM_GRACE;
        while Instant::now() < grace && child.try_wait()?.is_none() {
            thread::sleep(POLL_INTERVAL);
        }
    }
    // Whatever is left of the group, leader included.
    kill_group(pid);
    let _ = child.kill();
    child.wait().map(drop)
}

fn kill_group(pid: u32) {
    #[cfg(unix)]
    signal_group(pid, nix::sys::signal::Signal::SIGKILL);
    #[cfg(not(unix))]
    let _ = pid;
}

/// The child leads its own group (see `prepare`), so its pid is the pgid.
#[cfg(unix)]
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let Ok(pid) = i32::try_from(pid) else { return };
    if let Err(e) = killpg(Pid::from_raw(pid), signal) {
        debug!("{:?} to process group {}: {}", signal, pid, e);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> (CommandRunner, Vec<String>) {
        (CommandRunner::new("sh"), vec!["-c".to_string(), script.to_string()])
    }

    fn collect(runner: &CommandRunner, cancel: &Cancel, args: &[String]) -> (Vec<String>, Result<(), CommandError>) {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let mut lines = Vec::new();
        let res = runner.run(cancel, &args, |stream| lines.extend(stream));
        (lines, res)
    }

    #[test]
    fn streams_lines_and_reports_success() {
        let (runner, args) = sh("printf 'one\\r\\ntwo\\nthree'");
        let (lines, res) = collect(&runner, &Cancel::new(), &args);
        assert!(res.is_ok());
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[test]
    fn nonzero_exit_keeps_output() {
        let (runner, args) = sh("echo partial; exit 4");
        let (lines, res) = collect(&runner, &Cancel::new(), &args);
        assert_eq!(lines, vec!["partial"]);
        assert!(matches!(res, Err(CommandError::Exit { .. })));
    }

    #[test]
    fn missing_binary_is_a_launch_error() {
        let runner = CommandRunner::new("/nonexistent/diskhealth-test-tool");
        let res = runner.run(&Cancel::new(), &[], |_| {});
        assert!(matches!(res, Err(CommandError::Launch { .. })));
    }

    #[test]
    fn output_larger_than_pipe_buffer_does_not_stall() {
        let (runner, args) = sh("i=0; while [ $i -lt 20000 ]; do echo \"line $i of filler text\"; i=$((i+1)); done");
        let (lines, res) = collect(&runner, &Cancel::new(), &args);
        assert!(res.is_ok());
        assert_eq!(lines.len(), 20000);
    }

    #[test]
    fn unread_lines_are_drained() {
        let (runner, args) = sh("i=0; while [ $i -lt 20000 ]; do echo filler; i=$((i+1)); done");
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let mut first = None;
        let res = runner.run(&Cancel::new(), &args, |stream| first = stream.next());
        assert!(res.is_ok());
        assert_eq!(first.as_deref(), Some("filler"));
    }

    #[test]
    fn deadline_terminates_the_process() {
        let runner = CommandRunner::new("sleep");
        let started = Instant::now();
        let res = runner.run(&Cancel::with_timeout(Duration::from_millis(100)), &["30"], |s| s.for_each(drop));
        assert!(matches!(res, Err(CommandError::Cancelled { .. })));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn background_child_holding_stdout_is_cancelled() {
        let (runner, args) = sh("sleep 30 & sleep 30");
        let started = Instant::now();
        let (_, res) = collect(&runner, &Cancel::with_timeout(Duration::from_millis(200)), &args);
        assert!(matches!(res, Err(CommandError::Cancelled { .. })));
        assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());
    }

    #[test]
    fn leftover_child_after_exit_is_cut_off() {
        let (runner, args) = sh("sleep 30 & echo done");
        let started = Instant::now();
        let (lines, res) = collect(&runner, &Cancel::with_timeout(Duration::from_millis(300)), &args);
        assert_eq!(lines, vec!["done"]);
        assert!(matches!(res, Err(CommandError::Cancelled { .. })));
        assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());
    }

    #[test]
    fn fired_token_never_starts_the_tool() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("started");
        let (runner, args) = sh(&format!("touch '{}'", marker.display()));
        let cancel = Cancel::new();
        cancel.cancel();

        let (lines, res) = collect(&runner, &cancel, &args);
        assert!(matches!(res, Err(CommandError::Cancelled { .. })));
        assert!(lines.is_empty());
        assert!(!marker.exists());
    }

    #[test]
    fn manual_cancel_is_shared_between_clones() {
        let cancel = Cancel::new();
        let other = cancel.clone();
        assert!(!other.is_cancelled());
        cancel.cancel();
        assert!(other.is_cancelled());

        let res = CommandRunner::new("sleep").run(&other, &["30"], |s| s.for_each(drop));
        assert!(matches!(res, Err(CommandError::Cancelled { .. })));
    }

    #[test]
    fn command_line_splits_leading_args() {
        let r = CommandRunner::from_command_line("sh '/tmp/my tool.sh'").unwrap();
        assert_eq!(r.program(), "sh");
        assert_eq!(r.leading_args, vec!["/tmp/my tool.sh"]);
        assert!(CommandRunner::from_command_line("   ").is_err());
        assert!(CommandRunner::from_command_line("smartctl").unwrap().with_sudo(true).uses_sudo());
    }
}
