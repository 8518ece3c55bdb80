use super::oracle::{
    BasePair, FoldCommand, FoldRequest, FoldResult, FoldingBackend, OracleError, Structure,
    parse_dot_bracket, to_dot_bracket,
};
use crate::core::sequence::to_rna;
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

pub const VIENNA_BIN_DIR_ENV: &str = "PARTSGENIE_VIENNA_BIN_DIR";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Folding backend that shells out to the ViennaRNA command-line programs
/// (`RNAfold`, `RNAcofold`, `RNAsubopt`, `RNAeval`).
#[derive(Debug, Clone)]
pub struct ViennaBackend {
    bin_dir: Option<PathBuf>,
    timeout: Duration,
}

impl Default for ViennaBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ViennaBackend {
    /// Uses `PARTSGENIE_VIENNA_BIN_DIR` when set, otherwise `PATH`.
    pub fn new() -> Self {
        let bin_dir = std::env::var(VIENNA_BIN_DIR_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self {
            bin_dir,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_bin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bin_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn executable(&self, program: &str) -> String {
        match &self.bin_dir {
            Some(dir) => dir.join(program).to_string_lossy().to_string(),
            None => program.to_string(),
        }
    }

    fn invocation(&self, request: &FoldRequest) -> (String, Vec<String>, String) {
        let joined = request
            .sequences
            .iter()
            .map(|s| to_rna(s))
            .collect::<Vec<_>>()
            .join("&");
        let two_strands = request.sequences.len() == 2;

        let mut args = vec![
            "--noPS".to_string(),
            format!("--temp={}", request.temperature),
            format!("--dangles={}", request.dangles.level()),
        ];

        let (program, input) = match &request.command {
            FoldCommand::Mfe => {
                let program = if two_strands { "RNAcofold" } else { "RNAfold" };
                (program, format!("{}\n", joined))
            }
            FoldCommand::Subopt { energy_gap } => {
                args.retain(|a| a != "--noPS");
                args.push(format!("--deltaEnergy={}", energy_gap));
                args.push("--sorted".to_string());
                ("RNAsubopt", format!("{}\n", joined))
            }
            FoldCommand::Energy { pairs } => {
                args.retain(|a| a != "--noPS");
                let structure = dot_bracket_with_nick(request, pairs);
                ("RNAeval", format!("{}\n{}\n", joined, structure))
            }
        };
        (self.executable(program), args, input)
    }

    fn run(
        &self,
        executable: &str,
        args: &[String],
        input: &str,
    ) -> Result<String, OracleError> {
        let mut child = Command::new(executable)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    OracleError::ToolNotFound {
                        executable: executable.to_string(),
                        env_var: VIENNA_BIN_DIR_ENV,
                    }
                } else {
                    OracleError::Backend(format!(
                        "could not run '{}' with args [{}]: {}",
                        executable,
                        args.join(" "),
                        e
                    ))
                }
            })?;

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(input.as_bytes()) {
                drop(stdin);
                terminate(&mut child);
                let _ = stdout.join();
                let _ = stderr.join();
                return Err(OracleError::Backend(format!("writing to '{}': {}", executable, e)));
            }
        }

        let status = match wait_with_timeout(&mut child, self.timeout) {
            Ok(status) => status,
            Err(e) => {
                let _ = stdout.join();
                let _ = stderr.join();
                return Err(match e {
                    WaitError::TimedOut => OracleError::Timeout {
                        executable: executable.to_string(),
                        timeout: self.timeout,
                    },
                    WaitError::Io(e) => {
                        OracleError::Backend(format!("waiting for '{}': {}", executable, e))
                    }
                });
            }
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            return Err(OracleError::ToolFailed {
                executable: executable.to_string(),
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(stdout)
    }
}

fn dot_bracket_with_nick(request: &FoldRequest, pairs: &[BasePair]) -> String {
    let structure = to_dot_bracket(request.total_length(), pairs);
    match request.sequences.as_slice() {
        [first, _] => format!("{}&{}", &structure[..first.len()], &structure[first.len()..]),
        _ => structure,
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}

enum WaitError {
    TimedOut,
    Io(std::io::Error),
}

fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> Result<std::process::ExitStatus, WaitError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                terminate(child);
                return Err(WaitError::TimedOut);
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                terminate(child);
                return Err(WaitError::Io(e));
            }
        }
    }
}

/// Kills and reaps a folding process that will not be waited on normally.
fn terminate(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!("Failed to kill folding process {}: {}", child.id(), e);
    }
    let _ = child.wait();
}

/// Parses a `STRUCTURE ( -1.23)` or `STRUCTURE -1.23` line.
pub(crate) fn parse_structure_line(line: &str) -> Option<Structure> {
    let line = line.trim();
    let split = line.find(char::is_whitespace)?;
    let (structure, rest) = line.split_at(split);
    if !structure
        .chars()
        .all(|c| matches!(c, '(' | ')' | '.' | '&'))
    {
        return None;
    }
    let energy_token = rest
        .trim()
        .trim_start_matches('(')
        .split(|c: char| c == ')' || c.is_whitespace())
        .find(|t| !t.is_empty())?;
    let energy: f64 = energy_token.parse().ok()?;
    let pairs = parse_dot_bracket(structure).ok()?;
    Some(Structure { energy, pairs })
}

fn parse_output(executable: &str, command: &FoldCommand, stdout: &str) -> Result<FoldResult, OracleError> {
    let structures: Vec<Structure> = stdout.lines().filter_map(parse_structure_line).collect();
    let malformed = || OracleError::MalformedOutput {
        executable: executable.to_string(),
        message: format!("no structure line in output: '{}'", stdout.trim()),
    };
    match command {
        FoldCommand::Subopt { .. } => {
            if structures.is_empty() {
                return Err(malformed());
            }
            Ok(FoldResult { structures })
        }
        _ => structures
            .into_iter()
            .next()
            .map(FoldResult::single)
            .ok_or_else(malformed),
    }
}

impl FoldingBackend for ViennaBackend {
    fn name(&self) -> &str {
        "viennarna"
    }

    #[instrument(level = "trace", skip_all, fields(strands = request.sequences.len()))]
    fn fold(&self, request: &FoldRequest) -> Result<FoldResult, OracleError> {
        request.validate()?;
        let (executable, args, input) = self.invocation(request);
        debug!(executable = %executable, args = ?args, "Invoking folding tool.");
        let stdout = self.run(&executable, &args, &input)?;
        parse_output(&executable, &request.command, &stdout)
    }
}
