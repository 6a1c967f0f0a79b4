pub mod job;
pub mod protocol;

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::{PipelineError, Result};
use crate::utils::tail;

pub use job::AnonymizationJob;
pub use protocol::{EngineMetrics, OutputLine, TaggedValue, PROTOCOL_VERSION};

/// Hard limit for one engine invocation
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(120);

/// Bytes of stderr kept in a failure message
const STDERR_TAIL: usize = 2048;

/// How to launch the external anonymization engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Executable, e.g. `java`
    pub program: String,
    /// Leading arguments placed before the positional protocol arguments,
    /// e.g. `["-jar", "data-processor-main.jar"]`
    pub args: Vec<String>,
    pub timeout: Duration,
    /// Directory for job temp files; the system temp dir when `None`
    pub work_dir: Option<PathBuf>,
    /// Keep the output file of failed, empty or short runs
    pub retain_failed_output: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "java".to_string(),
            args: vec!["-jar".to_string(), "data-processor-main.jar".to_string()],
            timeout: DEFAULT_ENGINE_TIMEOUT,
            work_dir: None,
            retain_failed_output: true,
        }
    }
}

/// Successful engine response
#[derive(Debug, Clone)]
pub struct EngineReport {
    pub outputs: Vec<OutputLine>,
}

/// Everything learned from one invocation, success or not
#[derive(Debug)]
pub struct EngineRun {
    pub outcome: Result<EngineReport>,
    /// Parsed from stdout even when the run failed
    pub metrics: EngineMetrics,
    /// Output file kept for diagnosis
    pub retained_output: Option<PathBuf>,
    pub elapsed: Duration,
}

/// Runs anonymization jobs as subprocesses. Holds no per-request state.
#[derive(Debug, Clone)]
pub struct AnonymizationEngine {
    config: EngineConfig,
}

impl AnonymizationEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        if config.program.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "engine program must not be empty".to_string(),
            ));
        }
        if config.timeout.is_zero() {
            return Err(PipelineError::Configuration(
                "engine timeout must be positive".to_string(),
            ));
        }
        if let Some(dir) = &config.work_dir {
            if !dir.is_dir() {
                return Err(PipelineError::Configuration(format!(
                    "engine work dir {} does not exist",
                    dir.display()
                )));
            }
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Directory new jobs should place their files in
    pub fn work_dir(&self) -> PathBuf {
        self.config
            .work_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Invokes the engine once and cleans up the job's files.
    ///
    /// The input file is always deleted. The output file is deleted on timeout
    /// and on a complete success. It is kept when `retain_failed_output` is set
    /// and the run failed or answered a different number of lines than it was
    /// given.
    #[instrument(skip(self, job), fields(values = job.tagged_values().len()))]
    pub async fn run(&self, job: AnonymizationJob) -> EngineRun {
        let started = Instant::now();
        let (outcome, metrics) = self.invoke(&job).await;

        let expected = job.tagged_values().len();
        let retain = match &outcome {
            Ok(report) if report.outputs.len() != expected => {
                warn!(
                    "Engine answered {} lines for {} values",
                    report.outputs.len(),
                    expected
                );
                self.config.retain_failed_output
            }
            Ok(_) => false,
            Err(PipelineError::SubprocessTimeout(_)) => false,
            Err(_) => self.config.retain_failed_output,
        };
        let retained_output = job.finish(retain);

        match &outcome {
            Ok(report) => info!(
                "Engine returned {} values in {:?}",
                report.outputs.len(),
                started.elapsed()
            ),
            Err(e) => error!("Engine run failed: {}", e),
        }

        EngineRun {
            outcome,
            metrics,
            retained_output,
            elapsed: started.elapsed(),
        }
    }

    async fn invoke(&self, job: &AnonymizationJob) -> (Result<EngineReport>, EngineMetrics) {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .args(job.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        debug!("Launching engine {} {:?}", self.config.program, self.config.args);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return (
                    Err(PipelineError::SubprocessFailure {
                        status: "spawn failed".to_string(),
                        stderr: e.to_string(),
                    }),
                    EngineMetrics::default(),
                )
            }
        };

        // Dropping the future on timeout drops the child, which kills it.
        let output = match timeout(self.config.timeout, child.wait_with_output()).await {
            Err(_) => {
                warn!("Engine exceeded {:?}, partial output discarded", self.config.timeout);
                return (
                    Err(PipelineError::SubprocessTimeout(self.config.timeout)),
                    EngineMetrics::default(),
                );
            }
            Ok(Err(e)) => {
                return (
                    Err(PipelineError::SubprocessFailure {
                        status: "wait failed".to_string(),
                        stderr: e.to_string(),
                    }),
                    EngineMetrics::default(),
                )
            }
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        trace!("Engine stdout:\n{}", stdout);
        let metrics = protocol::parse_metrics(&stdout);

        if !output.status.success() {
            return (
                Err(PipelineError::SubprocessFailure {
                    status: output.status.to_string(),
                    stderr: tail(&stderr, STDERR_TAIL).to_string(),
                }),
                metrics,
            );
        }
        if !stderr.trim().is_empty() {
            debug!("Engine stderr: {}", tail(&stderr, STDERR_TAIL));
        }

        (self.collect(job).await, metrics)
    }

    async fn collect(&self, job: &AnonymizationJob) -> Result<EngineReport> {
        let contents = match tokio::fs::read_to_string(job.output_path()).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PipelineError::ProtocolMismatch("output file missing".to_string()))
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(PipelineError::ProtocolMismatch(
                    "output file is not valid UTF-8".to_string(),
                ))
            }
            Err(e) => return Err(PipelineError::Io(e)),
        };

        let outputs = protocol::parse_output(&contents);
        if outputs.is_empty() {
            return Err(PipelineError::ProtocolMismatch("output file empty".to_string()));
        }
        Ok(EngineReport { outputs })
    }
}
