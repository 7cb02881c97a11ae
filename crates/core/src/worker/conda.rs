//! Worker invoker that launches services inside their conda environments.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::error::WorkerError;
use super::output::{shorten, WorkerOutput, LOG_EXCERPT_CHARS};
use super::traits::{WorkerInvoker, WorkerRequest};
use crate::config::{RuntimeConfig, ServicesConfig};
use crate::metrics::{WORKER_DURATION, WORKER_RUNS};
use crate::service::ServiceKind;

/// A fully resolved command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

/// Launches `<launcher> run -n <env> <python> <script> <args..>` in the
/// service's root directory.
pub struct CondaWorkerInvoker {
    runtime: RuntimeConfig,
    services: ServicesConfig,
    photo_timeout: Duration,
}

impl CondaWorkerInvoker {
    pub fn new(runtime: RuntimeConfig, services: ServicesConfig, photo_timeout: Duration) -> Self {
        Self {
            runtime,
            services,
            photo_timeout,
        }
    }

    /// Builds the command line for a request without running it.
    pub fn command_line(&self, service: ServiceKind, request: &WorkerRequest) -> CommandLine {
        let service_config = self.services.get(service);

        let mut args = self.runtime.launcher_args.clone();
        args.extend([
            "run".to_string(),
            "-n".to_string(),
            service_config.environment.clone(),
            self.runtime.python.clone(),
        ]);

        match request {
            WorkerRequest::Batch { ticket } => {
                args.push(self.runtime.batch_script.clone());
                args.push(format!("--ticket={ticket}"));
            }
            WorkerRequest::Photo {
                filename,
                background,
            } => {
                args.push(self.runtime.photo_script.clone());
                args.push(format!("--filename={filename}"));
                if service.accepts_background_color() {
                    let color = background.unwrap_or_default();
                    args.push(format!("--bg_color={color}"));
                }
            }
        }

        CommandLine {
            program: self.runtime.launcher.clone(),
            args,
            working_dir: service_config.root.clone(),
        }
    }

    fn timeout_for(&self, request: &WorkerRequest) -> Option<Duration> {
        match request {
            WorkerRequest::Batch { .. } => None,
            WorkerRequest::Photo { .. } => Some(self.photo_timeout),
        }
    }
}

#[async_trait]
impl WorkerInvoker for CondaWorkerInvoker {
    async fn run(
        &self,
        service: ServiceKind,
        request: &WorkerRequest,
    ) -> Result<WorkerOutput, WorkerError> {
        let command_line = self.command_line(service, request);
        let mode = request.mode();
        let started = Instant::now();

        info!(
            service = %service,
            mode,
            program = %command_line.program.display(),
            args = ?command_line.args,
            cwd = %command_line.working_dir.display(),
            "Starting worker"
        );

        let child = Command::new(&command_line.program)
            .args(&command_line.args)
            .current_dir(&command_line.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                WORKER_RUNS
                    .with_label_values(&[service.as_str(), "spawn_error"])
                    .inc();
                WorkerError::SpawnFailed {
                    program: command_line.program.clone(),
                    source: e,
                }
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = match self.timeout_for(request) {
            Some(limit) => match timeout(limit, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(service = %service, mode, "Worker timed out after {:?}", limit);
                    WORKER_RUNS
                        .with_label_values(&[service.as_str(), "timeout"])
                        .inc();
                    return Err(WorkerError::Timeout {
                        timeout_secs: limit.as_secs(),
                    });
                }
            },
            None => child.wait_with_output().await?,
        };

        let elapsed = started.elapsed();
        WORKER_DURATION
            .with_label_values(&[service.as_str(), mode])
            .observe(elapsed.as_secs_f64());

        let result = WorkerOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };

        WORKER_RUNS
            .with_label_values(&[
                service.as_str(),
                if result.success { "success" } else { "failure" },
            ])
            .inc();

        info!(
            service = %service,
            mode,
            exit_code = ?result.exit_code,
            elapsed_ms = elapsed.as_millis() as u64,
            "Worker finished"
        );
        if !result.stdout.trim().is_empty() {
            debug!(service = %service, stdout = %shorten(&result.stdout, LOG_EXCERPT_CHARS), "Worker stdout");
        }
        if !result.stderr.trim().is_empty() {
            let level_warn = !result.success;
            let excerpt = shorten(&result.stderr, LOG_EXCERPT_CHARS);
            if level_warn {
                warn!(service = %service, stderr = %excerpt, "Worker stderr");
            } else {
                debug!(service = %service, stderr = %excerpt, "Worker stderr");
            }
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "conda"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::worker::BackgroundColor;

    fn invoker() -> CondaWorkerInvoker {
        CondaWorkerInvoker::new(
            RuntimeConfig::default(),
            ServicesConfig {
                gfpgan: ServiceConfig::new("/srv/gfpgan", "GFPGAN"),
                rembg: ServiceConfig::new("/srv/rembg", "BACKGROUND-REMOVAL"),
            },
            Duration::from_secs(300),
        )
    }

    #[test]
    fn test_batch_command_line() {
        let cmd = invoker().command_line(
            ServiceKind::Gfpgan,
            &WorkerRequest::Batch {
                ticket: "T1".to_string(),
            },
        );
        assert_eq!(cmd.program, PathBuf::from("conda"));
        assert_eq!(
            cmd.args,
            vec!["run", "-n", "GFPGAN", "python", "bucle.py", "--ticket=T1"]
        );
        assert_eq!(cmd.working_dir, PathBuf::from("/srv/gfpgan"));
    }

    #[test]
    fn test_photo_command_line_with_background() {
        let cmd = invoker().command_line(
            ServiceKind::Rembg,
            &WorkerRequest::Photo {
                filename: "abc.png".to_string(),
                background: Some(BackgroundColor::Rgba {
                    r: 255,
                    g: 0,
                    b: 0,
                    a: 128,
                }),
            },
        );
        assert_eq!(
            cmd.args,
            vec![
                "run",
                "-n",
                "BACKGROUND-REMOVAL",
                "python",
                "script.py",
                "--filename=abc.png",
                "--bg_color=255,0,0,128"
            ]
        );
    }

    #[test]
    fn test_photo_background_defaults_to_transparent() {
        let cmd = invoker().command_line(
            ServiceKind::Rembg,
            &WorkerRequest::Photo {
                filename: "abc.png".to_string(),
                background: None,
            },
        );
        assert_eq!(cmd.args.last().unwrap(), "--bg_color=transparent");
    }

    #[test]
    fn test_face_restoration_ignores_background() {
        let cmd = invoker().command_line(
            ServiceKind::Gfpgan,
            &WorkerRequest::Photo {
                filename: "abc.jpg".to_string(),
                background: Some(BackgroundColor::Transparent),
            },
        );
        assert!(!cmd.args.iter().any(|a| a.starts_with("--bg_color")));
    }

    #[test]
    fn test_launcher_args_come_first() {
        let mut runtime = RuntimeConfig::default();
        runtime.launcher = PathBuf::from("sh");
        runtime.launcher_args = vec!["/opt/fake-conda.sh".to_string()];
        let invoker = CondaWorkerInvoker::new(
            runtime,
            ServicesConfig::default(),
            Duration::from_secs(1),
        );
        let cmd = invoker.command_line(
            ServiceKind::Gfpgan,
            &WorkerRequest::Batch {
                ticket: "T".to_string(),
            },
        );
        assert_eq!(cmd.program, PathBuf::from("sh"));
        assert_eq!(cmd.args[0], "/opt/fake-conda.sh");
        assert_eq!(cmd.args[1], "run");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut runtime = RuntimeConfig::default();
        runtime.launcher = PathBuf::from("/nonexistent/launcher");
        let services = ServicesConfig {
            gfpgan: ServiceConfig::new(temp.path(), "GFPGAN"),
            rembg: ServiceConfig::new(temp.path(), "BG"),
        };
        let invoker = CondaWorkerInvoker::new(runtime, services, Duration::from_secs(1));

        let result = invoker
            .run(
                ServiceKind::Gfpgan,
                &WorkerRequest::Batch {
                    ticket: "T".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(WorkerError::SpawnFailed { .. })));
    }

    #[cfg(unix)]
    fn script_invoker(root: &std::path::Path, script: &str, timeout: Duration) -> CondaWorkerInvoker {
        let script_path = root.join("fake-conda.sh");
        std::fs::write(&script_path, script).unwrap();
        let runtime = RuntimeConfig {
            launcher: PathBuf::from("sh"),
            launcher_args: vec![script_path.display().to_string()],
            ..RuntimeConfig::default()
        };
        let services = ServicesConfig {
            gfpgan: ServiceConfig::new(root, "GFPGAN"),
            rembg: ServiceConfig::new(root, "BG"),
        };
        CondaWorkerInvoker::new(runtime, services, timeout)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_streams_and_exit_code() {
        let temp = tempfile::TempDir::new().unwrap();
        let invoker = script_invoker(
            temp.path(),
            "echo \"env=$3 arg=$6\"\necho oops >&2\nexit 4\n",
            Duration::from_secs(5),
        );

        let output = invoker
            .run(
                ServiceKind::Gfpgan,
                &WorkerRequest::Batch {
                    ticket: "T9".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(!output.success);
        assert_eq!(output.exit_code, Some(4));
        assert_eq!(output.stdout.trim(), "env=GFPGAN arg=--ticket=T9");
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_photo_mode_times_out() {
        let temp = tempfile::TempDir::new().unwrap();
        let invoker = script_invoker(temp.path(), "sleep 5\n", Duration::from_millis(200));

        let started = Instant::now();
        let result = invoker
            .run(
                ServiceKind::Gfpgan,
                &WorkerRequest::Photo {
                    filename: "a.png".to_string(),
                    background: None,
                },
            )
            .await;

        assert!(matches!(result, Err(WorkerError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
