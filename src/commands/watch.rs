use crate::WatchContext;
use crate::changelog::{ChangeLog, EventSink};
use crate::monitor::{LoopExit, Monitor, MonitorError, Supervisor};
use crate::output;
use anyhow::{Context, Result};
use std::io::{self, BufRead};
use std::path::Path;
use std::time::Duration;

/// One line of the control protocol read from stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Start the loop if it is not running.
    Start,
    /// Stop the loop if it is running.
    Stop,
    /// Run a cycle now.
    Scan,
    /// Report whether the loop is running.
    Status,
    /// Stop the loop and exit.
    Quit,
}

impl std::str::FromStr for Control {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "scan" => Ok(Self::Scan),
            "status" => Ok(Self::Status),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(anyhow::anyhow!(
                "Unknown command '{other}' (expected start, stop, scan, status or quit)"
            )),
        }
    }
}

/// Watch `root` until stdin says `quit` or is closed.
///
/// # Errors
///
/// Returns an error if:
/// - The root does not exist or is not a directory
/// - Another monitor holds the root's lock
/// - The interval is zero
pub fn execute(ctx: &WatchContext, root: &Path, interval: Option<u64>) -> Result<()> {
    let interval = match interval {
        Some(0) => anyhow::bail!("Scan interval must be at least 1 second"),
        Some(secs) => Duration::from_secs(secs),
        None => ctx.interval(),
    };

    let options = ctx.monitor_options();
    let monitor = Monitor::new(root, &options)?;
    let log_path = monitor.log_path().to_path_buf();
    let mut supervisor = Supervisor::new(monitor.root().to_path_buf(), options);

    let stdin = io::stdin();
    run_session(&mut supervisor, interval, &log_path, stdin.lock())
}

fn log_sink(log_path: &Path) -> Box<dyn EventSink> {
    Box::new(ChangeLog::new(log_path.to_path_buf()).with_echo(true))
}

/// Start the loop, then serve control lines from `input` until quit or EOF.
///
/// # Errors
///
/// Returns an error if the loop cannot be started the first time or `input`
/// cannot be read.
pub fn run_session<R: BufRead>(
    supervisor: &mut Supervisor,
    interval: Duration,
    log_path: &Path,
    input: R,
) -> Result<()> {
    supervisor.start(interval, log_sink(log_path))?;
    output::info(&format!(
        "Watching every {}; type start, stop, scan, status or quit",
        humantime::format_duration(interval)
    ));

    for line in input.lines() {
        let line = line.context("Failed to read control input")?;
        if line.trim().is_empty() {
            continue;
        }
        report_ended_loop(supervisor);

        let control = match line.parse::<Control>() {
            Ok(control) => control,
            Err(e) => {
                output::warning(&e.to_string());
                continue;
            }
        };
        if control == Control::Quit {
            break;
        }
        handle(supervisor, control, interval, log_path);
    }

    if supervisor.is_running() {
        supervisor.stop()?;
    }
    report_ended_loop(supervisor);
    Ok(())
}

fn handle(supervisor: &mut Supervisor, control: Control, interval: Duration, log_path: &Path) {
    match control {
        Control::Start => match supervisor.start(interval, log_sink(log_path)) {
            Ok(()) => output::success("Monitoring started"),
            Err(e @ MonitorError::AlreadyRunning { .. }) => output::warning(&e.to_string()),
            Err(e) => output::error(&e.to_string()),
        },
        Control::Stop => match supervisor.stop() {
            Ok(LoopExit::Stopped) => output::success("Monitoring stopped"),
            Ok(LoopExit::Failed(reason)) => output::error(&format!("Monitor failed: {reason}")),
            Err(e) => output::warning(&e.to_string()),
        },
        Control::Scan => {
            let running = supervisor.is_running();
            let mut sink = log_sink(log_path);
            match supervisor.scan_now(&mut sink) {
                Ok(_) if running => output::info("Scan requested"),
                Ok(changes) => output::info(&format!("Scan complete, {} changes", changes.len())),
                Err(e) => output::error(&e.to_string()),
            }
        }
        Control::Status => {
            if supervisor.is_running() {
                output::info("Monitoring is running");
            } else {
                output::info("Monitoring is stopped");
            }
        }
        Control::Quit => {}
    }
}

fn report_ended_loop(supervisor: &mut Supervisor) {
    if let Some(LoopExit::Failed(reason)) = supervisor.reap() {
        output::error(&format!("Monitoring ended: {reason}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::MonitorOptions;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn test_control_parse() {
        assert_eq!("stop".parse::<Control>().unwrap(), Control::Stop);
        assert_eq!(" START \n".parse::<Control>().unwrap(), Control::Start);
        assert_eq!("exit".parse::<Control>().unwrap(), Control::Quit);
        assert!("pause".parse::<Control>().is_err());
    }

    #[test]
    fn test_session_runs_and_quits() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path().canonicalize()?;
        std::fs::write(root.join("a.txt"), "hi")?;
        let log = root.join("log.txt");
        let mut supervisor = Supervisor::new(root.clone(), MonitorOptions::default());

        let input = Cursor::new("status\nbogus\nstop\nstop\nscan\nstart\nquit\n");
        run_session(&mut supervisor, Duration::from_secs(3600), &log, input)?;

        assert!(!supervisor.is_running());
        let text = std::fs::read_to_string(&log)?;
        assert!(text.contains("File CREATED: "));
        assert!(text.contains("first scan complete. Monitoring started..."));
        assert!(text.contains("Monitor stopped"));
        Ok(())
    }

    #[test]
    fn test_session_eof_stops_loop() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path().canonicalize()?;
        let mut supervisor = Supervisor::new(root.clone(), MonitorOptions::default());

        run_session(
            &mut supervisor,
            Duration::from_secs(3600),
            &root.join("log.txt"),
            Cursor::new(""),
        )?;

        assert!(!supervisor.is_running());
        assert!(!root.join(crate::LOCK_FILE).exists());
        Ok(())
    }
}
