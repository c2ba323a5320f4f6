//! Plain-text record of one export, written beside the output package.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::writer::WriteReport;

pub fn run_log_file_name(at: DateTime<Local>) -> String {
    format!("run_log_{}.txt", at.format("%Y%m%d_%H%M%S"))
}

/// Directory the run log goes into: the one holding the output package.
pub fn run_log_dir(output: &Path) -> &Path {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[derive(Debug, Clone)]
pub struct RunLog {
    started: DateTime<Local>,
    lines: Vec<String>,
}

impl RunLog {
    pub fn new(started: DateTime<Local>) -> Self {
        Self {
            started,
            lines: Vec::new(),
        }
    }

    pub fn started(&self) -> DateTime<Local> {
        self.started
    }

    pub fn line(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    pub fn count(&mut self, what: &str, n: usize) {
        self.lines.push(format!("{what}: {n}"));
    }

    pub fn report(&mut self, report: &WriteReport) {
        for o in &report.outcomes {
            self.lines.push(format!(
                "layer '{}' [{}] {} features: {}",
                o.name,
                o.role.label(),
                o.feature_count,
                o.status
            ));
        }
    }

    pub fn render(&self) -> String {
        let mut out = format!("run started {}\n", self.started.format("%Y-%m-%d %H:%M:%S"));
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Write the log next to `output` and return its path.
    pub fn write_beside(&self, output: &Path) -> io::Result<PathBuf> {
        let dir = run_log_dir(output);
        fs::create_dir_all(dir)?;
        let path = dir.join(run_log_file_name(self.started));
        fs::write(&path, self.render())?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::{RunLog, run_log_dir, run_log_file_name};
    use chrono::{Local, TimeZone};
    use std::path::Path;

    #[test]
    fn file_name_is_timestamped() {
        let at = Local
            .with_ymd_and_hms(2024, 5, 1, 9, 8, 7)
            .single()
            .expect("unambiguous time");
        assert_eq!(run_log_file_name(at), "run_log_20240501_090807.txt");
    }

    #[test]
    fn log_lands_beside_the_package() {
        assert_eq!(run_log_dir(Path::new("out.pkg")), Path::new("."));
        assert_eq!(run_log_dir(Path::new("/tmp/x/out.pkg")), Path::new("/tmp/x"));

        let dir = tempfile::tempdir().expect("tempdir");
        let mut log = RunLog::new(Local::now());
        log.count("photos", 3);
        log.line("done");
        let path = log.write_beside(&dir.path().join("out.pkg")).expect("write");
        assert_eq!(path.parent(), Some(dir.path()));
        let text = std::fs::read_to_string(path).expect("read");
        assert!(text.contains("photos: 3\ndone\n"));
    }
}
