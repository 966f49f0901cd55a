//! Replays saved inputs against a harness binary, one child process each, and
//! keeps the ones that crash or hang.

use crate::executor::{ExecutionStatus, Executor};
use crate::input::Input;
use crate::oracle::{BugReport, Oracle};
use anyhow::Context;
use log::{debug, info};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct TriageSummary<I: Input> {
    pub executed: usize,
    pub duplicates: usize,
    pub clean: usize,
    pub findings: Vec<BugReport<I>>,
}

impl<I: Input> Default for TriageSummary<I> {
    fn default() -> Self {
        Self {
            executed: 0,
            duplicates: 0,
            clean: 0,
            findings: Vec::new(),
        }
    }
}

pub struct Triage<E, O> {
    executor: E,
    oracle: O,
    artifact_dir: Option<PathBuf>,
    seen: HashSet<[u8; 16]>,
}

impl<E, O> Triage<E, O> {
    pub fn new(executor: E, oracle: O) -> Self {
        Self {
            executor,
            oracle,
            artifact_dir: None,
            seen: HashSet::new(),
        }
    }

    /// Findings are also written to `dir` as `crash-<md5>` or `timeout-<md5>`.
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    /// Replays each distinct input once.
    ///
    /// Stops at the first replay the harness could not even start, since
    /// every later one would fail the same way.
    pub fn run<I>(
        &mut self,
        inputs: impl IntoIterator<Item = I>,
    ) -> Result<TriageSummary<I>, anyhow::Error>
    where
        I: Input,
        E: Executor<I>,
        O: Oracle<I>,
    {
        let mut summary = TriageSummary::default();

        for input in inputs {
            if !self.seen.insert(md5::compute(input.as_bytes()).0) {
                summary.duplicates += 1;
                continue;
            }

            let execution = self.executor.execute_sync(&input);
            summary.executed += 1;
            match &execution.status {
                ExecutionStatus::SetupFailure(reason) => {
                    anyhow::bail!("Harness failed to initialize, not triaging further: {reason}")
                }
                ExecutionStatus::Other(reason) => {
                    anyhow::bail!("Replay could not be carried out: {reason}")
                }
                ExecutionStatus::Ok | ExecutionStatus::Crash(_) | ExecutionStatus::Timeout => {}
            }

            match self
                .oracle
                .examine(&input, &execution.status, Some(&execution.output))
            {
                Some(report) => {
                    info!("{}: {}", report.artifact_name(), report.description);
                    if let Some(dir) = &self.artifact_dir {
                        write_artifact(dir, &report)?;
                    }
                    summary.findings.push(report);
                }
                None => {
                    debug!("{} bytes replayed cleanly", input.len());
                    summary.clean += 1;
                }
            }
        }

        Ok(summary)
    }
}

fn write_artifact<I: Input>(dir: &Path, report: &BugReport<I>) -> Result<PathBuf, anyhow::Error> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create artifact directory {dir:?}"))?;
    let path = dir.join(report.artifact_name());
    fs::write(&path, report.input.as_bytes())
        .with_context(|| format!("Failed to write artifact {path:?}"))?;
    Ok(path)
}

/// Reads every file named directly, plus the files directly inside each
/// named directory, in path order.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<(PathBuf, Vec<u8>)>, anyhow::Error> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            let mut entries = Vec::new();
            for entry in fs::read_dir(path)
                .with_context(|| format!("Failed to read input directory {path:?}"))?
            {
                let file_path = entry?.path();
                if file_path.is_file() {
                    entries.push(file_path);
                }
            }
            entries.sort();
            files.extend(entries);
        } else {
            anyhow::bail!("Input path {path:?} is neither a file nor a directory");
        }
    }

    files
        .into_iter()
        .map(|file| {
            let data =
                fs::read(&file).with_context(|| format!("Failed to read input {file:?}"))?;
            Ok((file, data))
        })
        .collect()
}
