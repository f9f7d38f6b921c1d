//! Installation runner for model-suggested dependency commands

use std::io;

use tokio::process::Command;
use tracing::{info, warn};

use crate::agent::operator::Operator;
use crate::extract::InstallSet;
use crate::metrics::INSTALL_COMMANDS;

/// Result of a single installation command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Succeeded,
    /// Non-zero exit or spawn failure, with the underlying error
    Failed(String),
}

/// Per-command report for one batch
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    /// Commands that were actually run, in execution order
    pub outcomes: Vec<(String, InstallOutcome)>,
    /// The operator answered "no" and the rest of the batch was skipped
    pub aborted: bool,
}

impl InstallReport {
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|(cmd, outcome)| match outcome {
            InstallOutcome::Failed(reason) => Some((cmd.as_str(), reason.as_str())),
            InstallOutcome::Succeeded => None,
        })
    }
}

/// Runs installation commands through the host shell
#[derive(Debug, Clone)]
pub struct InstallRunner {
    confirm_each: bool,
}

impl InstallRunner {
    pub fn new(confirm_each: bool) -> Self {
        Self { confirm_each }
    }

    /// Run every command in `commands`.
    ///
    /// With confirmation on, a "no" stops the batch without marking anything
    /// failed. A failing command never stops the batch. The only error is the
    /// operator's input going away.
    pub async fn run<O: Operator + ?Sized>(
        &self,
        commands: &InstallSet,
        operator: &mut O,
    ) -> io::Result<InstallReport> {
        let mut report = InstallReport::default();

        for command in commands.iter() {
            if self.confirm_each {
                operator.show(command);
                if !operator.confirm("Execute the install command now?")? {
                    info!(command, "Operator declined install, skipping rest of batch");
                    operator.show("Continuing without the remaining install commands.");
                    report.aborted = true;
                    break;
                }
            }

            let outcome = run_shell(command).await;
            match &outcome {
                InstallOutcome::Succeeded => {
                    info!(command, "Installation succeeded");
                    INSTALL_COMMANDS.with_label_values(&["succeeded"]).inc();
                    operator.show(&format!("Installation successful: {}", command));
                }
                InstallOutcome::Failed(reason) => {
                    warn!(command, reason = %reason, "Installation failed");
                    INSTALL_COMMANDS.with_label_values(&["failed"]).inc();
                    operator.show(&format!(
                        "Installation failed: {}\nError message: {}",
                        command, reason
                    ));
                }
            }
            report.outcomes.push((command.to_string(), outcome));
        }

        Ok(report)
    }
}

async fn run_shell(command: &str) -> InstallOutcome {
    match Command::new("sh").arg("-c").arg(command).status().await {
        Ok(status) if status.success() => InstallOutcome::Succeeded,
        Ok(status) => InstallOutcome::Failed(format!("Command '{}' returned {}", command, status)),
        Err(e) => InstallOutcome::Failed(format!("Failed to start shell: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Answers {
        answers: VecDeque<&'static str>,
        prompts: usize,
    }

    impl Operator for Answers {
        fn show(&mut self, _text: &str) {}

        fn ask(&mut self, _prompt: &str) -> io::Result<String> {
            self.prompts += 1;
            self.answers
                .pop_front()
                .map(str::to_string)
                .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))
        }
    }

    fn answers(list: &[&'static str]) -> Answers {
        Answers {
            answers: list.iter().copied().collect(),
            prompts: 0,
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_batch() {
        // Sorted order: "exit 3" runs before "true"
        let set: InstallSet = ["true", "exit 3"].into_iter().collect();
        let runner = InstallRunner::new(false);
        let mut operator = answers(&[]);

        let report = runner.run(&set, &mut operator).await.unwrap();

        assert!(!report.aborted);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[0].0, "exit 3");
        assert!(matches!(report.outcomes[0].1, InstallOutcome::Failed(_)));
        assert_eq!(report.outcomes[1].1, InstallOutcome::Succeeded);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(operator.prompts, 0);
    }

    #[tokio::test]
    async fn test_no_aborts_remaining_batch() {
        let set: InstallSet = ["true", "true # second"].into_iter().collect();
        let runner = InstallRunner::new(true);
        let mut operator = answers(&["yes", "no"]);

        let report = runner.run(&set, &mut operator).await.unwrap();

        assert!(report.aborted);
        assert_eq!(report.outcomes.len(), 1);
        assert!(report.failures().next().is_none());
    }

    #[tokio::test]
    async fn test_invalid_answer_reprompts_same_command() {
        let set: InstallSet = ["true"].into_iter().collect();
        let runner = InstallRunner::new(true);
        let mut operator = answers(&["maybe", "", "YES"]);

        let report = runner.run(&set, &mut operator).await.unwrap();

        assert_eq!(operator.prompts, 3);
        assert_eq!(report.outcomes, vec![("true".to_string(), InstallOutcome::Succeeded)]);
    }

    #[tokio::test]
    async fn test_closed_input_is_an_error() {
        let set: InstallSet = ["true"].into_iter().collect();
        let runner = InstallRunner::new(true);
        let mut operator = answers(&[]);

        let err = runner.run(&set, &mut operator).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
