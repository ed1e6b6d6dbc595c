//! Step-by-step connection self-test.

use serde::Serialize;
use skycooker_core::Error;
use skycooker_transport::Transport;
use std::fmt;
use tracing::{Instrument, info, warn};

use crate::connection::LinkState;
use crate::cooker::Cooker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfTestStep {
    Connect,
    Authenticate,
    Firmware,
    Status,
}

impl SelfTestStep {
    pub const ALL: [SelfTestStep; 4] = [
        SelfTestStep::Connect,
        SelfTestStep::Authenticate,
        SelfTestStep::Firmware,
        SelfTestStep::Status,
    ];
}

impl fmt::Display for SelfTestStep {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            SelfTestStep::Connect => "connect",
            SelfTestStep::Authenticate => "authenticate",
            SelfTestStep::Firmware => "firmware",
            SelfTestStep::Status => "status",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: SelfTestStep,
    pub status: StepStatus,
    pub details: String,
}

/// Outcome of [`Cooker::self_test`], one entry per step in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelfTestReport {
    pub address: String,
    pub steps: Vec<StepReport>,
}

impl SelfTestReport {
    /// Every step passed.
    pub fn passed(&self) -> bool {
        self.steps.iter().all(|step| step.status == StepStatus::Pass)
    }

    pub fn step(&self, step: SelfTestStep) -> Option<&StepReport> {
        self.steps.iter().find(|report| report.step == step)
    }
}

impl<T: Transport> Cooker<T> {
    /// Walk through connect, authenticate, firmware and status, reporting
    /// each step.
    ///
    /// After the first failure the remaining steps are skipped. The link is
    /// left open only in persistent mode.
    pub async fn self_test(&self) -> SelfTestReport {
        let span = self.span().clone();
        async {
            let mut inner = self.lock().await;
            let mut steps = Vec::with_capacity(SelfTestStep::ALL.len());
            let mut failed = false;

            for step in SelfTestStep::ALL {
                if failed {
                    steps.push(StepReport {
                        step,
                        status: StepStatus::Skipped,
                        details: "previous step failed".into(),
                    });
                    continue;
                }

                let connection = &mut inner.connection;
                let outcome: Result<String, Error> = match step {
                    SelfTestStep::Connect => {
                        if connection.state() == LinkState::Disposed {
                            Err(Error::Disposed)
                        } else {
                            if connection.is_connected() && !connection.is_authenticated() {
                                connection.disconnect().await;
                            }
                            if connection.is_connected() {
                                Ok("already connected".into())
                            } else {
                                connection
                                    .connect()
                                    .await
                                    .map(|()| format!("connected to {}", connection.address()))
                            }
                        }
                    }
                    SelfTestStep::Authenticate => {
                        if connection.is_authenticated() {
                            Ok("already authenticated".into())
                        } else {
                            connection.authenticate().await.map(|()| "key accepted".into())
                        }
                    }
                    SelfTestStep::Firmware => connection
                        .fetch_version()
                        .await
                        .map(|version| format!("firmware {version}")),
                    SelfTestStep::Status => match connection.fetch_status().await {
                        Ok(state) => {
                            let details = format!(
                                "{} {} {} °C",
                                state.status, state.mode, state.temperature
                            );
                            inner.state = Some(state);
                            Ok(details)
                        }
                        Err(error) => Err(error),
                    },
                };

                match outcome {
                    Ok(details) => {
                        info!(step = %step, details = %details, "Self-test step passed");
                        steps.push(StepReport {
                            step,
                            status: StepStatus::Pass,
                            details,
                        });
                    }
                    Err(error) => {
                        warn!(step = %step, error = %error, "Self-test step failed");
                        failed = true;
                        steps.push(StepReport {
                            step,
                            status: StepStatus::Fail,
                            details: error.to_string(),
                        });
                    }
                }
            }

            if failed || !self.is_persistent() {
                inner.connection.disconnect().await;
            }
            self.publish(&inner);

            SelfTestReport {
                address: inner.connection.address().to_string(),
                steps,
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(statuses: &[StepStatus]) -> SelfTestReport {
        SelfTestReport {
            address: "AA".into(),
            steps: SelfTestStep::ALL
                .iter()
                .zip(statuses)
                .map(|(step, status)| StepReport {
                    step: *step,
                    status: *status,
                    details: String::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_passed_requires_every_step() {
        use StepStatus::*;
        assert!(report(&[Pass, Pass, Pass, Pass]).passed());
        assert!(!report(&[Pass, Fail, Skipped, Skipped]).passed());
    }

    #[test]
    fn test_step_lookup() {
        let report = report(&[StepStatus::Pass, StepStatus::Fail]);
        assert_eq!(
            report.step(SelfTestStep::Authenticate).map(|s| s.status),
            Some(StepStatus::Fail)
        );
        assert!(report.step(SelfTestStep::Status).is_none());
    }

    #[test]
    fn test_report_serializes() {
        let json = serde_json::to_value(report(&[StepStatus::Pass])).unwrap();
        assert_eq!(json["steps"][0]["step"], "connect");
        assert_eq!(json["steps"][0]["status"], "pass");
    }
}
