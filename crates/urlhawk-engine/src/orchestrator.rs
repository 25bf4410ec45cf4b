//! Scan orchestration: normalize → one deadline → fan out over the
//! registry → fan in → inject the target URL.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use urlhawk_core::config::{HawkConfig, ScanConfig};
use urlhawk_core::{normalize, Outcome, ScanResult};

use crate::deadline::Deadline;
use crate::error::{EngineError, Result};
use crate::fanout::{FanOut, TaskOutcome};
use crate::probe::{NetClients, ProbeContext};
use crate::probes;
use crate::registry::Registry;

/// Runs every registered probe against a target concurrently and merges the
/// outcomes.
pub struct Orchestrator {
    registry: Arc<Registry>,
    net: Arc<NetClients>,
    config: ScanConfig,
}

impl Orchestrator {
    pub fn new(registry: Arc<Registry>, net: Arc<NetClients>, config: ScanConfig) -> Self {
        Self {
            registry,
            net,
            config,
        }
    }

    /// Build the built-in probe set and shared clients from configuration.
    pub fn from_config(config: &HawkConfig) -> Result<Self> {
        let registry = probes::builtin_registry()?;
        let net = NetClients::new(config.probes.clone())?;
        Ok(Self::new(Arc::new(registry), Arc::new(net), config.scan.clone()))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan with the configured budget.
    pub async fn scan(&self, raw_url: &str) -> ScanResult {
        self.scan_with(raw_url, self.config.max_duration()).await
    }

    /// Scan with an explicit budget. Always returns one entry per registered
    /// probe.
    pub async fn scan_with(&self, raw_url: &str, max_duration: Duration) -> ScanResult {
        self.dispatch(self.registry.names(), raw_url, max_duration).await
    }

    /// Run a single named probe with the configured budget.
    pub async fn run_probe(&self, name: &str, raw_url: &str) -> Result<Outcome> {
        self.run_probe_with(name, raw_url, self.config.max_duration())
            .await
    }

    /// Run a single named probe in isolation, through the same fault
    /// boundary and deadline handling as a full scan.
    pub async fn run_probe_with(
        &self,
        name: &str,
        raw_url: &str,
        max_duration: Duration,
    ) -> Result<Outcome> {
        if self.registry.lookup(name).is_none() {
            return Err(EngineError::UnknownProbe {
                name: name.to_string(),
            });
        }

        let mut result = self
            .dispatch(vec![name.to_string()], raw_url, max_duration)
            .await;
        result
            .outcomes
            .remove(name)
            .ok_or_else(|| EngineError::UnknownProbe {
                name: name.to_string(),
            })
    }

    async fn dispatch(
        &self,
        names: Vec<String>,
        raw_url: &str,
        max_duration: Duration,
    ) -> ScanResult {
        let scan_id = Uuid::new_v4();
        let start = Instant::now();
        let target = normalize(raw_url);

        // Dropping the guard at the end of the scan cancels the deadline for
        // any probe still running detached.
        let (deadline, _guard) = Deadline::after(max_duration);

        tracing::info!(
            scan_id = %scan_id,
            target = %target,
            probes = names.len(),
            budget_ms = max_duration.as_millis() as u64,
            "Starting scan"
        );

        let mut fan_out = FanOut::new(deadline.clone()).with_limit(self.config.max_concurrent_probes);
        if self.config.enforce_deadline {
            fan_out = fan_out.with_hard_bound(self.config.deadline_grace());
        }

        let ctx = ProbeContext::new(deadline, Arc::clone(&self.net));
        let registry = Arc::clone(&self.registry);

        let settled = fan_out
            .run(names, |name: String| {
                let descriptor = registry.lookup(&name).cloned();
                let ctx = ctx.clone();
                let target = target.clone();
                async move {
                    let started = Instant::now();
                    let outcome = match descriptor {
                        Some(d) => d.probe.execute(ctx, target).await,
                        None => Outcome::error("Probe not registered"),
                    };
                    tracing::debug!(
                        probe = %name,
                        outcome = outcome.tag(),
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Probe finished"
                    );
                    outcome
                }
            })
            .await;

        let outcomes: BTreeMap<String, Outcome> = settled
            .into_iter()
            .map(|(name, task)| {
                let outcome = settle(&scan_id, &name, task);
                (name, outcome)
            })
            .collect();

        let result = ScanResult::new(target, outcomes);

        tracing::info!(
            scan_id = %scan_id,
            target = %result.url,
            probes = result.len(),
            errors = result.error_count(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Scan complete"
        );

        result
    }
}

/// Convert a fan-out result into the probe's outcome entry.
fn settle(scan_id: &Uuid, name: &str, task: TaskOutcome<Outcome>) -> Outcome {
    match task {
        TaskOutcome::Completed(outcome) => outcome,
        TaskOutcome::Faulted(detail) => {
            tracing::error!(scan_id = %scan_id, probe = %name, detail = %detail, "Probe panicked");
            Outcome::error(format!("Plugin execution crashed: {detail}"))
        }
        TaskOutcome::TimedOut => {
            tracing::warn!(scan_id = %scan_id, probe = %name, "Probe still running at hard deadline");
            Outcome::error("timed out")
        }
    }
}
