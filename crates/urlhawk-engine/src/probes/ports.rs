//! TCP connect scan over common service ports.

use async_trait::async_trait;
use tokio::net::TcpStream;

use urlhawk_core::{Outcome, Target};

use crate::fanout::{run_concurrently, TaskOutcome};
use crate::probe::{Probe, ProbeContext};
use crate::probes::invalid_domain;

pub struct OpenPorts;

#[async_trait]
impl Probe for OpenPorts {
    async fn execute(&self, ctx: ProbeContext, target: Target) -> Outcome {
        let domain = target.domain();
        if domain.is_empty() {
            return invalid_domain();
        }

        let per_port = ctx.settings().port_timeout();
        let ports = ctx.settings().ports.clone();

        let scanned = run_concurrently(&ctx.deadline, ports, |port: u16| {
            let deadline = ctx.deadline.child(per_port);
            let domain = domain.clone();
            async move {
                matches!(
                    deadline.race(TcpStream::connect((domain.as_str(), port))).await,
                    Ok(Ok(_))
                )
            }
        })
        .await;

        // BTreeMap keys iterate in ascending port order.
        let open = scanned
            .into_iter()
            .filter(|(_, outcome)| matches!(outcome, TaskOutcome::Completed(true)))
            .map(|(port, _)| port.to_string())
            .collect();

        Outcome::list(open)
    }
}
