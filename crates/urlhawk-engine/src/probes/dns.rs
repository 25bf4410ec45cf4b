//! DNS record enumeration.

use std::collections::BTreeMap;

use async_trait::async_trait;

use urlhawk_core::{FieldValue, Outcome, Target};

use crate::fanout::{run_concurrently, TaskOutcome};
use crate::probe::{Probe, ProbeContext};
use crate::probes::invalid_domain;

/// Record families queried in parallel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RecordKind {
    Ip,
    Mx,
    Ns,
    Txt,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [Self::Ip, Self::Mx, Self::Ns, Self::Txt];

    pub fn label(self) -> &'static str {
        match self {
            Self::Ip => "A/AAAA",
            Self::Mx => "MX",
            Self::Ns => "NS",
            Self::Txt => "TXT",
        }
    }
}

pub struct DnsRecords;

#[async_trait]
impl Probe for DnsRecords {
    async fn execute(&self, ctx: ProbeContext, target: Target) -> Outcome {
        let domain = target.domain();
        if domain.is_empty() {
            return invalid_domain();
        }

        let lookups = run_concurrently(&ctx.deadline, RecordKind::ALL, |kind| {
            let ctx = ctx.clone();
            let domain = domain.clone();
            async move { ctx.deadline.race(lookup(&ctx, &domain, kind)).await.ok().flatten() }
        })
        .await;

        records_outcome(lookups)
    }
}

/// One list per record kind that resolved. Failed or timed-out kinds are
/// left out, and a domain with no records at all reports `Empty`.
fn records_outcome(
    lookups: BTreeMap<RecordKind, TaskOutcome<Option<Vec<String>>>>,
) -> Outcome {
    Outcome::map(lookups.into_iter().filter_map(|(kind, task)| match task {
        TaskOutcome::Completed(Some(records)) => Some((kind.label(), FieldValue::List(records))),
        _ => None,
    }))
}

/// Records of one kind, or `None` when the lookup failed.
async fn lookup(ctx: &ProbeContext, domain: &str, kind: RecordKind) -> Option<Vec<String>> {
    let resolver = ctx.resolver();
    let records = match kind {
        RecordKind::Ip => resolver
            .lookup_ip(domain)
            .await
            .ok()?
            .iter()
            .map(|ip| ip.to_string())
            .collect(),
        RecordKind::Mx => resolver
            .mx_lookup(domain)
            .await
            .ok()?
            .iter()
            .map(|mx| mx.exchange().to_string())
            .collect(),
        RecordKind::Ns => resolver
            .ns_lookup(domain)
            .await
            .ok()?
            .iter()
            .map(|ns| ns.to_string())
            .collect(),
        RecordKind::Txt => resolver
            .txt_lookup(domain)
            .await
            .ok()?
            .iter()
            .map(|txt| {
                txt.iter()
                    .map(|data| String::from_utf8_lossy(data).into_owned())
                    .collect::<String>()
            })
            .collect(),
    };
    Some(records)
}
