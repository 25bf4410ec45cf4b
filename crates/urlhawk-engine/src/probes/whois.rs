//! WHOIS registration lookup (RFC 3912).
//!
//! The query runs on a blocking thread with socket timeouts from
//! configuration. The probe races it against the scan deadline and walks
//! away on expiry; the thread finishes on its own once its sockets time out.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use async_trait::async_trait;

use urlhawk_core::{FieldValue, Outcome, Target};

use crate::probe::{Probe, ProbeContext};
use crate::probes::invalid_domain;

const IANA_SERVER: &str = "whois.iana.org";
const WHOIS_PORT: u16 = 43;
/// Upper bound on one response; real records are a few KiB.
const MAX_RESPONSE_BYTES: u64 = 64 * 1024;
const LOOKUP_TIMED_OUT: &str = "Lookup timed out";
const PARSE_FAILED: &str = "Failed to parse whois data";

const REGISTRAR_KEYS: [&str; 3] = ["registrar", "registrar name", "sponsoring registrar"];
const CREATED_KEYS: [&str; 5] = [
    "creation date",
    "created",
    "created on",
    "registered on",
    "registration time",
];
const EXPIRES_KEYS: [&str; 6] = [
    "registry expiry date",
    "registrar registration expiration date",
    "expiration date",
    "expiry date",
    "expires",
    "paid-till",
];
const STATUS_KEYS: [&str; 2] = ["domain status", "status"];

pub struct WhoisInfo;

#[async_trait]
impl Probe for WhoisInfo {
    async fn execute(&self, ctx: ProbeContext, target: Target) -> Outcome {
        let domain = target.domain();
        if domain.is_empty() {
            return invalid_domain();
        }

        let server = ctx.settings().whois_server.clone();
        let timeout = ctx.settings().whois_timeout();
        let lookup = tokio::task::spawn_blocking({
            let domain = domain.clone();
            move || lookup(&domain, server.as_deref(), timeout)
        });

        let raw = match ctx.deadline.race(lookup).await {
            Err(_) => return Outcome::error(LOOKUP_TIMED_OUT),
            Ok(Ok(Ok(raw))) => raw,
            Ok(Ok(Err(e))) => {
                tracing::debug!(domain = %domain, error = %e, "WHOIS query failed");
                return Outcome::error(PARSE_FAILED);
            }
            Ok(Err(e)) => {
                tracing::error!(domain = %domain, error = %e, "WHOIS worker failed");
                return Outcome::error(PARSE_FAILED);
            }
        };

        let fields = parse_whois(&raw);
        if fields.is_empty() {
            return Outcome::error(PARSE_FAILED);
        }
        Outcome::KeyValueMap(fields)
    }
}

/// Query `server` directly when configured, otherwise ask IANA and follow
/// its `refer:` pointer to the authoritative server.
fn lookup(domain: &str, server: Option<&str>, timeout: Duration) -> io::Result<String> {
    if let Some(server) = server {
        return query(server, domain, timeout);
    }

    let iana = query(IANA_SERVER, domain, timeout)?;
    match referral(&iana) {
        Some(next) if !next.eq_ignore_ascii_case(IANA_SERVER) => query(&next, domain, timeout),
        _ => Ok(iana),
    }
}

fn query(server: &str, domain: &str, timeout: Duration) -> io::Result<String> {
    let addr = server_addr(server)?;
    let mut stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    stream.write_all(format!("{domain}\r\n").as_bytes())?;

    let mut buf = Vec::new();
    stream.take(MAX_RESPONSE_BYTES).read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Accepts `host` (port 43) or `host:port`.
fn server_addr(server: &str) -> io::Result<SocketAddr> {
    let has_port = server
        .rsplit_once(':')
        .is_some_and(|(_, port)| port.parse::<u16>().is_ok());
    let mut addrs = if has_port {
        server.to_socket_addrs()?
    } else {
        (server, WHOIS_PORT).to_socket_addrs()?
    };
    addrs.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, format!("no address for {server}"))
    })
}

fn referral(response: &str) -> Option<String> {
    fields(response)
        .find(|(key, _)| key == "refer" || key == "whois")
        .map(|(_, value)| value.to_string())
}

/// `key: value` pairs with lowercased keys, skipping comments and blanks.
fn fields(raw: &str) -> impl Iterator<Item = (String, &str)> {
    raw.lines().filter_map(|line| {
        let line = line.trim();
        if line.starts_with('%') || line.starts_with('#') {
            return None;
        }
        let (key, value) = line.split_once(':')?;
        let value = value.trim();
        (!value.is_empty()).then(|| (key.trim().to_lowercase(), value))
    })
}

/// Extract registrar, creation, expiry and status from a WHOIS response.
pub fn parse_whois(raw: &str) -> BTreeMap<String, FieldValue> {
    let mut out = BTreeMap::new();
    let mut statuses: Vec<String> = Vec::new();

    for (key, value) in fields(raw) {
        let slot = if REGISTRAR_KEYS.contains(&key.as_str()) {
            "Registrar"
        } else if CREATED_KEYS.contains(&key.as_str()) {
            "Created"
        } else if EXPIRES_KEYS.contains(&key.as_str()) {
            "Expires"
        } else if STATUS_KEYS.contains(&key.as_str()) {
            // "clientTransferProhibited https://icann.org/epp#..."
            if let Some(status) = value.split_whitespace().next() {
                if !statuses.iter().any(|s| s == status) {
                    statuses.push(status.to_string());
                }
            }
            continue;
        } else {
            continue;
        };
        out.entry(slot.to_string())
            .or_insert_with(|| FieldValue::from(value));
    }

    if !statuses.is_empty() {
        out.insert("Status".to_string(), FieldValue::List(statuses));
    }
    out
}
