//! Human-readable terminal output for scan results.

use std::fmt::Write;

use colored::*;

use urlhawk_core::{Outcome, ScanResult};

/// Render one scan, one line per probe plus indented fields for mappings.
pub fn render(result: &ScanResult) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "{}", format!("[~] Scanning {}", result.url).blue());

    for (name, outcome) in result.iter() {
        match outcome {
            Outcome::StringList(items) => {
                let line = format!("    [!] {name}: {}", items.join(", "));
                let _ = writeln!(out, "{}", line.yellow());
            }
            Outcome::ErrorMarker { message } => {
                let line = format!("    [x] {name}: blocked ({message})");
                let _ = writeln!(out, "{}", line.red());
            }
            Outcome::Empty => {
                let line = format!("    [-] {name}: nothing found");
                let _ = writeln!(out, "{}", line.dimmed());
            }
            Outcome::KeyValueMap(fields) => {
                let line = format!("    [+] {name}: data found");
                let _ = writeln!(out, "{}", line.green());
                for (key, value) in fields {
                    let _ = writeln!(out, "        {key}: {value}");
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use urlhawk_core::normalize;

    use super::*;

    fn sample() -> ScanResult {
        let mut outcomes = BTreeMap::new();
        outcomes.insert(
            "missing_headers".to_string(),
            Outcome::list(vec!["X-Frame-Options".to_string(), "Content-Security-Policy".to_string()]),
        );
        outcomes.insert("ssl_certificate".to_string(), Outcome::error("No certificates found"));
        outcomes.insert("robots_txt".to_string(), Outcome::Empty);
        outcomes.insert(
            "http_methods".to_string(),
            Outcome::map([("Allowed Methods", "GET, POST")]),
        );
        ScanResult::new(normalize("example.com"), outcomes)
    }

    #[test]
    fn test_render_each_outcome_kind() {
        colored::control::set_override(false);
        let text = render(&sample());

        assert!(text.starts_with("[~] Scanning http://example.com\n"));
        assert!(text.contains("    [!] missing_headers: X-Frame-Options, Content-Security-Policy\n"));
        assert!(text.contains("    [x] ssl_certificate: blocked (No certificates found)\n"));
        assert!(text.contains("    [-] robots_txt: nothing found\n"));
        assert!(text.contains("    [+] http_methods: data found\n        Allowed Methods: GET, POST\n"));
    }

    #[test]
    fn test_render_is_sorted_by_probe() {
        colored::control::set_override(false);
        let text = render(&sample());
        let http = text.find("http_methods").unwrap();
        let ssl = text.find("ssl_certificate").unwrap();
        assert!(http < ssl);
    }
}
