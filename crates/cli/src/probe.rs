//! `floatcov probe`: chat API smoke test.

use std::time::Duration;

use floatcov_chat_client::{run_probe, ChatClient, DEFAULT_MESSAGES};

use crate::exit_codes::EXIT_PROBE_FAILED;
use crate::{print_json, CliError};

pub fn cmd_probe(
    base_url: &str,
    messages: Vec<String>,
    language: &str,
    timeout_secs: u64,
    json: bool,
) -> Result<(), CliError> {
    let client = ChatClient::new(base_url, Duration::from_secs(timeout_secs))
        .map_err(|e| CliError::new(EXIT_PROBE_FAILED, e.to_string()))?;

    let messages = if messages.is_empty() {
        DEFAULT_MESSAGES.iter().map(|m| m.to_string()).collect()
    } else {
        messages
    };

    let report = run_probe(&client, &messages, language);

    if json {
        print_json(&report)?;
    } else {
        match (&report.health, &report.health_error) {
            (Some(h), _) => eprintln!("health: {}", h.status),
            (None, Some(e)) => eprintln!("health: FAIL ({e})"),
            (None, None) => {}
        }
        for q in &report.queries {
            let mark = if q.passed { "PASS" } else { "FAIL" };
            eprintln!("{mark}  {}", q.message);
            if let Some(t) = &q.query_type {
                eprintln!("      query type: {t}");
            }
            if let Some(n) = q.postgres_results_count {
                eprintln!("      results: {n}");
            }
            if let Some(e) = &q.error {
                eprintln!("      {e}");
            }
        }
        eprintln!("{}/{} queries passed", report.passed_count(), report.queries.len());
    }

    if report.passed() {
        Ok(())
    } else {
        Err(CliError::new(EXIT_PROBE_FAILED, format!("probe against {} failed", report.api_base))
            .with_hint("check that the chat service is running and can see the index"))
    }
}
