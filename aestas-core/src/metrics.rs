// ABOUTME: Metric recording helpers over the `metrics` facade
// ABOUTME: No-ops unless the host installs a recorder (e.g. the Prometheus exporter)

use metrics::{counter, histogram};

pub const REPLIES_TOTAL: &str = "aestas_replies_total";
pub const REPLY_DURATION_SECONDS: &str = "aestas_reply_duration_seconds";
pub const SENDS_TOTAL: &str = "aestas_sends_total";
pub const RECALLS_TOTAL: &str = "aestas_recalls_total";
pub const COMMANDS_TOTAL: &str = "aestas_commands_total";

/// `command` label for names that matched no registered command
pub const UNKNOWN_COMMAND: &str = "unknown";

fn outcome(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

/// Record one model reply attempt and its latency
pub fn record_reply(ok: bool, duration_secs: f64) {
    counter!(REPLIES_TOTAL, "outcome" => outcome(ok)).increment(1);
    histogram!(REPLY_DURATION_SECONDS).record(duration_secs);
}

pub fn record_send(ok: bool) {
    counter!(SENDS_TOTAL, "outcome" => outcome(ok)).increment(1);
}

pub fn record_recall(ok: bool) {
    counter!(RECALLS_TOTAL, "outcome" => outcome(ok)).increment(1);
}

/// Record a command dispatch; `outcome` is "ok" or an error kind
pub fn record_command(command: &str, outcome: &'static str) {
    counter!(COMMANDS_TOTAL, "command" => command.to_string(), "outcome" => outcome).increment(1);
}
