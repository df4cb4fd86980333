#![allow(dead_code)]

use flowloom::runtime::{Execution, ExecutionStatus, NodeExecutionLog, NodeRunStatus};

pub fn assert_status(execution: &Execution, expected: ExecutionStatus) {
    assert_eq!(
        execution.status, expected,
        "expected status {expected}, got {} (error: {:?})",
        execution.status, execution.error_message
    );
}

/// Compare the trace against `(node_id, status)` pairs in order.
pub fn assert_trace(logs: &[NodeExecutionLog], expected: &[(&str, NodeRunStatus)]) {
    let got: Vec<(&str, NodeRunStatus)> = logs
        .iter()
        .map(|log| (log.node_id.as_str(), log.status))
        .collect();
    assert_eq!(got, expected, "unexpected trace; full logs: {logs:#?}");
}

pub fn assert_errors_contain(errors: &[String], needle: &str) {
    assert!(
        errors.iter().any(|e| e.contains(needle)),
        "expected an error containing '{needle}', got: {errors:#?}"
    );
}

pub fn assert_no_error_containing(errors: &[String], needle: &str) {
    assert!(
        !errors.iter().any(|e| e.contains(needle)),
        "expected no error containing '{needle}', got: {errors:#?}"
    );
}
