//! Error-recovery policy (spec §4.2 "Error-recovery policy"): a pure
//! function of tool name, error code, and consecutive-error count. Kept
//! free of any I/O so it can be exhaustively unit-tested.

use agentbrowse_types::ErrorCode;

const MAX_CONSECUTIVE_ERRORS: u32 = 5;
const BASE_RETRY_DELAY_MS: u64 = 500;
const MAX_RETRY_DELAY_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    Retry { delay_ms: u64 },
    InjectHint(String),
    Abort(String),
}

/// Decides what the agent loop should do after a tool call fails.
/// `consecutive_errors` counts failures in a row, including the one
/// that just happened.
pub fn decide(
    code: ErrorCode,
    tool_name: &str,
    consecutive_errors: u32,
) -> RecoveryAction {
    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
        return RecoveryAction::Abort(format!(
            "{consecutive_errors} consecutive tool errors, giving up on {tool_name}"
        ));
    }

    match code {
        ErrorCode::NavigationTimeout | ErrorCode::PageLoadTimeout => {
            RecoveryAction::Retry {
                delay_ms: backoff_delay(consecutive_errors),
            }
        }
        ErrorCode::ElementNotFound | ErrorCode::InvalidParameter => RecoveryAction::InjectHint(
            format!(
                "the element targeted by `{tool_name}` could not be found; call \
                 get_page_info to refresh the element list before retrying"
            ),
        ),
        ErrorCode::SessionNotFound
        | ErrorCode::TabNotFound
        | ErrorCode::PageCrashed
        | ErrorCode::RunCanceled
        | ErrorCode::RunTimeout => {
            RecoveryAction::Abort(format!("unrecoverable error from {tool_name}: {code}"))
        }
        _ => RecoveryAction::InjectHint(format!("{tool_name} failed: {code}")),
    }
}

fn backoff_delay(consecutive_errors: u32) -> u64 {
    let exp = BASE_RETRY_DELAY_MS.saturating_mul(1u64 << consecutive_errors.min(5));
    exp.min(MAX_RETRY_DELAY_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_retries_with_growing_backoff() {
        let first = decide(ErrorCode::NavigationTimeout, "navigate", 1);
        let second = decide(ErrorCode::NavigationTimeout, "navigate", 2);
        match (first, second) {
            (
                RecoveryAction::Retry { delay_ms: d1 },
                RecoveryAction::Retry { delay_ms: d2 },
            ) => assert!(d2 > d1),
            other => panic!("expected two retries, got {other:?}"),
        }
    }

    #[test]
    fn backoff_is_capped() {
        let action = decide(ErrorCode::NavigationTimeout, "navigate", 4);
        assert_eq!(
            action,
            RecoveryAction::Retry {
                delay_ms: MAX_RETRY_DELAY_MS
            }
        );
    }

    #[test]
    fn element_not_found_injects_hint() {
        let action = decide(ErrorCode::ElementNotFound, "click", 1);
        assert!(matches!(action, RecoveryAction::InjectHint(_)));
    }

    #[test]
    fn session_not_found_aborts() {
        let action = decide(ErrorCode::SessionNotFound, "navigate", 1);
        assert!(matches!(action, RecoveryAction::Abort(_)));
    }

    #[test]
    fn consecutive_cap_forces_abort_even_for_retryable_errors() {
        let action = decide(ErrorCode::NavigationTimeout, "navigate", MAX_CONSECUTIVE_ERRORS);
        assert!(matches!(action, RecoveryAction::Abort(_)));
    }
}
