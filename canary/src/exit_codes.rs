//! Stable exit codes for canary CLI commands.

/// Command succeeded; for `canary run`, the test completed.
pub const OK: i32 = 0;
/// Invalid input, configuration, rejected operation, or other local errors.
pub const INVALID: i32 = 1;
/// `canary run` scored the message but the test is not completed.
pub const INCOMPLETE: i32 = 2;
/// The test service was unreachable or returned an unreadable response.
pub const REMOTE: i32 = 3;
