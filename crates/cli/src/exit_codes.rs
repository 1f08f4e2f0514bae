//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract — scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain    | Description                               |
//! |---------|-----------|-------------------------------------------|
//! | 0       | Universal | Success                                   |
//! | 1       | Universal | General error (unspecified)               |
//! | 2       | Universal | CLI usage error (bad args, missing file)  |
//! | 3-9     | pipeline  | Config and input codes                    |
//! | 10-19   | registry  | Entity registry codes                     |
//! | 20-29   | review    | Review queue codes                        |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Pipeline (3-9)
// =============================================================================

/// Config failed to parse or validate.
pub const EXIT_CONFIG: u8 = 3;

/// Input data could not be loaded (missing file, missing column, value
/// that must parse but does not).
pub const EXIT_INPUT: u8 = 4;

// =============================================================================
// Registry (10-19)
// =============================================================================

/// Registry version conflict persisted through every retry.
pub const EXIT_REGISTRY_CONFLICT: u8 = 10;

/// Registry invariant violated (identity reuse, rewritten history).
/// Never retried.
pub const EXIT_REGISTRY_INVARIANT: u8 = 11;

// =============================================================================
// Review (20-29)
// =============================================================================

/// Review queue unreachable, not authenticated, or a decision wait timed
/// out. Fetch commands always fail with this; submission failures during
/// a run only do so under `--strict-review`, and are warnings otherwise.
pub const EXIT_REVIEW_UNREACHABLE: u8 = 20;
