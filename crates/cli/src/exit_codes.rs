//! CLI Exit Code Registry
//!
//! Single source of truth for `tgraph` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                                  |
//! |------|----------------------------------------------------------|
//! | 0    | Success                                                  |
//! | 1    | General error (unspecified)                              |
//! | 2    | Usage error (bad arguments)                              |
//! | 3    | Config file unreadable, unparseable or invalid           |
//! | 4    | Record not found for this tenant                         |
//! | 5    | Graph store unavailable or a query failed                |
//! | 6    | `--strict` and at least one record came out HIGH_RISK    |
//!
//! Codes 1 and 2 also come from clap itself on parse failure.

/// Command completed.
pub const EXIT_SUCCESS: u8 = 0;

/// Unspecified failure. Prefer a specific code.
pub const EXIT_ERROR: u8 = 1;

/// Bad arguments.
pub const EXIT_USAGE: u8 = 2;

/// Config file missing, malformed, or failing validation.
pub const EXIT_CONFIG: u8 = 3;

/// `reconcile <id>` named a record the tenant doesn't have.
pub const EXIT_NOT_FOUND: u8 = 4;

/// Store could not be opened, or a read/write failed.
pub const EXIT_STORE: u8 = 5;

/// `--strict` run produced HIGH_RISK verdicts.
pub const EXIT_HIGH_RISK: u8 = 6;
