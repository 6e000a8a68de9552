//! Registry tests.
//!
//! Test organization:
//! - defaults.rs: runtime reconfiguration and environment loading
//! - lookup.rs: lazy creation, naming, overrides and snapshots

mod defaults;
