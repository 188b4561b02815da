//! Command implementations.

mod discover;
mod resolve;
mod run;

pub use discover::cmd_discover;
pub use resolve::cmd_resolve;
pub use run::cmd_run;
