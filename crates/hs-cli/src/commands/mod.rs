//! CLI subcommand implementations.

pub mod events;
pub mod import;
pub mod status;
pub mod sync;
pub mod util;
pub mod watch;
