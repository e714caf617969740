//! CLI command handlers, one file per command.

mod forget;
mod plan;
mod run;
mod status;

pub use forget::run_forget;
pub use plan::run_plan;
pub use run::run_step;
pub use status::run_status;
