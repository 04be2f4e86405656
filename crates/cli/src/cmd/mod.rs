mod build;
mod inspect;
mod list;

pub use build::{BuildArgs, cmd_build};
pub use inspect::{InspectArgs, cmd_inspect};
pub use list::cmd_list;
