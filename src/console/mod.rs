mod handler;
mod output;
mod signal;

pub use handler::{parse_command, ConsoleCommand, HELP};
pub use output::{print_articles, print_topics};
pub use signal::{run_interruptible, ReloadSignal};
