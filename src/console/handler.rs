/// A line typed at the `run` console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Subscribe(String),
    Unsubscribe(String),
    Refresh,
    Topics,
    Articles(Vec<String>),
    Clear(Vec<String>),
    Help,
    Quit,
}

/// Parse one console line. Topics may contain spaces, so lists of topics are
/// comma-separated. Returns `None` for blank or unrecognised input.
pub fn parse_command(line: &str) -> Option<ConsoleCommand> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_ascii_lowercase().as_str() {
        "subscribe" | "sub" if !rest.is_empty() => Some(ConsoleCommand::Subscribe(rest.to_string())),
        "unsubscribe" | "unsub" if !rest.is_empty() => {
            Some(ConsoleCommand::Unsubscribe(rest.to_string()))
        }
        "refresh" | "r" => Some(ConsoleCommand::Refresh),
        "topics" | "t" => Some(ConsoleCommand::Topics),
        "articles" | "a" => Some(ConsoleCommand::Articles(topic_list(rest))),
        "clear" => Some(ConsoleCommand::Clear(topic_list(rest))),
        "help" | "?" => Some(ConsoleCommand::Help),
        "quit" | "q" | "exit" => Some(ConsoleCommand::Quit),
        _ => None,
    }
}

fn topic_list(rest: &str) -> Vec<String> {
    rest.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub const HELP: &str = "\
Commands:
  subscribe <topic>        subscribe and fetch articles in the background
  unsubscribe <topic>      unsubscribe and drop cached articles
  refresh                  sync all subscriptions now
  topics                   list subscriptions
  articles [t1, t2, ...]   show cached articles (all topics by default)
  clear [t1, t2, ...]      drop cached articles, keep subscriptions
  quit                     stop and exit";
