use std::path::PathBuf;

pub(crate) const HELP: &str = "\
commands:
  add <address>      add a host to the monitored set
  import <file.csv>  upload hosts from a CSV file
  export [file.csv]  write the current table as CSV (stdout by default)
  refresh            ask the server to push the full table
  reload             pull the full table over HTTP
  help               show this help
  quit               stop the dashboard";

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ConsoleCommand {
    Add(String),
    Import(PathBuf),
    Export(Option<PathBuf>),
    Refresh,
    Reload,
    Help,
    Quit,
    Empty,
}

pub(crate) fn parse(line: &str) -> Result<ConsoleCommand, String> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "" => ConsoleCommand::Empty,
        "add" if rest.is_empty() => return Err("usage: add <address>".to_string()),
        "add" => ConsoleCommand::Add(rest.to_string()),
        "import" if rest.is_empty() => return Err("usage: import <file.csv>".to_string()),
        "import" => ConsoleCommand::Import(PathBuf::from(rest)),
        "export" if rest.is_empty() => ConsoleCommand::Export(None),
        "export" => ConsoleCommand::Export(Some(PathBuf::from(rest))),
        "refresh" => ConsoleCommand::Refresh,
        "reload" => ConsoleCommand::Reload,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command: {other} (try help)")),
    };

    Ok(command)
}
