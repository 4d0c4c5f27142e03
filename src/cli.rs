use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "clipshelf", version, about = "Menu-bar clipboard history")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the clipboard and show history in the menu bar.
    Run(RunArgs),
    /// Print the history, newest first.
    List(ListArgs),
    /// Copy a history entry back to the clipboard.
    Copy(CopyArgs),
    /// Delete all history.
    Clear,
}

#[derive(Parser, Debug, Clone, Default)]
pub struct RunArgs {
    /// Maximum entries to keep (0 keeps everything). Saved to the config.
    #[arg(long)]
    pub history_limit: Option<usize>,
    /// Clipboard polling interval in milliseconds. Saved to the config.
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
}

#[derive(Parser, Debug, Clone)]
pub struct ListArgs {
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Parser, Debug, Clone)]
pub struct CopyArgs {
    /// Position in the history, 0 being the newest entry.
    pub index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_invocation_has_no_subcommand() {
        let cli = Cli::parse_from(["clipshelf"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn run_overrides_parse() {
        let cli = Cli::parse_from(["clipshelf", "run", "--history-limit", "50", "--poll-interval-ms", "250"]);
        match cli.command {
            Some(Commands::Run(args)) => {
                assert_eq!(args.history_limit, Some(50));
                assert_eq!(args.poll_interval_ms, Some(250));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn copy_takes_an_index() {
        let cli = Cli::parse_from(["clipshelf", "copy", "3"]);
        assert!(matches!(cli.command, Some(Commands::Copy(CopyArgs { index: 3 }))));
    }
}
