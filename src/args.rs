use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "Challenge lifecycle and progress scoring service")]
pub struct Cli {
    /// Listen port (overrides SERVER_API_PORT)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    /// Run the HTTP API and the periodic expiry sweeper
    #[default]
    Serve,

    /// Run a single expiry sweep and exit
    Sweep,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or_default()
    }
}

pub fn parse_cli_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let cli = Cli::parse_from(["challenge-server"]);
        assert_eq!(cli.command(), Command::Serve);
        assert_eq!(cli.port, None);

        let cli = Cli::parse_from(["challenge-server", "sweep"]);
        assert_eq!(cli.command(), Command::Sweep);

        let cli = Cli::parse_from(["challenge-server", "serve", "--port", "8080"]);
        assert_eq!(cli.port, Some(8080));
    }
}
