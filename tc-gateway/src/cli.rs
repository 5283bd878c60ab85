use clap::{Parser, Subcommand};
use tc_bridge::types::TcType;

/// TC telemetry gateway.
///
/// Receives TC records from the line controllers, stores them in Postgres and forwards
/// selected record types to downstream consumers.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Runs the gateway until SIGINT or SIGTERM (default).
    Serve,
    #[command(flatten)]
    Query(QueryCommand),
}

/// One-shot commands reading from the durable store.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum QueryCommand {
    /// Prints the newest stored records of one type as JSON.
    Recent {
        /// Record type, by name (`line_speed`) or wire code (`4003`).
        #[arg(long = "type")]
        record_type: TcType,
        /// Maximum number of records, 100 if omitted.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Prints what is stored about a coil as JSON.
    Coil {
        coil_number: String,
        /// Print the stored rows instead of the summary.
        #[arg(long)]
        records: bool,
    },
    /// Connects to Postgres and prints the health and pool state.
    Check,
}

impl Cli {
    pub fn resolved_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        <Cli as CommandFactory>::command().debug_assert();
    }

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["tc-gateway"]).unwrap();
        assert_eq!(cli.resolved_command(), Command::Serve);
    }

    #[test]
    fn recent_accepts_names_and_codes() {
        let cli = Cli::try_parse_from(["tc-gateway", "recent", "--type", "4003", "--limit", "5"])
            .unwrap();
        assert_eq!(
            cli.resolved_command(),
            Command::Query(QueryCommand::Recent {
                record_type: TcType::LineSpeed,
                limit: Some(5),
            })
        );

        let cli = Cli::try_parse_from(["tc-gateway", "recent", "--type", "schedule"]).unwrap();
        assert_eq!(
            cli.resolved_command(),
            Command::Query(QueryCommand::Recent {
                record_type: TcType::Schedule,
                limit: None,
            })
        );

        assert!(Cli::try_parse_from(["tc-gateway", "recent", "--type", "4999"]).is_err());
    }

    #[test]
    fn check_parses() {
        let cli = Cli::try_parse_from(["tc-gateway", "check"]).unwrap();
        assert_eq!(cli.resolved_command(), Command::Query(QueryCommand::Check));
    }

    #[test]
    fn coil_takes_a_positional_number() {
        let cli = Cli::try_parse_from(["tc-gateway", "coil", "C-1001"]).unwrap();
        assert_eq!(
            cli.resolved_command(),
            Command::Query(QueryCommand::Coil {
                coil_number: "C-1001".to_string(),
                records: false,
            })
        );
    }
}
