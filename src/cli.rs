use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "vcluster")]
#[command(version)]
#[command(about = "Read cluster files and provision the switches and VMs they declare", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Answer yes to range mapping and destroy confirmations
    #[arg(short, long, global = true, env = "VCLUSTER_YES")]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Read and validate a cluster file
    Check(FileArgs),

    /// Print the resolved switches and VMs
    Show(ShowArgs),

    /// Print the ordered provisioning plan
    Plan(PlanArgs),

    /// Build the plan and run it
    Apply(ApplyArgs),

    /// Print post-provisioning script batches in run order
    Scripts(FileArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Arguments
// ============================================================================

#[derive(Args)]
pub struct FileArgs {
    /// Cluster file path, or a name under the clusters directory
    pub file: String,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Cluster file path, or a name under the clusters directory
    pub file: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Exactly one of --create / --destroy
#[derive(Args, Clone, Copy)]
#[group(required = true, multiple = false)]
pub struct ModeArgs {
    /// Create everything the file declares
    #[arg(long)]
    pub create: bool,

    /// Destroy everything the file declares
    #[arg(long)]
    pub destroy: bool,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Cluster file path, or a name under the clusters directory
    pub file: String,

    #[command(flatten)]
    pub mode: ModeArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Cluster file path, or a name under the clusters directory
    pub file: String,

    #[command(flatten)]
    pub mode: ModeArgs,

    /// Show what would run without submitting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Guest scripts run at once within a batch (defaults to settings)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_requires_mode() {
        assert!(Cli::try_parse_from(["vcluster", "apply", "c.conf"]).is_err());
        assert!(Cli::try_parse_from(["vcluster", "apply", "c.conf", "--create", "--destroy"]).is_err());

        let cli = Cli::try_parse_from(["vcluster", "-vv", "apply", "c.conf", "--destroy", "--dry-run", "--yes"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.yes);
        match cli.command {
            Command::Apply(args) => {
                assert!(args.mode.destroy);
                assert!(!args.mode.create);
                assert!(args.dry_run);
                assert_eq!(args.jobs, None);
            }
            _ => panic!("expected apply"),
        }
    }
}
