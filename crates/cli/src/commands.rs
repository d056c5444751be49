//! Clap command tree for the administrative CLI.

use clap::{Arg, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("laser-cli")
        .about("Minimal administrative CLI for a Laser node")
        .subcommand_required(true)
        .subcommand(
            Command::new("shards")
                .about("List leader/follower shards from a cluster assignment document")
                .arg(Arg::new("assignment").long("assignment").help("Path to a ClusterAssignment JSON document").required(true)),
        )
        .subcommand(
            Command::new("config")
                .about("Inspect or create node configuration documents")
                .subcommand_required(true)
                .subcommand(
                    Command::new("init")
                        .about("Write a placeholder NodeConfig/TableConfigList/TrafficRestrictionConfig document")
                        .arg(Arg::new("path").long("path").help("Destination file").required(true)),
                )
                .subcommand(
                    Command::new("show")
                        .about("Print a config document as tables")
                        .arg(Arg::new("path").long("path").help("Path to a config document").required(true)),
                ),
        )
}
