//! `laser-cli` — minimal administrative CLI for a Laser node (§6 "CLI
//! surface is out of scope ... a minimal administrative CLI lists
//! services, creates placeholder config, and prints tables").

mod commands;
mod placeholder;
mod table;

use std::fs;
use std::path::Path;
use std::process;

use commands::build_cli;
use laser_router::ClusterAssignment;
use placeholder::{placeholder_document, PlaceholderDocument};

fn main() {
    let matches = build_cli().get_matches();

    let exit_code = match matches.subcommand() {
        Some(("shards", sub)) => run_shards(sub.get_one::<String>("assignment").unwrap()),
        Some(("config", sub)) => match sub.subcommand() {
            Some(("init", inner)) => run_config_init(inner.get_one::<String>("path").unwrap()),
            Some(("show", inner)) => run_config_show(inner.get_one::<String>("path").unwrap()),
            _ => unreachable!("subcommand_required(true) on \"config\""),
        },
        _ => unreachable!("subcommand_required(true) on the root command"),
    };

    process::exit(exit_code);
}

fn run_shards(path: &str) -> i32 {
    let contents = match fs::read_to_string(Path::new(path)) {
        Ok(contents) => contents,
        Err(e) => {
            eprintln!("failed to read {path}: {e}");
            return 1;
        }
    };
    let assignment: ClusterAssignment = match serde_json::from_str(&contents) {
        Ok(assignment) => assignment,
        Err(e) => {
            eprintln!("failed to parse {path}: {e}");
            return 1;
        }
    };

    let mut rows = Vec::new();
    for group in &assignment.groups {
        for node in &group.nodes {
            rows.push(vec![
                group.group_name.clone(),
                node.node_id.clone(),
                format!("{:?}", node.leader_shards),
                format!("{:?}", node.follower_shards),
                node.is_edge.to_string(),
            ]);
        }
    }

    println!("cluster: {}  shard_number: {}", assignment.cluster_name, assignment.shard_number);
    print!("{}", table::render(&["group", "node_id", "leader_shards", "follower_shards", "is_edge"], &rows));
    0
}

fn run_config_init(path: &str) -> i32 {
    let document = placeholder_document();
    let json = match serde_json::to_string_pretty(&document) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("failed to serialize placeholder config: {e}");
            return 1;
        }
    };
    match fs::write(path, json) {
        Ok(()) => {
            println!("wrote placeholder config to {path}");
            0
        }
        Err(e) => {
            eprintln!("failed to write {path}: {e}");
            1
        }
    }
}

fn run_config_show(path: &str) -> i32 {
    let contents = match fs::read_to_string(Path::new(path)) {
        Ok(contents) => contents,
        Err(e) => {
            eprintln!("failed to read {path}: {e}");
            return 1;
        }
    };
    let document: PlaceholderDocument = match serde_json::from_str(&contents) {
        Ok(document) => document,
        Err(e) => {
            eprintln!("failed to parse {path}: {e}");
            return 1;
        }
    };

    println!(
        "{}",
        table::render(
            &["setting", "value"],
            &vec![
                vec!["node.version".into(), document.node.version.to_string()],
                vec!["node.block_cache_gb".into(), document.node.block_cache_gb.to_string()],
                vec!["node.write_buffer_gb".into(), document.node.write_buffer_gb.to_string()],
                vec!["tables.version".into(), document.tables.version.to_string()],
                vec!["tables.count".into(), document.tables.tables.len().to_string()],
                vec!["traffic.version".into(), document.traffic.version.to_string()],
                vec!["traffic.deny_all_count".into(), document.traffic.deny_all.len().to_string()],
            ],
        )
    );
    0
}
