//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p grid_server -- [--addr 127.0.0.1:40000] [--players 4] [--seed 7] [--config game.json]
//!
//! The server seats the first connections as players, applies their commands
//! and broadcasts the full match state after every change.
//!
//! Console commands:
//!   status   - Show match and seat status
//!   restart  - Start a fresh match now
//!   quit     - Shutdown server

use std::env;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use grid_server::server::GameServer;
use grid_shared::config::{GameConfig, RuleSet};
use tokio::sync::mpsc;
use tracing::info;

fn parse_args() -> anyhow::Result<GameConfig> {
    let args: Vec<String> = env::args().collect();

    // The config file is the base layer; flags override it.
    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = args.get(i + 1).context("--config needs a path")?;
            GameConfig::from_json_file(&PathBuf::from(path))?
        }
        None => GameConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--players" if i + 1 < args.len() => {
                let players: u8 = args[i + 1].parse().context("parse --players")?;
                cfg.rules = RuleSet::for_players(players);
                i += 2;
            }
            "--seed" if i + 1 < args.len() => {
                cfg.seed = Some(args[i + 1].parse().context("parse --seed")?);
                i += 2;
            }
            _ => i += 1,
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    info!(addr = %cfg.server_addr, players = cfg.rules.players, "Starting server");

    let mut server = GameServer::new(cfg).await.context("create server")?;
    let local = server.local_addr()?;
    info!(%local, "Server listening");

    // Set up console input channel.
    let (console_tx, console_rx) = mpsc::channel::<String>(32);
    server.set_console_input(console_rx);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Server ready. Type 'status' for info, 'restart' for a new match, 'quit' to exit.");
    println!();

    server.run().await
}
