//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p grid_client -- [--addr 127.0.0.1:40000] [--config game.json]
//!   cargo run -p grid_client -- --local [--seed 7]
//!
//! Without `--local` the client takes a seat on the server and redraws the
//! board after every update. With `--local` two players share this terminal.
//!
//! Console commands:
//!   place <row> <col>                  - Place a monster
//!   move <row> <col> <to_row> <to_col> - Move or attack
//!   end                                - End your turn
//!   board                              - Show the board
//!   status                             - Show seats and turn
//!   quit                               - Exit client

use std::env;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use grid_client::{
    client::{ClientState, GameClient},
    render::{render_board, render_status},
    LocalGame,
};
use grid_shared::{config::GameConfig, net::NetMsg};
use tokio::sync::mpsc;
use tracing::info;

struct Args {
    cfg: GameConfig,
    local: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = env::args().collect();

    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = args.get(i + 1).context("--config needs a path")?;
            GameConfig::from_json_file(&PathBuf::from(path))?
        }
        None => GameConfig::default(),
    };
    let mut local = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--seed" if i + 1 < args.len() => {
                cfg.seed = Some(args[i + 1].parse().context("parse --seed")?);
                i += 2;
            }
            "--local" => {
                local = true;
                i += 1;
            }
            _ => i += 1,
        }
    }
    Ok(Args { cfg, local })
}

/// Reads stdin on a plain thread and forwards non-empty lines.
fn spawn_console() -> mpsc::Receiver<String> {
    let (console_tx, console_rx) = mpsc::channel::<String>(32);
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
    console_rx
}

fn print_lines(lines: impl IntoIterator<Item = String>) {
    for line in lines {
        println!("{line}");
    }
}

async fn run_local(cfg: GameConfig) -> anyhow::Result<()> {
    let mut game = LocalGame::new(&cfg);
    let mut console_rx = spawn_console();

    println!("Local duel. Player 1 places on column 0, player 2 on column 9. Type 'help'.");
    print_lines(game.view());

    while let Some(line) = console_rx.recv().await {
        print_lines(game.exec(&line));
        if game.wants_quit() {
            break;
        }
        if game.finished() {
            tokio::time::sleep(game.restart_delay()).await;
            print_lines(game.restart());
        }
    }
    Ok(())
}

async fn run_remote(cfg: GameConfig) -> anyhow::Result<()> {
    let mut client = GameClient::connect_with(&cfg).await.context("connect")?;
    info!(seat = %client.seat, "Connected to server");
    let mut console_rx = spawn_console();

    println!(
        "Connected as {} of {}. Type 'help' for commands, 'quit' to exit.",
        client.seat, client.players
    );
    println!();

    let mut my_turn = false;
    loop {
        tokio::select! {
            Some(line) = console_rx.recv() => {
                match client.exec_console(&line).await {
                    Ok(output) => print_lines(output),
                    Err(e) => println!("Error: {e}"),
                }
            }
            msg = client.recv() => match msg {
                Some(NetMsg::GameState { state }) => {
                    print!("{}", render_board(&state));
                    print_lines(render_status(&state, Some(client.seat)));
                    let now = client.is_my_turn();
                    if now && !my_turn {
                        println!("Your move.");
                    }
                    my_turn = now;
                }
                Some(NetMsg::Error { message }) => println!("Error: {message}"),
                Some(_) => {}
                None => {}
            },
        }

        if client.state == ClientState::Disconnected {
            println!("Disconnected from server.");
            break;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let Args { cfg, local } = parse_args()?;
    if local {
        info!("Starting local hotseat duel");
        run_local(cfg).await
    } else {
        info!(server = %cfg.server_addr, "Starting client");
        run_remote(cfg).await
    }
}
