mod net;
mod view;

use std::io::{BufRead, Write};

use anyhow::Context;
use tlt_core::ClientCommand;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::net::NetworkClient;
use crate::view::View;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let username = match std::env::args().nth(1) {
        Some(name) => name,
        None => {
            print!("Username: ");
            std::io::stdout().flush()?;
            let mut name = String::new();
            std::io::stdin().read_line(&mut name)?;
            name.trim().to_string()
        }
    };

    let addr = net::server_addr();
    let mut client = NetworkClient::connect(&addr, &username)
        .await
        .with_context(|| format!("could not connect to {}", addr))?;
    println!("Connected to {}.", addr);
    println!("{}", view::HELP);

    let mut input = spawn_input_reader();
    let mut view = View::new();
    loop {
        tokio::select! {
            msg = client.receiver.recv() => {
                let Some(msg) = msg else {
                    println!("Connection closed.");
                    break;
                };
                for line in view.apply(&msg) {
                    println!("{}", line);
                }
                if view.finished {
                    break;
                }
            }
            line = input.recv() => {
                let Some(line) = line else {
                    client.send(ClientCommand::Quit);
                    break;
                };
                match ClientCommand::parse(&line) {
                    Ok(Some(ClientCommand::Connect { .. })) => println!("Already connected."),
                    Ok(Some(ClientCommand::Quit)) => {
                        client.send(ClientCommand::Quit);
                        break;
                    }
                    Ok(Some(cmd)) => client.send(cmd),
                    Ok(None) => {}
                    Err(e) => println!("{}. {}", e, view::HELP),
                }
            }
        }
    }

    client.shutdown().await;
    Ok(())
}

/// Read stdin on a plain thread so a blocked read never holds up exit.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
