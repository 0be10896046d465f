// ./client --server stun.cloudflare.com:3478 --peer 203.0.113.5:54321

use std::net::SocketAddr;
use std::process::exit;

use log::{debug, error, info, warn};
use tokio::io::{stdin, AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::watch;

use client::chat;
use client::config::{parse_peer, Config, StunServer};
use client::signal::abort_on_shutdown;
use punch_rs::client::keep_alive;
use punch_rs::{discover, Discovery, PunchOutcome, PunchSession};

async fn choose_server<R>(config: &Config, lines: &mut Lines<R>) -> Option<usize>
where
    R: AsyncBufRead + Unpin,
{
    if !config.choose_server || config.servers.len() < 2 {
        return Some(0);
    }

    println!("Select STUN server:");
    for (i, v) in config.servers.iter().enumerate() {
        println!("{}) {}", i + 1, v);
    }

    let line = match lines.next_line().await {
        Ok(Some(v)) => v,
        _ => return None,
    };

    match line.trim().parse::<usize>() {
        Ok(n) if (1..=config.servers.len()).contains(&n) => Some(n - 1),
        _ => None,
    }
}

// selected server first, then the rest in order
async fn discover_any(config: &Config, first: usize) -> Option<(StunServer, Discovery)> {
    let servers = config.servers.iter().skip(first).chain(config.servers.iter().take(first));

    for server in servers {
        match discover(&server.host, server.port, config.discovery_timeout).await {
            Ok(v) => return Some((server.clone(), v)),
            Err(e) => {
                warn!("error, discover via {}, {}", server, e);
            }
        }
    }

    None
}

async fn prompt_peer<R>(lines: &mut Lines<R>) -> Option<SocketAddr>
where
    R: AsyncBufRead + Unpin,
{
    println!("Enter the peer address (IP PORT) and press Enter:");

    loop {
        let line = match lines.next_line().await {
            Ok(Some(v)) => v,
            Ok(None) => return None,
            Err(e) => {
                error!("error, stdin, {:?}", e);
                return None;
            }
        };

        match parse_peer(&line) {
            Ok(v) => return Some(v),
            Err(e) => println!("Invalid peer address: {}, try again:", e),
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let app = Config::command().get_matches();
    let config = Config::from_matches(&app);
    debug!("{:?}", config);

    let mut lines = BufReader::new(stdin()).lines();

    let first = match choose_server(&config, &mut lines).await {
        Some(v) => v,
        None => {
            eprintln!("No such STUN server.");
            exit(1);
        }
    };

    let (server, discovery) = match discover_any(&config, first).await {
        Some(v) => v,
        None => {
            eprintln!("Could not get the external address.");
            exit(1);
        }
    };

    println!("Your external address: {} {}", discovery.endpoint.ip, discovery.endpoint.port);
    info!("stun server {}, local port {}", server, discovery.local_port);

    let stun_addr = discovery.server;
    let socket = discovery.into_socket();

    let peer = match config.peer {
        Some(v) => v,
        None => {
            println!("Keeping the port open (every {:?})...", config.keepalive_interval);

            let (stop_tx, stop_rx) = watch::channel(false);
            let (peer, sent) = tokio::join!(
                async {
                    let peer = prompt_peer(&mut lines).await;
                    let _ = stop_tx.send(true);
                    peer
                },
                keep_alive(&socket, stun_addr, config.keepalive_interval, stop_rx),
            );
            debug!("keepalive sent: {}", sent);

            match peer {
                Some(v) => v,
                None => {
                    eprintln!("Invalid peer address.");
                    exit(1);
                }
            }
        }
    };

    println!("\nPunching {} ...", peer);

    let mut session = match PunchSession::new(socket, peer, config.punch_config()) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Invalid peer address: {}", e);
            exit(1);
        }
    };

    let watcher = abort_on_shutdown(session.abort_handle());
    let outcome = session.start().await;
    watcher.abort();

    match outcome {
        Ok(PunchOutcome::Connected { peer, attempts, .. }) => {
            println!("\nFirst packet received from {} after {} probes.", peer, attempts);
        }
        Ok(PunchOutcome::Failed {
            reason,
            attempts,
            elapsed,
        }) => {
            println!(
                "No answer after {} probes in {:?} ({:?}).",
                attempts, elapsed, reason
            );
            exit(2);
        }
        Err(e) => {
            eprintln!("Punch failed: {}", e);
            exit(1);
        }
    }

    let duplex = match session.into_duplex() {
        Ok(v) => v,
        Err(_) => exit(1),
    };

    chat::run(duplex, &mut lines).await;

    println!("end.");
}
