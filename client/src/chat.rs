use log::{debug, error, warn};
use punch_rs::util::is_transient;
use punch_rs::DuplexTransport;
use tokio::io::{AsyncBufRead, Lines};

use crate::signal::wait_shutdown;

/// Sends every stdin line to the peer and prints what arrives, until stdin
/// closes, the socket fails or a shutdown signal comes in.
pub async fn run<R>(mut chat: DuplexTransport, lines: &mut Lines<R>)
where
    R: AsyncBufRead + Unpin,
{
    let tx = chat.sender();
    let peer = chat.peer();
    let shutdown = wait_shutdown();
    tokio::pin!(shutdown);

    println!("Connected with {}, type a message and press Enter.", peer);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if let Err(e) = tx.send_line(&line).await {
                        error!("error, send --> {}, {:?}", peer, e);
                    }
                }
                Ok(None) => {
                    debug!("stdin closed, chat will exit.");
                    break;
                }
                Err(e) => {
                    error!("error, stdin, {:?}", e);
                    break;
                }
            },
            msg = chat.recv() => match msg {
                Ok((remote_addr, data)) => {
                    println!("[{}] {}", remote_addr, String::from_utf8_lossy(&data));
                }
                Err(e) if is_transient(&e) => {
                    warn!("recv error, {:?}", e);
                }
                Err(e) => {
                    error!("error, recv, {:?}", e);
                    break;
                }
            },
            name = &mut shutdown => {
                debug!("recv {}, chat will exit.", name);
                break;
            }
        }
    }
}
