use log::debug;
use punch_rs::AbortHandle;
use tokio::task::JoinHandle;

#[cfg(windows)]
pub async fn wait_shutdown() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(_) => {
            debug!("recv ctrl_c, shutdown");
        }
        Err(e) => {
            debug!("error, ctrl_c, {:?}", e);
        }
    }
    "ctrl_c"
}

#[cfg(unix)]
pub async fn wait_shutdown() -> &'static str {
    use tokio::signal::unix::SignalKind;
    async fn terminate() -> std::io::Result<()> {
        let mut signal = match tokio::signal::unix::signal(SignalKind::terminate()) {
            Ok(v) => v,
            Err(e) => {
                debug!("error, signal, {:?}", e);
                return Err(e);
            }
        };

        let _ = signal.recv().await;
        Ok(())
    }

    tokio::select! {
        s = terminate() => {
            debug!("recv unix terminate signal, {:?}", s);
            "terminate"
        },
        s = tokio::signal::ctrl_c() => {
            debug!("recv unix ctrl_c signal, {:?}", s);
            "ctrl_c"
        }
    }
}

/// Aborts the punch session on the first shutdown signal. The caller aborts
/// the returned task once the session is over.
pub fn abort_on_shutdown(handle: AbortHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = wait_shutdown().await;
        println!("\n{} received, stop punching.", name);
        handle.abort();
    })
}
