use tokio::signal;

mod api;
mod config;
pub mod detect;
mod error;
mod interrupt;
mod main;

pub use config::{DetectSettings, LinkConfig, SerialPath, Settings};
pub use error::PickError;
pub use interrupt::{Interrupt, Interrupts, listen};
pub use main::main;

use crate::{motion::MotionReport, store::Detection};

/// Run blocking work (camera, serial, files) off the async runtime
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, PickError>
where
    F: FnOnce() -> Result<T, PickError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PickError::Processing(format!("Worker thread: {}", e)))?
}

/// Detection runs on a blocking thread and is armed to receive the next
/// interrupt while it polls frames.
pub async fn detect(settings: Settings, interrupts: &Interrupts) -> Result<Detection, PickError> {
    let quit = interrupts.arm();
    let res = blocking(move || detect::run_detect(&settings, quit)).await;
    interrupts.disarm();
    res
}

pub async fn pick(settings: Settings) -> Result<MotionReport, PickError> {
    blocking(move || detect::run_pick(&settings)).await
}

pub async fn serve(settings: Settings) -> Result<(), PickError> {
    api::serve(settings).await
}

pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
