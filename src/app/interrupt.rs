use std::sync::{Arc, Mutex};

use tokio::{signal, sync::oneshot, task::JoinHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interrupt {
    /// Passed to a running acquisition loop, which stops at its next frame
    Forwarded,
    /// Nothing is listening; the process should end
    Unhandled,
}

/// Routes operator interrupts. An armed acquisition loop receives the first
/// interrupt; every other interrupt is left unhandled.
#[derive(Clone, Default)]
pub struct Interrupts {
    quit: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl Interrupts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an acquisition loop. Replaces any earlier registration.
    pub fn arm(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut quit) = self.quit.lock() {
            *quit = Some(tx);
        }
        rx
    }

    pub fn disarm(&self) {
        if let Ok(mut quit) = self.quit.lock() {
            *quit = None;
        }
    }

    pub fn is_armed(&self) -> bool {
        self.quit.lock().map(|q| q.is_some()).unwrap_or(false)
    }

    /// Hand one interrupt to the armed loop, if there is one still listening.
    /// The registration is consumed either way.
    pub fn deliver(&self) -> Interrupt {
        let tx = self.quit.lock().ok().and_then(|mut q| q.take());
        match tx {
            Some(tx) if tx.send(()).is_ok() => Interrupt::Forwarded,
            _ => Interrupt::Unhandled,
        }
    }
}

/// Listen for Ctrl-C and SIGTERM for the rest of the process. An unhandled
/// interrupt exits with status 130.
pub fn listen(interrupts: Interrupts) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut signals = match Signals::new() {
            Ok(s) => s,
            Err(e) => {
                log::error!("Failed to install signal handler: {}", e);
                return;
            }
        };
        while signals.recv().await {
            match interrupts.deliver() {
                Interrupt::Forwarded => log::info!("Interrupt, stopping detection"),
                Interrupt::Unhandled => {
                    log::warn!("Interrupted");
                    std::process::exit(130);
                }
            }
        }
    })
}

#[cfg(unix)]
struct Signals {
    int: signal::unix::Signal,
    term: signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn new() -> std::io::Result<Self> {
        use signal::unix::SignalKind;
        Ok(Self {
            int: signal::unix::signal(SignalKind::interrupt())?,
            term: signal::unix::signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) -> bool {
        tokio::select! {
            s = self.int.recv() => s.is_some(),
            s = self.term.recv() => s.is_some(),
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn new() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> bool {
        signal::ctrl_c().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use opencv::core::{CV_8UC3, Scalar};
    use opencv::prelude::*;

    use super::*;
    use crate::{
        app::{DetectSettings, PickError, detect::detect_once},
        transform::Homography,
        vision::{ColorProfile, FrameSource, ProfileStore, Segmenter},
    };

    #[test]
    fn nothing_armed_is_unhandled() {
        let interrupts = Interrupts::new();
        assert!(!interrupts.is_armed());
        assert_eq!(interrupts.deliver(), Interrupt::Unhandled);
    }

    #[test]
    fn only_first_interrupt_is_forwarded() {
        let interrupts = Interrupts::new();
        let mut rx = interrupts.arm();
        assert!(interrupts.is_armed());

        assert_eq!(interrupts.deliver(), Interrupt::Forwarded);
        assert!(rx.try_recv().is_ok());
        assert_eq!(interrupts.deliver(), Interrupt::Unhandled);
    }

    #[test]
    fn disarmed_or_finished_loop_is_unhandled() {
        let interrupts = Interrupts::new();
        let _rx = interrupts.arm();
        interrupts.disarm();
        assert_eq!(interrupts.deliver(), Interrupt::Unhandled);

        let rx = interrupts.arm();
        drop(rx);
        assert_eq!(interrupts.deliver(), Interrupt::Unhandled);
    }

    struct Empty;

    impl FrameSource for Empty {
        fn next_frame(&mut self) -> Result<Mat, PickError> {
            std::thread::sleep(Duration::from_millis(5));
            Ok(Mat::new_rows_cols_with_default(
                120,
                160,
                CV_8UC3,
                Scalar::all(0.0),
            )?)
        }
    }

    #[test]
    fn interrupt_stops_running_loop() {
        let interrupts = Interrupts::new();
        let mut quit = interrupts.arm();

        let worker = std::thread::spawn(move || {
            let profiles = ProfileStore::new(vec![
                ColorProfile::new("green", [40, 70, 70], [80, 255, 255]).unwrap(),
            ]);
            let segmenter = Segmenter::new(profiles, 500.0).unwrap();
            let identity =
                Homography::new([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]).unwrap();
            detect_once(
                &mut Empty,
                &segmenter,
                &identity,
                &DetectSettings::default(),
                &mut quit,
            )
        });

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(interrupts.deliver(), Interrupt::Forwarded);
        let res = worker.join().unwrap();
        assert_eq!(res.unwrap_err(), PickError::NoDetection);
        assert_eq!(interrupts.deliver(), Interrupt::Unhandled);
    }
}
