use parking_lot::Condvar;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Handle of a background thread running a periodic task.
///
/// Dropping the handle stops the thread and waits for it to exit.
#[derive(Debug)]
pub struct Reaper {
    signal: Arc<StopSignal>,
    handle: Option<JoinHandle<()>>,
}

impl Reaper {
    /// Runs `tick` every `interval` until the handle is dropped or `tick`
    /// returns `false`.
    pub(crate) fn spawn<F>(interval: Duration, mut tick: F) -> std::io::Result<Reaper>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let signal = Arc::new(StopSignal::default());
        let handle = {
            let signal = Arc::clone(&signal);
            thread::Builder::new()
                .name("rusty-sheet-cache-reaper".to_owned())
                .spawn(move || loop {
                    {
                        let mut stopped = signal.stopped.lock();
                        if !*stopped {
                            signal.wake.wait_for(&mut stopped, interval);
                        }
                        if *stopped {
                            break;
                        }
                    }
                    if !tick() {
                        break;
                    }
                })?
        };
        Ok(Reaper {
            signal,
            handle: Some(handle),
        })
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        *self.signal.stopped.lock() = true;
        self.signal.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("cache reaper thread panicked");
            }
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.shutdown();
    }
}
