//! Unique sequence numbers for output file names.

use std::sync::mpsc::{self, Receiver};
use std::sync::Mutex;
use std::thread;

use tracing::debug;

use crate::error::{BunchError, Result};

/// Hands out `0, 1, 2, …` from a background thread over a rendezvous
/// channel. No value is skipped or repeated.
///
/// The producer blocks until a value is taken. Dropping the issuer
/// disconnects the channel and ends the thread.
pub struct SequenceIssuer {
    rx: Mutex<Receiver<u64>>,
}

impl SequenceIssuer {
    /// Start the issuer thread.
    pub fn spawn() -> Result<Self> {
        let (tx, rx) = mpsc::sync_channel::<u64>(0);
        thread::Builder::new()
            .name("sequence-issuer".to_string())
            .spawn(move || {
                let mut next: u64 = 0;
                while tx.send(next).is_ok() {
                    next += 1;
                }
                debug!(issued = next, "Sequence issuer stopped");
            })
            .map_err(|e| BunchError::io("<sequence-issuer>", e))?;
        Ok(Self { rx: Mutex::new(rx) })
    }

    /// Block until the next value is available.
    pub fn next(&self) -> Result<u64> {
        let rx = self.rx.lock().map_err(|_| BunchError::SequenceClosed)?;
        rx.recv().map_err(|_| BunchError::SequenceClosed)
    }
}
