//! Background binary loading
//!
//! Opening and indexing a container can be slow; a worker thread does it and
//! hands finished sources back over a channel. Merging into the resource
//! manager stays on the frame thread, between frames.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use strata_binary::{BinarySource, SourceMode};
use strata_core::Result;

struct LoadRequest {
    path: PathBuf,
    mode: SourceMode,
}

/// Outcome of one background open
pub struct LoadedBinary {
    pub path: PathBuf,
    pub source: Result<BinarySource>,
}

/// Worker thread opening binary containers
pub struct BackgroundBinaryLoader {
    requests: Option<Sender<LoadRequest>>,
    results: Receiver<LoadedBinary>,
    worker: Option<JoinHandle<()>>,
    pending: usize,
}

impl BackgroundBinaryLoader {
    pub fn new() -> Self {
        let (request_tx, request_rx) = unbounded::<LoadRequest>();
        let (result_tx, result_rx) = unbounded();

        let worker = std::thread::Builder::new()
            .name("strata-binary-loader".into())
            .spawn(move || {
                for request in request_rx {
                    let source = BinarySource::open(&request.path, request.mode);
                    if result_tx
                        .send(LoadedBinary {
                            path: request.path,
                            source,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
            });
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Failed to start binary loader thread: {}", e);
                None
            }
        };

        Self {
            requests: Some(request_tx),
            results: result_rx,
            worker,
            pending: 0,
        }
    }

    /// Queue a container for opening
    pub fn request(&mut self, path: impl Into<PathBuf>, mode: SourceMode) {
        let path = path.into();
        let request = LoadRequest { path, mode };
        match self.requests.as_ref().map(|tx| tx.send(request)) {
            Some(Ok(())) => self.pending += 1,
            _ => log::error!("Binary loader thread is not running"),
        }
    }

    /// Requests not yet handed back
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Finished loads, without blocking
    pub fn poll(&mut self) -> Vec<LoadedBinary> {
        let done: Vec<LoadedBinary> = self.results.try_iter().collect();
        self.pending -= done.len().min(self.pending);
        done
    }

    /// Block until every pending request finished or `timeout` elapsed
    pub fn wait(&mut self, timeout: Duration) -> Vec<LoadedBinary> {
        let deadline = Instant::now() + timeout;
        let mut done = Vec::new();
        while self.pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.results.recv_timeout(remaining) {
                Ok(loaded) => {
                    self.pending -= 1;
                    done.push(loaded);
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        done
    }
}

impl Default for BackgroundBinaryLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BackgroundBinaryLoader {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_binary::BinaryWriter;
    use strata_core::{Error, TypeTag};

    #[test]
    fn test_loads_off_thread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.kzb");
        let mut writer = BinaryWriter::new();
        writer.add("project/a", TypeTag::new("Text"), b"hello".to_vec());
        writer.write_to(&path).unwrap();

        let mut loader = BackgroundBinaryLoader::new();
        loader.request(&path, SourceMode::Memory);
        loader.request(dir.path().join("missing.kzb"), SourceMode::Memory);
        assert_eq!(loader.pending(), 2);

        let mut done = loader.wait(Duration::from_secs(10));
        assert_eq!(done.len(), 2);
        assert_eq!(loader.pending(), 0);
        done.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(done[0].source.as_ref().unwrap().entries().len(), 1);
        assert!(matches!(done[1].source, Err(Error::Io(_))));
    }
}
