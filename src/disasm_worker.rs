// Copyright (c) 2026 AsmLens Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// Disassembly worker thread - owns the decoder and serves one job at a time.
///
/// The worker publishes each completed `(listing, index)` pair as an
/// immutable snapshot behind an atomic pointer swap. Lookups read whichever
/// snapshot was current when they arrived and never wait on an in-flight
/// decode; a decode failure leaves the previous snapshot servable. There is
/// no way to abort a running decode - a second submit is rejected, not
/// queued.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Instant;

use log::{error, info};
use thiserror::Error;

use crate::decode::{DecodeError, Decoder};
use crate::listing::DisassemblyListing;
use crate::render::render_listing;
use crate::source_index::{LineQuery, SourceIndex};

/// One completed job: the ordered listing plus its sorted lookup index.
pub struct Snapshot {
    pub listing: DisassemblyListing,
    pub index: SourceIndex,
}

/// What a successful submit hands back to the caller.
#[derive(Debug, Clone)]
pub struct DisassemblyOutput {
    pub text: String,
    pub source_name: String,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Flow control, not a fault: a decode is already running.
    #[error("another disassembly is still going on")]
    Busy,
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("disassembly worker has shut down")]
    WorkerExited,
}

struct Job {
    bytes: Vec<u8>,
    reply: Sender<Result<DisassemblyOutput, PipelineError>>,
}

type PublishedSnapshot = Arc<RwLock<Option<Arc<Snapshot>>>>;

/// Caller-side handle to the worker thread. Cheap to clone; all clones share
/// the busy flag and the published snapshot.
#[derive(Clone)]
pub struct DisasmPipeline {
    job_tx: Sender<Job>,
    busy: Arc<AtomicBool>,
    published: PublishedSnapshot,
}

/// Spawn the worker thread and hand the caller its pipeline handle. The
/// worker exits when the last handle is dropped.
pub fn spawn_pipeline<D: Decoder + 'static>(decoder: D) -> DisasmPipeline {
    let (job_tx, job_rx) = mpsc::channel::<Job>();
    let busy = Arc::new(AtomicBool::new(false));
    let published: PublishedSnapshot = Arc::new(RwLock::new(None));

    let worker_busy = Arc::clone(&busy);
    let worker_published = Arc::clone(&published);
    thread::Builder::new()
        .name("disasm-worker".to_string())
        .spawn(move || run_worker(decoder, job_rx, worker_busy, worker_published))
        .expect("failed to spawn disasm worker");

    DisasmPipeline {
        job_tx,
        busy,
        published,
    }
}

impl DisasmPipeline {
    /// Hand the raw binary to the worker and wait for the rendered listing.
    /// Returns `Busy` immediately, without blocking, when a decode is
    /// already in flight; that job is left untouched.
    pub fn submit(&self, bytes: Vec<u8>) -> Result<DisassemblyOutput, PipelineError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PipelineError::Busy);
        }

        let (reply_tx, reply_rx) = mpsc::channel();
        if self.job_tx.send(Job { bytes, reply: reply_tx }).is_err() {
            self.busy.store(false, Ordering::Release);
            return Err(PipelineError::WorkerExited);
        }
        match reply_rx.recv() {
            Ok(outcome) => outcome,
            Err(_) => {
                // Worker died mid-job; unwedge the flag so later submits can
                // report WorkerExited instead of Busy forever.
                self.busy.store(false, Ordering::Release);
                Err(PipelineError::WorkerExited)
            }
        }
    }

    /// Answer a source-location query against the most recently published
    /// snapshot. Never waits on an in-flight submit; 0 means no job has
    /// completed yet.
    pub fn locate(&self, query: &LineQuery) -> usize {
        let snapshot = self
            .published
            .read()
            .expect("snapshot lock poisoned")
            .clone();
        match snapshot {
            Some(snapshot) => snapshot.index.locate(query),
            None => 0,
        }
    }

    /// The currently published snapshot, if any job has ever completed.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.published
            .read()
            .expect("snapshot lock poisoned")
            .clone()
    }
}

fn run_worker<D: Decoder>(
    mut decoder: D,
    jobs: Receiver<Job>,
    busy: Arc<AtomicBool>,
    published: PublishedSnapshot,
) {
    while let Ok(job) = jobs.recv() {
        let outcome = process_job(&mut decoder, job.bytes, &published);
        if let Err(e) = &outcome {
            error!("disassembly job failed: {}", e);
        }
        // Clear busy before replying so the caller can resubmit as soon as
        // it sees the outcome.
        busy.store(false, Ordering::Release);
        let _ = job.reply.send(outcome);
    }
}

fn process_job<D: Decoder>(
    decoder: &mut D,
    bytes: Vec<u8>,
    published: &PublishedSnapshot,
) -> Result<DisassemblyOutput, PipelineError> {
    let now = Instant::now();
    let program = decoder.analyze(&bytes)?;

    let listing = DisassemblyListing::from_decoded(program);
    let index = SourceIndex::build(&listing);
    let text = render_listing(&listing);
    let source_name = listing.source_name.clone();
    info!(
        "disassembly built: {} records in {:.2?}",
        listing.len(),
        now.elapsed()
    );

    let snapshot = Arc::new(Snapshot { listing, index });
    *published.write().expect("snapshot lock poisoned") = Some(snapshot);

    Ok(DisassemblyOutput { text, source_name })
}
