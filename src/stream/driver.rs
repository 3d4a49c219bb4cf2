//! Task that owns the cursor and pushes documents to the handlers.
//!
//! Every control call arrives as a [`Command`]. Pending commands are applied
//! before each delivery or fetch decision, so a call made from inside a
//! handler takes effect before the next document and never re-enters the
//! delivery loop.
//!
//! The task yields after every accepted batch and every
//! `DELIVERIES_PER_YIELD` deliveries, so control calls from other tasks
//! are seen even when the cursor never has to wait.

use std::collections::VecDeque;
use std::marker::PhantomData;

use bson::RawDocumentBuf;
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cursor::{Batch, BatchCursor};
use super::state::{Demand, StreamState};
use super::{Command, DocumentHandler, EndHandler, ExceptionHandler};
use crate::error::StreamError;

/// Deliveries between forced yields to the scheduler.
const DELIVERIES_PER_YIELD: u64 = 64;

/// What the driver does next.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Deliver,
    Fetch,
    End,
    Wait,
}

pub(super) struct StreamDriver<T> {
    state: StreamState,
    demand: Demand,
    queue: VecDeque<RawDocumentBuf>,
    exhausted: bool,
    handler: Option<DocumentHandler<T>>,
    exception_handler: Option<ExceptionHandler>,
    end_handler: Option<EndHandler>,
    commands: mpsc::UnboundedReceiver<Command<T>>,
    state_tx: watch::Sender<StreamState>,
    delivered: u64,
    batches: u64,
    _item: PhantomData<fn() -> T>,
}

impl<T> StreamDriver<T>
where
    T: DeserializeOwned + Send + 'static,
{
    pub(super) fn new(
        commands: mpsc::UnboundedReceiver<Command<T>>,
        state_tx: watch::Sender<StreamState>,
    ) -> Self {
        Self {
            state: StreamState::Idle,
            demand: Demand::Bounded(0),
            queue: VecDeque::new(),
            exhausted: false,
            handler: None,
            exception_handler: None,
            end_handler: None,
            commands,
            state_tx,
            delivered: 0,
            batches: 0,
            _item: PhantomData,
        }
    }

    /// Drive the stream until it ends, fails or is cancelled.
    pub(super) async fn run(mut self, mut cursor: Box<dyn BatchCursor>, cancel: CancellationToken) {
        while !self.state.is_terminal() {
            self.apply_pending();
            if cancel.is_cancelled() {
                self.transition(StreamState::Closed);
                break;
            }

            match self.next_step() {
                Step::Deliver => {
                    self.deliver_next();
                    if self.delivered % DELIVERIES_PER_YIELD == 0 {
                        tokio::task::yield_now().await;
                    }
                }
                Step::End => self.end(),
                Step::Wait => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {}
                        Some(command) = self.commands.recv() => self.apply(command),
                    }
                }
                Step::Fetch => {
                    let outcome = {
                        let fetch = cursor.next_batch();
                        tokio::pin!(fetch);
                        loop {
                            tokio::select! {
                                biased;
                                _ = cancel.cancelled() => break None,
                                result = &mut fetch => break Some(result),
                                Some(command) = self.commands.recv() => self.apply(command),
                            }
                        }
                    };

                    match outcome {
                        Some(Ok(batch)) => {
                            self.accept(batch);
                            // a ready cursor never suspends; let other tasks run
                            tokio::task::yield_now().await;
                        }
                        Some(Err(e)) => self.fail(e),
                        None => self.transition(StreamState::Closed),
                    }
                }
            }
        }

        if let Err(e) = cursor.close().await {
            warn!("Failed to close cursor: {}", e);
        }
        info!(
            "Stream {} after {} documents in {} batches",
            self.state, self.delivered, self.batches
        );
        self.release();
    }

    fn next_step(&self) -> Step {
        if self.queue.is_empty() && self.exhausted {
            return Step::End;
        }
        if !self.wants_documents() {
            return Step::Wait;
        }
        if self.queue.is_empty() {
            Step::Fetch
        } else {
            Step::Deliver
        }
    }

    fn wants_documents(&self) -> bool {
        self.handler.is_some()
            && matches!(self.state, StreamState::Running | StreamState::Draining)
            && self.demand.has_remaining()
    }

    fn apply_pending(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: Command<T>) {
        if self.state.is_terminal() {
            return;
        }

        match command {
            Command::SetHandler(handler) => {
                let starts_flow = handler.is_some() && self.state == StreamState::Idle;
                self.handler = handler;
                if starts_flow {
                    self.demand = Demand::Unbounded;
                    self.transition(StreamState::Running);
                }
            }
            Command::SetExceptionHandler(handler) => self.exception_handler = handler,
            Command::SetEndHandler(handler) => self.end_handler = handler,
            Command::Pause => {
                if self.state != StreamState::Paused {
                    self.demand = Demand::Bounded(0);
                    self.transition(StreamState::Paused);
                }
            }
            Command::Resume => {
                if self.state != StreamState::Running {
                    self.demand = Demand::Unbounded;
                    self.transition(StreamState::Running);
                }
            }
            Command::Fetch(n) => match self.state {
                StreamState::Idle | StreamState::Paused => {
                    self.demand = Demand::Bounded(n);
                    self.transition(StreamState::Draining);
                }
                StreamState::Draining => self.demand.add(n),
                // unbounded flow already covers any bounded request
                _ => {}
            },
        }
    }

    fn accept(&mut self, batch: Batch) {
        self.batches += 1;
        debug!(
            "Batch #{} with {} documents (has_more: {})",
            self.batches,
            batch.documents.len(),
            batch.has_more
        );
        self.queue.extend(batch.documents);
        if !batch.has_more {
            self.exhausted = true;
        }
    }

    fn deliver_next(&mut self) {
        let Some(raw) = self.queue.pop_front() else {
            return;
        };

        let item = match bson::from_slice::<T>(raw.as_bytes()) {
            Ok(item) => item,
            Err(e) => {
                self.fail(StreamError::Decode(e.to_string()));
                return;
            }
        };

        self.demand.consume();
        self.delivered += 1;
        if let Some(handler) = self.handler.as_mut() {
            handler(item);
        }

        if self.state == StreamState::Draining && !self.demand.has_remaining() {
            self.transition(StreamState::Paused);
        }
    }

    fn end(&mut self) {
        self.transition(StreamState::Ended);
        if let Some(handler) = self.end_handler.take() {
            handler();
        }
    }

    fn fail(&mut self, error: StreamError) {
        let discarded = self.queue.len();
        self.queue.clear();
        self.transition(StreamState::Failed);

        match self.exception_handler.take() {
            Some(handler) => {
                debug!("Stream failed, {} queued documents discarded", discarded);
                handler(error);
            }
            None => warn!("Stream failed without an exception handler: {}", error),
        }
    }

    fn transition(&mut self, next: StreamState) {
        if self.state == next {
            return;
        }
        debug!("Stream state {} -> {}", self.state, next);
        self.state = next;
        self.state_tx.send_replace(next);
    }

    /// Drop handlers and pending commands once terminal.
    fn release(&mut self) {
        self.queue.clear();
        self.handler = None;
        self.exception_handler = None;
        self.end_handler = None;
        self.commands.close();
        while self.commands.try_recv().is_ok() {}
    }
}
