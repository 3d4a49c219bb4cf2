//! Push-based document streams over MongoDB cursors
//!
//! A [`ReadStream`] wraps a [`BatchCursor`] and delivers decoded documents to
//! a handler, with flow control:
//!
//! - registering a handler starts an unbounded flow
//! - [`pause`](ReadStream::pause) stops delivery and fetching
//! - [`resume`](ReadStream::resume) restores the unbounded flow
//! - [`fetch`](ReadStream::fetch) delivers exactly `n` more documents, then pauses
//!
//! Documents arrive in cursor order, at most once, and at most one batch
//! fetch is outstanding at any time. Exactly one of the end handler and the
//! exception handler fires, unless the stream is closed first.
//!
//! All callbacks run on a dedicated tokio task, one at a time. Control calls
//! are non-blocking and may be made from inside a callback through a
//! [`StreamControl`]; they take effect before the next document.
//!
//! # Example
//!
//! ```rust,no_run
//! use mongo_readstream::stream::{BatchCursor, ReadStream};
//!
//! async fn page_through(cursor: Box<dyn BatchCursor>) {
//!     let stream: ReadStream = ReadStream::new(cursor);
//!     let control = stream.control();
//!     let mut seen = 0u64;
//!
//!     stream
//!         .exception_handler(|e| eprintln!("stream failed: {e}"))
//!         .end_handler(|| println!("done"))
//!         .handler(move |doc| {
//!             seen += 1;
//!             println!("{doc}");
//!             if seen % 100 == 0 {
//!                 control.pause();
//!             }
//!         });
//!
//!     stream.finished().await;
//! }
//! ```

pub mod cursor;
mod driver;
pub mod state;


use bson::Document;
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::StreamError;

pub use cursor::{Batch, BatchCursor, MongoBatchCursor};
pub use state::{Demand, StreamState};

use driver::StreamDriver;

/// Per-document callback.
pub type DocumentHandler<T> = Box<dyn FnMut(T) + Send + 'static>;

/// Callback for the single data-flow error of a stream.
pub type ExceptionHandler = Box<dyn FnOnce(StreamError) + Send + 'static>;

/// Callback for normal completion.
pub type EndHandler = Box<dyn FnOnce() + Send + 'static>;

/// Control message sent to the driver task.
pub(crate) enum Command<T> {
    SetHandler(Option<DocumentHandler<T>>),
    SetExceptionHandler(Option<ExceptionHandler>),
    SetEndHandler(Option<EndHandler>),
    Pause,
    Resume,
    Fetch(u64),
}

/// Cloneable handle for controlling a stream, typically moved into callbacks
/// or timers.
///
/// Calls on a finished stream are silently ignored.
pub struct StreamControl<T = Document> {
    commands: mpsc::UnboundedSender<Command<T>>,
    state: watch::Receiver<StreamState>,
    cancel: CancellationToken,
}

impl<T> Clone for StreamControl<T> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            state: self.state.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T> StreamControl<T> {
    fn send(&self, command: Command<T>) {
        // The driver is gone once the stream is terminal
        let _ = self.commands.send(command);
    }

    /// Stop delivering and fetching until `resume` or `fetch`.
    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    /// Deliver as fast as the cursor produces documents.
    pub fn resume(&self) {
        self.send(Command::Resume);
    }

    /// Request `n` more documents.
    ///
    /// While paused this delivers up to `n` documents and pauses again. While
    /// running unbounded it has no additional effect.
    ///
    /// # Errors
    /// [`StreamError::InvalidDemand`] when `n` is zero.
    pub fn fetch(&self, n: u64) -> Result<(), StreamError> {
        if n == 0 {
            return Err(StreamError::InvalidDemand(n));
        }
        self.send(Command::Fetch(n));
        Ok(())
    }

    /// Close the cursor; pending and in-flight batches are dropped and
    /// neither end nor exception handler fires.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Current state as last published by the driver task.
    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }
}

/// Demand-driven push stream of documents decoded into `T`.
///
/// Dropping the stream closes it; keep it alive until
/// [`finished`](Self::finished) resolves.
pub struct ReadStream<T = Document> {
    id: Uuid,
    control: StreamControl<T>,
}

impl<T> ReadStream<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Start a stream over `cursor`.
    ///
    /// Spawns the driver task on the current tokio runtime. Nothing is
    /// fetched until a handler is registered or demand is signalled.
    pub fn new(cursor: Box<dyn BatchCursor>) -> Self {
        let id = Uuid::new_v4();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(StreamState::Idle);
        let cancel = CancellationToken::new();

        let driver = StreamDriver::new(commands_rx, state_tx);
        let span = tracing::debug_span!("read_stream", id = %id);
        tokio::spawn(driver.run(cursor, cancel.clone()).instrument(span));

        Self {
            id,
            control: StreamControl {
                commands: commands_tx,
                state: state_rx,
                cancel,
            },
        }
    }
}

impl<T> ReadStream<T> {
    /// Identifier used in log events of this stream.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Handle for controlling the stream from callbacks or other tasks.
    pub fn control(&self) -> StreamControl<T> {
        self.control.clone()
    }

    /// Register the document handler. Starts the flow if the stream is idle.
    pub fn handler<F>(&self, handler: F) -> &Self
    where
        F: FnMut(T) + Send + 'static,
    {
        self.set_handler(Some(Box::new(handler)))
    }

    /// Replace or detach (`None`) the document handler.
    ///
    /// While detached nothing is delivered or fetched.
    pub fn set_handler(&self, handler: Option<DocumentHandler<T>>) -> &Self {
        self.control.send(Command::SetHandler(handler));
        self
    }

    /// Register the exception handler, invoked at most once.
    pub fn exception_handler<F>(&self, handler: F) -> &Self
    where
        F: FnOnce(StreamError) + Send + 'static,
    {
        self.set_exception_handler(Some(Box::new(handler)))
    }

    pub fn set_exception_handler(&self, handler: Option<ExceptionHandler>) -> &Self {
        self.control.send(Command::SetExceptionHandler(handler));
        self
    }

    /// Register the end handler, invoked once when the cursor is exhausted.
    pub fn end_handler<F>(&self, handler: F) -> &Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.set_end_handler(Some(Box::new(handler)))
    }

    pub fn set_end_handler(&self, handler: Option<EndHandler>) -> &Self {
        self.control.send(Command::SetEndHandler(handler));
        self
    }

    /// See [`StreamControl::pause`].
    pub fn pause(&self) -> &Self {
        self.control.pause();
        self
    }

    /// See [`StreamControl::resume`].
    pub fn resume(&self) -> &Self {
        self.control.resume();
        self
    }

    /// See [`StreamControl::fetch`].
    pub fn fetch(&self, n: u64) -> Result<&Self, StreamError> {
        self.control.fetch(n)?;
        Ok(self)
    }

    /// See [`StreamControl::close`].
    pub fn close(&self) {
        self.control.close();
    }

    pub fn state(&self) -> StreamState {
        self.control.state()
    }

    /// Wait until the stream reaches a terminal state and return it.
    pub async fn finished(&self) -> StreamState {
        let mut state = self.control.state.clone();
        match state.wait_for(StreamState::is_terminal).await {
            Ok(terminal) => *terminal,
            // driver task gone without publishing a terminal state
            Err(_) => StreamState::Closed,
        }
    }
}

impl<T> Drop for ReadStream<T> {
    fn drop(&mut self) {
        self.control.cancel.cancel();
    }
}
