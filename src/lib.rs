//! # hevcify
//!
//! Batch re-encodes a directory tree of videos: H.264 sources are transcoded to
//! HEVC, everything else is copied verbatim, and outputs that already exist are
//! left alone. Work is spread over a fixed pool of worker threads fed by a
//! shared queue; see [`dispatcher::Dispatcher`] for the run protocol.

pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ffmpeg;
pub mod ignore;
pub mod job;
pub mod processor;
pub mod progress;
pub mod queue;
pub mod report;
pub mod scanner;
pub mod worker;

pub use config::{Config, EncoderSettings};
pub use dispatcher::{DispatchReport, DispatchState, Dispatcher, TaskSource};
pub use error::{AccountingError, DispatchError, EnumerationError, ProcessingError};
pub use job::TaskItem;
pub use queue::{QueueItem, WorkQueue};
pub use report::{ResultReporter, Summary};
pub use worker::{Disposition, StopSignal, TaskOutcome, TaskProcessor, TaskStatus, WorkerId};
