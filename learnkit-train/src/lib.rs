//! Callback-driven training loop.
//!
//! [`basic_train::fit`] drives epochs and batches and dispatches every
//! lifecycle event through a [`CallbackHandler`]. The [`Learner`] facade
//! builds the optimizer, the [`Recorder`] and the handler for each fit and
//! manages layer-group freezing.

pub mod basic_train;
pub mod callbacks;
pub mod config;
pub mod handler;
pub mod history;
pub mod learner;
pub mod recorder;
pub mod schemes;

pub use basic_train::{fit, loss_batch, validate, BatchOutput, FitOutcome, Termination};
pub use callbacks::{Callback, CallbackState, EarlyStopping, Mode, Monitor, OneCycleScheduler};
pub use config::LearnerConfig;
pub use handler::{AverageMetric, CallbackHandler, SmoothenValue};
pub use history::{History, HistoryEntry, HistoryKey, Series};
pub use learner::{even_mults, CallbackFn, FitContext, LayerSummary, Learner, Lr, OneCycleOptions};
pub use recorder::{BaseRecorder, Recorder};
