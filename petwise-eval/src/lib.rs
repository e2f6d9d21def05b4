//! # petwise-eval
//!
//! Per-turn evaluation logs and the daily report built from them.
//!
//! Each chat turn owns an [`EvaluationLogBuilder`]; when the reply finishes the
//! finished [`EvaluationLog`] is handed to [`EvalLogWriter::write`], which
//! publishes it with a temp-file-and-rename so readers never see half a log.
//! [`EvalLogWriter::write_report`] rolls a day up into a [`QuantitativeReport`].

pub mod error;
pub mod log;
pub mod report;
pub mod writer;

pub use error::{EvalError, Result};
pub use log::{EvaluationLog, EvaluationLogBuilder, ProductSummary, ToolCallRecord};
pub use report::{PhaseStats, QuantitativeReport};
pub use writer::{EvalLogWriter, log_file_name, query_hash};
