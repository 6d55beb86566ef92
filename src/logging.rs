use color_eyre::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive.
pub const LOG_ENV: &str = "CODE_REVIEWER_LOG";

const DEFAULT_FILTER: &str = "info,hyper_util=warn,reqwest=warn";

/// Send logs to a daily rolling file in `dir`. The terminal belongs to the UI.
///
/// Keep the returned guard alive until exit, dropping it flushes the writer.
pub fn init_logging(dir: &Path) -> Result<WorkerGuard> {
  std::fs::create_dir_all(dir)?;

  let appender = tracing_appender::rolling::daily(dir, "code-reviewer.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter =
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

  let layer = tracing_subscriber::fmt::layer()
    .with_writer(writer)
    .with_ansi(false)
    .with_target(true)
    .with_filter(filter);

  tracing_subscriber::registry().with(layer).try_init()?;

  Ok(guard)
}
