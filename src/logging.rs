// logger setup; the terminal belongs to the renderer, so detailed logs go to a file
use std::fs::File;
use std::path::Path;

use anyhow::Context;
use env_logger::{Builder, Env, Target};

pub fn init_logging(log_file: Option<&Path>, verbose: bool) -> anyhow::Result<()> {
    let default_filter = match (verbose, log_file.is_some()) {
        (true, _) => "debug",
        (false, true) => "info",
        (false, false) => "warn",
    };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_filter));
    builder.format_timestamp_millis();
    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("failed to create log file {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    builder.try_init().context("logger already initialized")?;
    Ok(())
}
