//! Logger setup for the `aeroval-aux` command line program.
//!
//! The library itself only emits records through the `log` macros; whichever
//! program links it decides where they go. The CLI sends them to stderr so
//! that JSON results written to stdout stay clean, and can additionally copy
//! them into a file with `--log-file`.
use std::path::Path;

use log4rs::{
    append::{console::{ConsoleAppender, Target}, file::FileAppender},
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    Config,
};

const LOG_PATTERN: &str = "{h({d(%Y-%m-%d %H:%M:%S)} [{l}] {M})} - {m}{n}";
const FILE_LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} [{l}] {M} - {m}{n}";

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Could not open log file {path}: {source}")]
    LogFile { path: String, source: std::io::Error },
    #[error("Invalid logger configuration: {0}")]
    Config(#[from] log4rs::config::runtime::ConfigErrors),
    #[error("A logger was already set: {0}")]
    AlreadySet(#[from] log::SetLoggerError),
}

/// Build the logger configuration: stderr always, plus `log_file` if given.
pub fn logging_config(level: log::LevelFilter, log_file: Option<&Path>) -> Result<Config, LoggingError> {
    let stderr = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .target(Target::Stderr)
        .build();

    let mut builder = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)));
    let mut root = Root::builder().appender("stderr");

    if let Some(path) = log_file {
        let file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(FILE_LOG_PATTERN)))
            .build(path)
            .map_err(|source| LoggingError::LogFile { path: path.display().to_string(), source })?;
        builder = builder.appender(Appender::builder().build("file", Box::new(file)));
        root = root.appender("file");
    }

    Ok(builder.build(root.build(level))?)
}

/// Install the logger for this process. Fails if one was already installed.
pub fn init_logging(level: log::LevelFilter, log_file: Option<&Path>) -> Result<(), LoggingError> {
    let config = logging_config(level, log_file)?;
    log4rs::init_config(config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_only() {
        let config = logging_config(log::LevelFilter::Debug, None).unwrap();
        assert_eq!(config.appenders().len(), 1);
        assert_eq!(config.root().appenders(), &["stderr".to_string()]);
        assert_eq!(config.root().level(), log::LevelFilter::Debug);
    }

    #[test]
    fn test_with_log_file() {
        let path = std::env::temp_dir().join("aeroval_aux_logging_test.log");
        let config = logging_config(log::LevelFilter::Info, Some(&path)).unwrap();
        assert_eq!(config.appenders().len(), 2);
        assert_eq!(config.root().appenders(), &["stderr".to_string(), "file".to_string()]);
        assert!(path.exists());
    }

    #[test]
    fn test_unwritable_log_file() {
        // A regular file cannot be the parent directory of the log
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml").join("aeroval_aux.log");
        let err = logging_config(log::LevelFilter::Info, Some(&path)).unwrap_err();
        assert!(matches!(err, LoggingError::LogFile { .. }));
    }
}
