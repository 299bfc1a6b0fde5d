use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Send logs to stderr and append them to the log file. If the log file can't
/// be opened, stderr only.
pub fn init(verbose: bool, log_file: &Path) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };

    if let Some(dir) = log_file.parent() {
        let _ = std::fs::create_dir_all(dir);
    }

    match OpenOptions::new().create(true).append(true).open(log_file) {
        Ok(file) => {
            let writer = std::io::stderr.and(Mutex::new(file));
            tracing_subscriber::fmt()
                .with_writer(writer)
                .with_ansi(false)
                .with_max_level(level)
                .init();
        }
        Err(_) => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_max_level(level)
                .init();
        }
    }
}
