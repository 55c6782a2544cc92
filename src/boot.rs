use chrono::Local;
use log::LevelFilter;
use std::{io, io::Write, path::Path};

use env_logger::{Builder, Target};

/// Initialise logging.
///
/// Console logging stays at `warn` unless `RUST_LOG` asks for more, so the
/// probe's own output is not interleaved with diagnostics. When `log_file` is
/// given, records go to that file at `debug` level instead.
pub fn init_logger(log_file: Option<&Path>) {
    if let Some(path) = log_file {
        match init_file_logger(path) {
            Ok(()) => return,
            Err(err) => {
                eprintln!(
                    "Failed to initialize file logger at '{}': {err}",
                    path.display()
                );
            }
        }
    }

    let _ = Builder::new()
        .filter_level(LevelFilter::Warn)
        .parse_default_env()
        .target(Target::Stderr)
        .try_init();
}

fn init_file_logger(path: &Path) -> io::Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{}:{} {} [{}] - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(file)))
        .filter_level(LevelFilter::Debug)
        .parse_default_env()
        .try_init()
        .map_err(|err| io::Error::new(io::ErrorKind::AlreadyExists, err))?;

    log::info!("File logger initialized at {}", path.display());

    Ok(())
}
