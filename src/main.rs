use std::process::ExitCode;

use mbprobe::{boot, cli, config::ProbeConfig, Status};

fn main() -> ExitCode {
    let config = match ProbeConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            boot::init_logger(None);
            eprintln!("Error: {err}");
            return Status::Failure.into();
        }
    };
    boot::init_logger(config.log_file.as_deref());

    let tokens = cli::parse_args();
    log::debug!("Arguments: {tokens:?}");

    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    cli::run(tokens, &config, &mut stdout.lock(), &mut stderr.lock()).into()
}
