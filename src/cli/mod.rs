pub mod dispatch;
pub mod request;

use anyhow::Result;
use std::{io::Write, process::ExitCode};

use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::{
    config::ProbeConfig,
    protocol::modbus::{RegisterClient, TcpRegisterClient},
};

pub use dispatch::{dispatch, write_registers, DispatchError};
pub use request::{FunctionCode, NumberEncoding, ParseError, RegisterValues, Request, MAX_REGISTERS};

/// Fewer argument tokens than this print the usage text instead of parsing.
pub const MIN_ARGUMENT_TOKENS: usize = 2;

/// Process outcome. Every failure maps to the same status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        match status {
            Status::Success => ExitCode::SUCCESS,
            Status::Failure => ExitCode::from(255),
        }
    }
}

/// Command definition. The flag grammar is single-dash and order-sensitive,
/// so clap only gathers the raw tokens and `-h` stays free as a hex marker.
pub fn build_command() -> Command {
    Command::new("mbprobe")
        .about("Modbus TCP diagnostic client: read or write holding registers on one device")
        .version(env!("CARGO_PKG_VERSION"))
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(
            Arg::new("tokens")
                .value_name("ARGS")
                .help("Request flags, see usage")
                .num_args(1..)
                .allow_hyphen_values(true)
                .trailing_var_arg(true)
                .action(ArgAction::Append),
        )
}

/// Parse the process arguments and return the request tokens.
pub fn parse_args() -> Vec<String> {
    collect_tokens(&build_command().get_matches())
}

pub fn collect_tokens(matches: &ArgMatches) -> Vec<String> {
    matches
        .get_many::<String>("tokens")
        .map(|tokens| tokens.cloned().collect())
        .unwrap_or_default()
}

pub fn write_banner<W: Write>(out: &mut W) -> std::io::Result<()> {
    let title = format!(
        "Modbus TCP diagnostic client {} (rmodbus)",
        env!("CARGO_PKG_VERSION")
    );
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "-".repeat(title.len()))
}

pub fn write_usage<W: Write>(out: &mut W) -> std::io::Result<()> {
    writeln!(
        out,
        "Usage: -ip [ip] -s [slave id] -f [function] -a (-h [using hex]) [address] \
         -n [number of registers] -v (-h [using hex]) [value:value:...]"
    )?;
    writeln!(
        out,
        "Supported functions [2]: 0x03-Read Holding Registers, 0x10-Write Multiple Registers"
    )?;
    writeln!(
        out,
        "At most {MAX_REGISTERS} registers per request; -n must precede -v."
    )
}

/// Run one probe invocation over TCP: banner, parse, echo, connect, dispatch, close.
pub fn run<W: Write, E: Write>(
    tokens: Vec<String>,
    config: &ProbeConfig,
    out: &mut W,
    err: &mut E,
) -> Status {
    run_with(
        tokens,
        |request| {
            TcpRegisterClient::connect(
                &request.target,
                config.port,
                request.slave_id,
                config.timeout,
            )
        },
        out,
        err,
    )
}

/// Same as [`run`] with the connection step supplied by the caller.
pub fn run_with<C, F, W, E>(tokens: Vec<String>, connect: F, out: &mut W, err: &mut E) -> Status
where
    C: RegisterClient,
    F: FnOnce(&Request) -> Result<C>,
    W: Write,
    E: Write,
{
    let _ = write_banner(out);

    if tokens.len() < MIN_ARGUMENT_TOKENS {
        let _ = write_usage(out);
        return Status::Success;
    }

    let request = match Request::parse(tokens) {
        Ok(request) => request,
        Err(parse_err) => {
            log::error!("Argument parsing failed: {parse_err}");
            let _ = writeln!(err, "Error: {parse_err}");
            return Status::Failure;
        }
    };

    let _ = request.write_echo(out);

    execute(&request, connect, out, err)
}

/// Connect, dispatch and close. The connection is closed on every path once opened.
pub fn execute<C, F, W, E>(request: &Request, connect: F, out: &mut W, err: &mut E) -> Status
where
    C: RegisterClient,
    F: FnOnce(&Request) -> Result<C>,
    W: Write,
    E: Write,
{
    let mut client = match connect(request) {
        Ok(client) => client,
        Err(connect_err) => {
            log::error!("Connection to {} failed: {connect_err:#}", request.target);
            let _ = writeln!(err, "Connection failed: {connect_err}");
            return Status::Failure;
        }
    };

    let result = dispatch(request, &mut client, out);

    if let Err(close_err) = client.close() {
        log::warn!("Failed to close connection: {close_err}");
    }

    match result {
        Ok(()) => Status::Success,
        Err(DispatchError::UnsupportedFunction(code)) => {
            log::error!("Unsupported function code {code}");
            let _ = writeln!(out, "{}", DispatchError::UnsupportedFunction(code));
            Status::Failure
        }
        Err(dispatch_err) => {
            log::error!("Request failed: {dispatch_err}");
            let _ = writeln!(err, "{dispatch_err}");
            Status::Failure
        }
    }
}
