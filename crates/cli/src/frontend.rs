//! Top-level orchestration: parse, open, pump, report.

use std::ffi::OsString;
use std::io::Write;

use clap::error::ErrorKind;
use compress::CodecEngine;
use logging::VerbosityConfig;
use tracing::{debug, info, warn};
use transfer::{BufferPump, PumpStats, TransferError};
use transport::{
    ChannelSource, ResourceLocator, ResourceRequest, TcpConnector, TransferSession, TransferSource,
};

use crate::command::{PROGRAM_NAME, ParsedArgs, parse_args};
use crate::driver::Driver;
use crate::error::CliError;
use crate::exit_code::ExitCode;
use crate::output::OutputSink;
use crate::progress::ProgressReporter;

/// Parses `arguments`, performs the transfer and returns the exit code.
pub(crate) fn execute<I, S, Out, Diag>(arguments: I, stdout: &mut Out, stderr: &mut Diag) -> ExitCode
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
    Out: Write,
    Diag: Write,
{
    let parsed = match parse_args(arguments) {
        Ok(parsed) => parsed,
        Err(error) => return report_parse_error(&error, stdout, stderr),
    };

    // A subscriber may already be installed when running in-process.
    let _ = logging::init_tracing(VerbosityConfig::from_verbose_level(parsed.verbose));

    match transfer(&parsed, stdout, stderr) {
        Ok(stats) => {
            info!(
                read = stats.bytes_read,
                written = stats.bytes_written,
                steps = stats.steps,
                "transfer complete"
            );
            ExitCode::Ok
        }
        Err(error) => {
            let code = error.exit_code();
            debug!(code = code.as_i32(), description = code.description(), "exiting");
            let _ = writeln!(stderr, "{PROGRAM_NAME}: {}: {error}", error.kind_label());
            code
        }
    }
}

fn report_parse_error<Out: Write, Diag: Write>(
    error: &clap::Error,
    stdout: &mut Out,
    stderr: &mut Diag,
) -> ExitCode {
    let rendered = error.render();
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = write!(stdout, "{rendered}");
            ExitCode::Ok
        }
        _ => {
            let _ = write!(stderr, "{rendered}");
            ExitCode::Usage
        }
    }
}

fn transfer<Out: Write, Diag: Write>(
    parsed: &ParsedArgs,
    stdout: &mut Out,
    stderr: &mut Diag,
) -> Result<PumpStats, CliError> {
    let config = parsed.transfer_config()?;
    let locator = ResourceLocator::parse(&parsed.resource)
        .map_err(|error| CliError::Usage(format!("{}: {error}", parsed.resource)))?;
    let engine = config.build_engine()?;
    let capacity = config.buffer_capacity();

    match locator {
        ResourceLocator::Local(path) => {
            if parsed.range.is_some() {
                return Err(CliError::Usage(
                    "--range requires an http:// resource".to_owned(),
                ));
            }
            if !parsed.bwlimit.is_unlimited() {
                warn!("--bwlimit only applies to http:// resources");
            }
            let source = ChannelSource::open_file(&path).map_err(TransferError::from)?;
            info!(path = %path.display(), "reading local resource");
            deliver(source, engine, capacity, parsed, stdout, stderr)
        }
        ResourceLocator::Remote { address, path } => {
            let connector = TcpConnector::new().with_timeout(Some(parsed.connect_timeout));
            let mut session = TransferSession::new(connector);
            session.set_limiter(config.build_limiter());
            session.connect(&address).map_err(TransferError::from)?;

            let mut request = ResourceRequest::new(path);
            if let Some(range) = parsed.range {
                request = request.with_range(range);
            }
            session.request(&request).map_err(TransferError::from)?;
            info!(%address, resource = request.name(), "request sent");
            deliver(session, engine, capacity, parsed, stdout, stderr)
        }
    }
}

fn deliver<S, Out, Diag>(
    source: S,
    engine: CodecEngine,
    capacity: usize,
    parsed: &ParsedArgs,
    stdout: &mut Out,
    stderr: &mut Diag,
) -> Result<PumpStats, CliError>
where
    S: TransferSource,
    Out: Write,
    Diag: Write,
{
    let sink = OutputSink::open(&parsed.destination)?;
    let mut pump = BufferPump::new(source, engine, sink, capacity);

    let mut driver = Driver::new(parsed.timeout);
    if parsed.progress {
        driver = driver.with_progress(ProgressReporter::new());
    }
    let outcome = driver.run(&mut pump, stderr);

    let stats = *pump.stats();
    let (_, _, sink) = pump.into_parts();
    let flushed = sink.finish(stdout);
    outcome?;
    flushed?;
    Ok(stats)
}
