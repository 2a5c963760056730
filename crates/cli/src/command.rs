//! Argument parsing for the `transfer` command.

use std::ffi::OsString;
use std::str::FromStr;
use std::time::Duration;

use bandwidth::BandwidthLimitComponents;
use clap::{Arg, ArgAction, Command, builder::OsStringValueParser, value_parser};
use compress::Mode;
use compress::algorithm::CompressionAlgorithm;
use transfer::{DEFAULT_BUFFER_CAPACITY, DEFAULT_QUALITY, TransferConfig, TransferError};
use transport::{ByteRange, DEFAULT_CONNECT_TIMEOUT};

/// Program name used in usage text and diagnostics.
pub(crate) const PROGRAM_NAME: &str = "transfer";

/// Destination operand that selects standard output.
pub(crate) const STDOUT_OPERAND: &str = "-";

/// Options recognised on the command line, before operands are resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ParsedArgs {
    pub(crate) resource: String,
    pub(crate) destination: OsString,
    pub(crate) mode: Mode,
    pub(crate) algorithm: CompressionAlgorithm,
    pub(crate) quality: u8,
    pub(crate) buffer_size: usize,
    pub(crate) bwlimit: BandwidthLimitComponents,
    pub(crate) range: Option<ByteRange>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) connect_timeout: Duration,
    pub(crate) progress: bool,
    pub(crate) verbose: u8,
}

impl ParsedArgs {
    /// Returns `true` when output goes to standard output.
    pub(crate) fn writes_stdout(&self) -> bool {
        self.destination == STDOUT_OPERAND
    }

    /// Folds the transfer-related options into a validated configuration.
    pub(crate) fn transfer_config(&self) -> Result<TransferConfig, TransferError> {
        TransferConfig::builder()
            .mode(self.mode)
            .algorithm(self.algorithm)
            .quality(self.quality)
            .buffer_capacity(self.buffer_size)
            .bandwidth_limit(self.bwlimit.rate().map(std::num::NonZeroU64::get))
            .bandwidth_burst(self.bwlimit.burst().map(std::num::NonZeroU64::get))
            .build()
    }
}

/// Builds the `clap` command used for parsing.
pub(crate) fn clap_command() -> Command {
    Command::new(PROGRAM_NAME)
        .version(env!("CARGO_PKG_VERSION"))
        .about("Fetch a resource and stream it through a compressor or decompressor.")
        .arg(
            Arg::new("compress")
                .long("compress")
                .short('z')
                .help("Compress the resource into the destination.")
                .action(ArgAction::SetTrue)
                .overrides_with("decompress"),
        )
        .arg(
            Arg::new("decompress")
                .long("decompress")
                .short('d')
                .help("Decompress the resource into the destination (default).")
                .action(ArgAction::SetTrue)
                .overrides_with("compress"),
        )
        .arg(
            Arg::new("quality")
                .long("quality")
                .short('q')
                .value_name("0-100")
                .help("Compression quality; higher is smaller and slower.")
                .value_parser(value_parser!(u8).range(0..=100)),
        )
        .arg(
            Arg::new("algorithm")
                .long("algorithm")
                .value_name("NAME")
                .help("Compression format: zlib or zstd.")
                .value_parser(CompressionAlgorithm::from_str)
                .default_value(CompressionAlgorithm::default_algorithm().name()),
        )
        .arg(
            Arg::new("buffer-size")
                .long("buffer-size")
                .value_name("BYTES")
                .help("Capacity of the staging buffer shared by input and output.")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("bwlimit")
                .long("bwlimit")
                .value_name("RATE")
                .help("Limit download bandwidth (K, M, G suffixes; 0 disables the limit).")
                .value_parser(BandwidthLimitComponents::from_str),
        )
        .arg(
            Arg::new("range")
                .long("range")
                .value_name("FIRST-LAST")
                .help("Fetch only the inclusive byte range FIRST-LAST of an http resource.")
                .value_parser(ByteRange::from_str),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECS")
                .help("Abort when no data moves for SECS seconds.")
                .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("connect-timeout")
                .long("connect-timeout")
                .value_name("SECS")
                .help("Give up connecting after SECS seconds.")
                .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("progress")
                .long("progress")
                .help("Report the transfer rate on standard error.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Increase logging detail; repeat for more.")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("resource")
                .value_name("RESOURCE")
                .help("http://host[:port]/path or a local file.")
                .required(true),
        )
        .arg(
            Arg::new("destination")
                .value_name("DESTINATION")
                .help("Output file, or '-' for standard output.")
                .required(true)
                .allow_hyphen_values(true)
                .value_parser(OsStringValueParser::new()),
        )
}

/// Parses command-line arguments into a [`ParsedArgs`] structure.
pub(crate) fn parse_args<I, S>(arguments: I) -> Result<ParsedArgs, clap::Error>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let mut args: Vec<OsString> = arguments.into_iter().map(Into::into).collect();
    if args.is_empty() {
        args.push(OsString::from(PROGRAM_NAME));
    }

    let mut matches = clap_command().try_get_matches_from(args)?;

    let mode = if matches.get_flag("compress") {
        Mode::Compress
    } else {
        Mode::Decompress
    };
    let resource = matches.remove_one::<String>("resource").unwrap_or_default();
    let destination = matches
        .remove_one::<OsString>("destination")
        .unwrap_or_default();
    let quality = matches
        .remove_one::<u8>("quality")
        .unwrap_or(DEFAULT_QUALITY);
    let algorithm = matches
        .remove_one::<CompressionAlgorithm>("algorithm")
        .unwrap_or_default();
    let buffer_size = matches
        .remove_one::<usize>("buffer-size")
        .unwrap_or(DEFAULT_BUFFER_CAPACITY);
    let bwlimit = matches
        .remove_one::<BandwidthLimitComponents>("bwlimit")
        .unwrap_or_default();
    let range = matches.remove_one::<ByteRange>("range");
    let timeout = matches
        .remove_one::<u64>("timeout")
        .map(Duration::from_secs);
    let connect_timeout = matches
        .remove_one::<u64>("connect-timeout")
        .map_or(DEFAULT_CONNECT_TIMEOUT, Duration::from_secs);

    Ok(ParsedArgs {
        resource,
        destination,
        mode,
        algorithm,
        quality,
        buffer_size,
        bwlimit,
        range,
        timeout,
        connect_timeout,
        progress: matches.get_flag("progress"),
        verbose: matches.get_count("verbose"),
    })
}
