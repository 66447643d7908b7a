use anyhow::{Context, bail};
use clap::Parser;
use either::Either;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, IsTerminal, StdinLock, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, debug_span, warn};

use rmcpp::Config;
use rmcpp::preproc::is_known_directive;
use rmcpp::scanner::Scanner;
use rmcpp::tracing_config;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Input files (default: standard input).
    files: Vec<PathBuf>,

    /// Write output to <FILE> (default: standard output).
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Also remove preprocessor lines (lines starting with '#').
    #[arg(short = 'p', long)]
    delete_preprocessor: bool,

    /// Keep C++ comments (lines starting with '//').
    #[arg(short = 'c', long = "keep-cpp", visible_alias = "keep-cplusplus")]
    keep_cpp: bool,

    /// Keep ANSI C comments (blocks starting with '/*' and ending with '*/').
    #[arg(short = 'a', long = "keep-ansi")]
    keep_ansi: bool,

    /// Delete #include statements.
    #[arg(short = 'i', long)]
    delete_includes: bool,

    /// Delete #<STMT> statements (may be comma separated).
    #[arg(short = 'x', long = "delete", value_name = "STMT", value_delimiter = ',')]
    delete: Vec<String>,

    /// Do not treat comment markers inside quoted strings as comments.
    #[arg(long)]
    track_strings: bool,
}

type Input = Either<StdinLock<'static>, BufReader<File>>;

fn main() -> ExitCode {
    tracing_config::init_tracing();
    let args = Args::parse();

    if args.files.is_empty() && io::stdin().is_terminal() {
        eprintln!("usage: rmcpp [<options>] <file> ...");
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_config(args: &Args) -> Config {
    let mut config = Config {
        delete_preprocessor: args.delete_preprocessor,
        keep_ansi_comment: args.keep_ansi,
        keep_cpp_comment: args.keep_cpp,
        track_strings: args.track_strings,
        ..Config::default()
    };
    if args.delete_includes {
        config.delete_includes();
    }
    for name in &args.delete {
        let name = name.trim().to_lowercase();
        if !name.is_empty() && !is_known_directive(&name) {
            warn!(%name, "not a known preprocessor directive");
        }
        config.delete_directive(&name);
    }
    config
}

fn open_input(path: Option<&Path>) -> anyhow::Result<Input> {
    match path {
        None => Ok(Either::Left(io::stdin().lock())),
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("can not open '{}' for reading", path.display()))?;
            Ok(Either::Right(BufReader::new(file)))
        }
    }
}

fn filter_stream<R: BufRead, W: Write>(
    name: &str,
    input: R,
    sink: W,
    config: &Config,
) -> anyhow::Result<()> {
    let _span = debug_span!("stream", file = name).entered();
    Scanner::new(input, sink, config)
        .run()
        .with_context(|| format!("while processing '{}'", name))?;
    Ok(())
}

fn run(args: &Args) -> anyhow::Result<()> {
    if args.output.is_some() && args.files.len() > 1 {
        bail!("'-o' can only be used with one file");
    }
    if let Some(out) = &args.output {
        if args.files.iter().any(|input| input == out) {
            bail!("input and output files must differ");
        }
    }

    let config = build_config(args);
    debug!(?config, "configuration");

    let sink = match &args.output {
        Some(path) => Either::Right(
            File::create(path)
                .with_context(|| format!("can not open '{}' for writing", path.display()))?,
        ),
        None => Either::Left(io::stdout().lock()),
    };
    let mut sink = BufWriter::new(sink);

    if args.files.is_empty() {
        filter_stream("<stdin>", open_input(None)?, &mut sink, &config)?;
    }
    for path in &args.files {
        let input = open_input(Some(path))?;
        filter_stream(&path.display().to_string(), input, &mut sink, &config)?;
    }

    sink.flush().context("failed to write output")?;
    Ok(())
}
