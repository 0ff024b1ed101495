//! maqval: per-allele read-support annotation for candidate SNV sites.
//!
//! Usage: maqval <in.map> <location.tsv> <quality> [output]

use clap::error::ErrorKind;
use clap::Parser;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use maqval::annotate::AnnotateCommand;
use maqval::dedup::DupMode;
use maqval::error::MaqError;

#[derive(Parser)]
#[command(name = "maqval")]
#[command(version)]
#[command(about = "Annotate candidate SNV sites with per-allele read support", long_about = None)]
struct Cli {
    /// Input map file (gzip-compressed alignments, coordinate-sorted)
    map: PathBuf,

    /// Candidate site list (whitespace-separated: name pos ref var)
    sites: PathBuf,

    /// Mapping-quality cutoff; reads below it contribute to no statistics
    quality: u8,

    /// Output file (stdout when omitted)
    output: Option<PathBuf>,

    /// Packed reference genome (.bfa); the MAQVAL_BFA environment variable
    /// is honoured when the flag is absent
    #[arg(short = 'r', long)]
    ref_genome: Option<PathBuf>,

    /// Match the complement of the called base on reverse-strand reads
    #[arg(long)]
    complement_reverse: bool,

    /// Duplicate collapse mode
    #[arg(long, default_value = "prefix", value_parser = ["prefix", "bucket"])]
    dup_mode: String,

    /// Sequence prefix length for duplicate comparison
    #[arg(long, default_value_t = 26)]
    dedup_prefix: usize,

    /// Print run statistics to stderr
    #[arg(long)]
    stats: bool,
}

fn main() {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            process::exit(code);
        }
    };

    let mut cmd = AnnotateCommand::new(cli.quality);
    cmd.ref_genome = cli
        .ref_genome
        .clone()
        .or_else(|| std::env::var_os("MAQVAL_BFA").map(PathBuf::from));
    cmd.complement_reverse = cli.complement_reverse;
    cmd.dup_mode = match cli.dup_mode.as_str() {
        "bucket" => DupMode::Bucket,
        _ => DupMode::Prefix,
    };
    cmd.dedup_prefix = cli.dedup_prefix;

    let result = match &cli.output {
        Some(path) => match File::create(path) {
            Ok(file) => run(&cmd, &cli, file),
            Err(e) => Err(MaqError::Io(e)),
        },
        None => {
            let stdout = io::stdout();
            run(&cmd, &cli, stdout.lock())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run<W: Write>(cmd: &AnnotateCommand, cli: &Cli, mut output: W) -> Result<(), MaqError> {
    let stats = cmd.run(&cli.map, &cli.sites, &mut output)?;
    if cli.stats {
        eprintln!("Annotation stats: {}", stats);
    }
    Ok(())
}
