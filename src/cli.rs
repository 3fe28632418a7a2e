use crate::utils::{Config, Result};
use clap::{ArgAction, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub static FULL_VERSION: Lazy<String> = Lazy::new(|| {
    format!(
        "{}-{}",
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    )
});

#[derive(Parser)]
#[command(name="qsnp",
          version=&**FULL_VERSION,
          about="SNP and haplotype detection in ACE assemblies and SAM alignments",
          long_about = None,
          disable_help_subcommand = true,
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = ArgAction::Count, help = "Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)")]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Call SNPs and haplotypes per contig")]
    Call(CallArgs),
    #[clap(about = "Summarize an input file without analysis")]
    Stats(StatsArgs),
}

#[derive(Parser, Debug)]
#[command(arg_required_else_help(true))]
pub struct CallArgs {
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input")]
    #[clap(help = "ACE or SAM file, optionally gzip-compressed")]
    #[clap(value_name = "INPUT")]
    #[arg(value_parser = check_file_exists)]
    pub input_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-dir")]
    #[clap(help = "Directory for the result tables")]
    #[clap(value_name = "OUTPUT_DIR")]
    #[arg(value_parser = check_output_dir)]
    pub output_dir: PathBuf,

    #[clap(short = 'c')]
    #[clap(long = "config")]
    #[clap(help = "Configuration file with key=value settings")]
    #[clap(value_name = "CONFIG")]
    #[arg(value_parser = check_file_exists)]
    pub config_path: Option<PathBuf>,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-reads")]
    #[clap(value_name = "READS")]
    #[clap(help = "Minimum number of reads per allele")]
    pub min_reads: Option<usize>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-reads-frac")]
    #[clap(value_name = "FRAC")]
    #[clap(help = "Minimum fraction of informative reads per allele")]
    #[arg(value_parser = ensure_unit_float)]
    pub min_reads_frac: Option<f64>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-qual-score")]
    #[clap(value_name = "QUAL")]
    #[clap(help = "Minimum base quality of a high quality call")]
    pub min_qual_score: Option<i32>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-confidence")]
    #[clap(value_name = "SCORE")]
    #[clap(help = "Minimum confidence score (1-5) of a high confidence SNP")]
    #[arg(value_parser = clap::value_parser!(u8).range(1..=5))]
    pub min_confidence: Option<u8>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "sim-site")]
    #[clap(value_name = "FRAC")]
    #[clap(help = "Per-site similarity threshold for joining a haplotype")]
    #[arg(value_parser = ensure_unit_float)]
    pub sim_site: Option<f64>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "sim-all")]
    #[clap(value_name = "FRAC")]
    #[clap(help = "Fraction of agreeing sites required to join a haplotype")]
    #[arg(value_parser = ensure_unit_float)]
    pub sim_all: Option<f64>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-map-quality")]
    #[clap(value_name = "MAPQ")]
    #[clap(help = "Minimum mapping quality of SAM records")]
    pub min_map_quality: Option<u32>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "set")]
    #[clap(value_name = "KEY=VALUE")]
    #[clap(help = "Override any configuration key (repeatable)")]
    #[arg(value_parser = parse_key_value)]
    pub settings: Vec<(String, String)>,
}

impl CallArgs {
    /// Configuration file (or defaults) overridden by the command line.
    pub fn config(&self) -> Result<Config> {
        let mut config = match &self.config_path {
            Some(path) => Config::from_path(path)?,
            None => Config::default(),
        };
        if let Some(value) = self.min_reads {
            config.min_reads_per_allele = value;
        }
        if let Some(value) = self.min_reads_frac {
            config.min_reads_per_allele_frac = value;
        }
        if let Some(value) = self.min_qual_score {
            config.min_snp_quality_score = value;
        }
        if let Some(value) = self.min_confidence {
            config.min_confidence_score = value;
        }
        if let Some(value) = self.sim_site {
            config.similarity_per_site = value;
        }
        if let Some(value) = self.sim_all {
            config.similarity_all_sites = value;
        }
        if let Some(value) = self.min_map_quality {
            config.min_mapping_quality = value;
        }
        for (key, value) in &self.settings {
            config.set_value(key, value)?;
        }
        Ok(config)
    }
}

#[derive(Parser, Debug)]
#[command(arg_required_else_help(true))]
pub struct StatsArgs {
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input")]
    #[clap(help = "ACE or SAM file, optionally gzip-compressed")]
    #[clap(value_name = "INPUT")]
    #[arg(value_parser = check_file_exists)]
    pub input_path: PathBuf,

    #[clap(short = 'c')]
    #[clap(long = "config")]
    #[clap(help = "Configuration file with key=value settings")]
    #[clap(value_name = "CONFIG")]
    #[arg(value_parser = check_file_exists)]
    pub config_path: Option<PathBuf>,
}

pub fn init_verbose(args: &Cli) {
    // -vvv also shows the per-contig trace of readers and clustering.
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let mut style = buf.style();
            let color = match record.level() {
                Level::Error => Color::Red,
                Level::Warn => Color::Yellow,
                Level::Info => Color::Green,
                Level::Debug => Color::Blue,
                Level::Trace => Color::Cyan,
            };
            style.set_color(color);

            writeln!(
                buf,
                "{} qsnp [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(record.level()),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_output_dir(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if path.exists() && !path.is_dir() {
        Err(format!("Output path is not a directory: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn threads_in_range(s: &str) -> Result<usize> {
    match s.parse::<usize>() {
        Ok(0) => Err("At least one worker thread is required".into()),
        Ok(threads) => Ok(threads),
        Err(_) => Err(format!("Thread count must be a positive integer, got `{}`", s)),
    }
}

fn check_file_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        Err(format!("Input file not found: {}", path.display()))
    } else if path.is_dir() {
        Err(format!("Expected a file but found a directory: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn ensure_unit_float(s: &str) -> Result<f64> {
    let value: f64 = s
        .parse()
        .map_err(|e| format!("Expected a fraction, got `{}`: {}", s, e))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("Fraction must lie between 0 and 1, got: {}", value))
    }
}

fn parse_key_value(s: &str) -> Result<(String, String)> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("Expected KEY=VALUE, got: {}", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_args_override_config() {
        let cli = Cli::try_parse_from([
            "qsnp",
            "call",
            "-i",
            "Cargo.toml",
            "-o",
            "out",
            "--min-reads",
            "3",
            "--sim-site",
            "0.9",
            "--set",
            "useIUPACCodes=true",
        ])
        .unwrap();
        let Command::Call(args) = cli.command else {
            panic!("expected call subcommand");
        };
        let config = args.config().unwrap();
        assert_eq!(config.min_reads_per_allele, 3);
        assert_eq!(config.similarity_per_site, 0.9);
        assert!(config.use_iupac_codes);
        assert_eq!(config.min_confidence_score, 5);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(ensure_unit_float("1.5").is_err());
        assert!(threads_in_range("0").is_err());
        assert!(parse_key_value("novalue").is_err());
        assert!(check_file_exists("src").is_err());
        assert_eq!(threads_in_range("4"), Ok(4));
        assert!(Cli::try_parse_from(["qsnp", "call", "-i", "Cargo.toml", "-o", "out", "--min-confidence", "9"]).is_err());
    }
}
