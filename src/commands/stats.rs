use crate::cli::StatsArgs;
use crate::qsnp::readers::{collect_statistics, InputStatistics};
use crate::utils::{Config, Result};
use itertools::Itertools;
use std::io::Write;

pub fn stats(args: StatsArgs) -> Result<()> {
    let config = match &args.config_path {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };
    let stats = collect_statistics(&args.input_path, &config)?;
    if stats.skipped_records > 0 {
        log::warn!(
            "{} records of {} could not be read",
            stats.skipped_records,
            args.input_path.display()
        );
    }
    let mut stdout = std::io::stdout().lock();
    write_statistics(&mut stdout, &stats)
}

fn write_statistics<W: Write>(out: &mut W, stats: &InputStatistics) -> Result<()> {
    let groups = if stats.read_groups.is_empty() {
        "-".to_string()
    } else {
        stats.read_groups.iter().join(",")
    };
    writeln!(
        out,
        "format\t{}\ncontigs\t{}\nreads\t{}\nskipped\t{}\nread_groups\t{}",
        stats.format, stats.contigs, stats.reads, stats.skipped_records, groups
    )
    .map_err(|e| format!("Failed to write statistics: {}", e))
}
