use crate::cli::CallArgs;
use crate::qsnp::{
    model::Contig,
    readers::{detect_file_format, stream_contigs_into_channel, ContigItem, ContigSource},
    workflows::{analyze_contig, ContigReport},
    writers::{write_summary, CsvWriter},
};
use crate::utils::{Config, Result};
use crossbeam_channel::{bounded, Sender};
use rayon::{
    iter::{ParallelBridge, ParallelIterator},
    ThreadPoolBuilder,
};
use std::{
    collections::BTreeMap,
    fs,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

const CHANNEL_BUFFER_SIZE: usize = 2048;
const CONFIG_FILE_NAME: &str = "config.cfg";

pub fn call(args: CallArgs) -> Result<()> {
    let config = args.config()?;
    log::debug!("Using configuration profile {}", config.name);
    prepare_output_dir(&args.output_dir, &config)?;

    // Unknown inputs fail before any thread starts.
    detect_file_format(&args.input_path)?;
    let mut csv_writer = CsvWriter::new(&args.output_dir, &config)?;
    let cancel = Arc::new(AtomicBool::new(false));

    let (sender_contig, receiver_contig) = bounded(CHANNEL_BUFFER_SIZE);
    let stream_cancel = Arc::clone(&cancel);
    let stream_config = config.clone();
    let input_path = args.input_path.clone();
    let contig_stream_thread = thread::spawn(move || -> Result<usize> {
        let source = ContigSource::open(&input_path, &stream_config)?;
        Ok(stream_contigs_into_channel(source, sender_contig, &stream_cancel))
    });

    let (sender_result, receiver_result) = bounded::<(usize, Option<Contig>)>(CHANNEL_BUFFER_SIZE);
    let writer_config = config.clone();
    let writer_cancel = Arc::clone(&cancel);
    let writer_thread = thread::spawn(move || -> Result<usize> {
        // Contigs finish out of order; rows are emitted in input order.
        let mut pending = BTreeMap::new();
        let mut next_index = 0;
        let mut written = 0;
        let mut stdout = std::io::stdout().lock();
        for (index, contig) in &receiver_result {
            pending.insert(index, contig);
            while let Some(entry) = pending.remove(&next_index) {
                next_index += 1;
                let Some(contig) = entry else {
                    continue;
                };
                let outcome = csv_writer.write(&contig).and_then(|shown| {
                    if shown {
                        write_summary(&mut stdout, &contig, &writer_config)?;
                    }
                    Ok(shown)
                });
                match outcome {
                    Ok(shown) => written += shown as usize,
                    Err(e) => {
                        writer_cancel.store(true, Ordering::Relaxed);
                        return Err(e);
                    }
                }
            }
        }
        csv_writer.flush()?;
        Ok(written)
    });

    log::debug!(
        "Initializing thread pool with {} threads...",
        args.num_threads
    );
    let pool = initialize_thread_pool(args.num_threads)?;
    let workflow_config = Arc::new(config);
    pool.install(|| {
        receiver_contig
            .into_iter()
            .par_bridge()
            .for_each_with(&sender_result, |s, item| {
                process_contig(item, &workflow_config, s)
            });
    });

    // Clean-up
    drop(sender_result);
    let written = writer_thread.join().expect("Writer thread panicked")?;
    let streamed = contig_stream_thread
        .join()
        .expect("Contig stream thread panicked")?;
    log::info!(
        "Processed {} input contigs, wrote {} to {}",
        streamed,
        written,
        args.output_dir.display()
    );
    Ok(())
}

fn prepare_output_dir(output_dir: &Path, config: &Config) -> Result<()> {
    fs::create_dir_all(output_dir)
        .map_err(|e| format!("Failed to create {}: {}", output_dir.display(), e))?;
    let config_path = output_dir.join(CONFIG_FILE_NAME);
    fs::write(&config_path, config.to_cfg_string())
        .map_err(|e| format!("Failed to write {}: {}", config_path.display(), e))
}

/// Analyses one streamed contig. Rejected records still forward their index so the
/// writer can keep the input order.
fn process_contig(
    (index, item): ContigItem,
    config: &Arc<Config>,
    sender_result: &Sender<(usize, Option<Contig>)>,
) {
    let contig = match item {
        Ok(mut contig) => {
            let report: ContigReport = analyze_contig(&mut contig, config);
            log::trace!("{}: {} markers", contig.name, report.markers);
            Some(contig)
        }
        Err(err) => {
            log::warn!("Skipping input record: {}", err);
            None
        }
    };
    if let Err(e) = sender_result.send((index, contig)) {
        log::error!("Failed to send contig result to writer thread: {}", e);
    }
}

fn initialize_thread_pool(num_threads: usize) -> Result<rayon::ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("qsnp-{}", i))
        .build()
        .map_err(|e| format!("Failed to initialize thread pool: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SAM: &str = "\
@SQ\tSN:c1\tLN:10
@SQ\tSN:c2\tLN:4
a1\t0\tc1\t1\t60\t10M\t*\t0\t0\tACGTACGTAC\t*
a2\t0\tc1\t1\t60\t10M\t*\t0\t0\tACGTACGTAC\t*
b1\t0\tc1\t1\t60\t10M\t*\t0\t0\tACGTTCGTAC\t*
b2\t0\tc1\t1\t60\t10M\t*\t0\t0\tACGTTCGTAC\t*
bad\t0\tc1\t1\t60\t4Q\t*\t0\t0\tACGT\t*
r1\t0\tc2\t1\t60\t4M\t*\t0\t0\tACGT\t*
";

    fn args(input: PathBuf, output: PathBuf, threads: usize) -> CallArgs {
        CallArgs {
            input_path: input,
            output_dir: output,
            config_path: None,
            num_threads: threads,
            min_reads: None,
            min_reads_frac: None,
            min_qual_score: None,
            min_confidence: None,
            sim_site: None,
            sim_all: None,
            min_map_quality: None,
            settings: vec![],
        }
    }

    #[test]
    fn test_call_writes_tables_in_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("reads.sam");
        fs::write(&input, SAM).unwrap();
        let output = dir.path().join("out");
        call(args(input, output.clone(), 2)).unwrap();

        let cfg = fs::read_to_string(output.join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(Config::from_reader(cfg.as_bytes()).unwrap(), Config::default());

        let contigs = fs::read_to_string(output.join("contigs.csv")).unwrap();
        let names: Vec<&str> = contigs
            .lines()
            .skip(1)
            .map(|l| l.split('\t').next().unwrap())
            .collect();
        assert_eq!(names, vec!["c1", "c2"]);
        assert!(contigs.lines().nth(1).unwrap().starts_with("c1\t1\t1\t1\t"));
        assert!(output.join("variations.csv.inx").exists());
    }

    #[test]
    fn test_call_rejects_unknown_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("notes.txt");
        fs::write(&input, "hello\n").unwrap();
        assert!(call(args(input, dir.path().join("out"), 1)).is_err());
    }
}
