use super::Result;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read as ioRead};
use std::path::Path;

fn is_gzipped(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();
    path_str.ends_with(".gz") || path_str.ends_with(".gzip")
}

pub fn open_input_reader(path: &Path) -> Result<BufReader<Box<dyn ioRead + Send>>> {
    let file = File::open(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    if is_gzipped(path) {
        let gz_decoder = MultiGzDecoder::new(file);
        if gz_decoder.header().is_some() {
            Ok(BufReader::new(Box::new(gz_decoder)))
        } else {
            Err(format!("Invalid gzip header: {}", path.to_string_lossy()))
        }
    } else {
        Ok(BufReader::new(Box::new(file)))
    }
}

/// Reads at most `max_lines` lines from the head of the input.
pub fn read_head_lines(path: &Path, max_lines: usize) -> Result<Vec<String>> {
    let reader = open_input_reader(path)?;
    reader
        .lines()
        .take(max_lines)
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| format!("{}: {}", path.display(), e))
}

/// Extension of the input with any compression suffix removed, lowercased.
pub fn input_extension(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy().to_lowercase();
    let name = name
        .strip_suffix(".gz")
        .or_else(|| name.strip_suffix(".gzip"))
        .unwrap_or(&name);
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_input_extension() {
        assert_eq!(input_extension(Path::new("a/b/run.ace")), Some("ace".into()));
        assert_eq!(input_extension(Path::new("run.SAM.gz")), Some("sam".into()));
        assert_eq!(input_extension(Path::new("contigs")), None);
    }

    #[test]
    fn test_read_head_lines_plain_and_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("in.sam");
        std::fs::write(&plain, "@HD\tVN:1.6\nr1\n").unwrap();
        assert_eq!(read_head_lines(&plain, 1).unwrap(), vec!["@HD\tVN:1.6"]);

        let gz = dir.path().join("in.sam.gz");
        let mut encoder =
            flate2::write::GzEncoder::new(File::create(&gz).unwrap(), flate2::Compression::fast());
        encoder.write_all(b"CO c1 4 1 0 U\nACGT\n").unwrap();
        encoder.finish().unwrap();
        assert_eq!(read_head_lines(&gz, 10).unwrap().len(), 2);
    }

    #[test]
    fn test_open_missing_file() {
        assert!(open_input_reader(Path::new("/does/not/exist.ace")).is_err());
    }
}
