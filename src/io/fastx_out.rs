/// Per-mate FASTX side streams shared by all workers
///
/// Used for reads held back by the junction filter and for
/// `--outReadsUnmapped Fastx`.
use crate::error::Error;
use crate::io::fastq::{write_fastx, Read};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One writer per mate behind a single lock
pub struct MateStreams<W: Write + Send> {
    writers: Mutex<Vec<W>>,
}

impl<W: Write + Send> MateStreams<W> {
    /// Wrap one writer per mate (one or two).
    pub fn new(writers: Vec<W>) -> Self {
        Self {
            writers: Mutex::new(writers),
        }
    }

    /// Append every mate of `read` under one lock acquisition.
    ///
    /// With `mate_mapped` set, paired reads get a tab and the two per-mate
    /// mapped digits after the name (e.g. `@r/1\t10`).
    pub fn append_read(&self, read: &Read, mate_mapped: Option<[bool; 2]>) -> Result<(), Error> {
        let suffix = match mate_mapped {
            Some([m0, m1]) if read.is_paired() => format!("\t{}{}", u8::from(m0), u8::from(m1)),
            _ => String::new(),
        };

        let mut writers = self
            .writers
            .lock()
            .map_err(|_| Error::Bug("mate stream lock poisoned".into()))?;
        if writers.len() < read.n_mates() {
            return Err(Error::Bug(format!(
                "{} mate streams for a read with {} mates",
                writers.len(),
                read.n_mates()
            )));
        }
        for (im, (mate, out)) in read.mates.iter().zip(writers.iter_mut()).enumerate() {
            write_fastx(out, &read.name, im, mate, &suffix)?;
        }
        Ok(())
    }

    /// Flush all streams.
    pub fn flush(&self) -> Result<(), Error> {
        let mut writers = self
            .writers
            .lock()
            .map_err(|_| Error::Bug("mate stream lock poisoned".into()))?;
        for w in writers.iter_mut() {
            w.flush()?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> Result<Vec<W>, Error> {
        self.writers
            .into_inner()
            .map_err(|_| Error::Bug("mate stream lock poisoned".into()))
    }
}

impl MateStreams<BufWriter<File>> {
    /// Create `{prefix}{stem}.mate1` (and `.mate2` for paired reads).
    pub fn create(prefix: &Path, stem: &str, n_mates: usize) -> Result<Self, Error> {
        let mut writers = Vec::with_capacity(n_mates);
        for im in 1..=n_mates {
            let path = mate_path(prefix, stem, im);
            let file = File::create(&path).map_err(|e| Error::io(e, &path))?;
            writers.push(BufWriter::new(file));
        }
        Ok(Self::new(writers))
    }
}

/// `{prefix}{stem}.mate{N}`; the prefix is used verbatim, like STAR's outFileNamePrefix.
pub fn mate_path(prefix: &Path, stem: &str, mate: usize) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(format!("{}.mate{}", stem, mate));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::fastq::Mate;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn paired_read(name: &str) -> Read {
        Read::new(
            name,
            vec![
                Mate::new(b"ACGT", Some(b"IIII")),
                Mate::new(b"TTGG", Some(b"####")),
            ],
        )
        .unwrap()
    }

    fn text(streams: MateStreams<Vec<u8>>) -> Vec<String> {
        streams
            .into_inner()
            .unwrap()
            .into_iter()
            .map(|w| String::from_utf8(w).unwrap())
            .collect()
    }

    #[test]
    fn test_held_read_format() {
        let streams = MateStreams::new(vec![Vec::new(), Vec::new()]);
        streams.append_read(&paired_read("r1"), None).unwrap();
        assert_eq!(text(streams), ["@r1/1\nACGT\n+\nIIII\n", "@r1/2\nTTGG\n+\n####\n"]);
    }

    #[test]
    fn test_unmapped_read_mapped_flags() {
        let streams = MateStreams::new(vec![Vec::new(), Vec::new()]);
        streams
            .append_read(&paired_read("r2"), Some([true, false]))
            .unwrap();
        let out = text(streams);
        assert!(out[0].starts_with("@r2/1\t10\n"));
        assert!(out[1].starts_with("@r2/2\t10\n"));
    }

    #[test]
    fn test_single_end_fasta_has_no_flags() {
        let streams = MateStreams::new(vec![Vec::new()]);
        let read = Read::new("s", vec![Mate::new(b"ACG", None)]).unwrap();
        streams.append_read(&read, Some([false, false])).unwrap();
        assert_eq!(text(streams), [">s/1\nACG\n"]);
    }

    #[test]
    fn test_too_few_streams() {
        let streams = MateStreams::new(vec![Vec::new()]);
        assert!(streams.append_read(&paired_read("r"), None).is_err());
    }

    #[test]
    fn test_concurrent_reads_stay_whole() {
        let streams = Arc::new(MateStreams::new(vec![Vec::new(), Vec::new()]));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let streams = Arc::clone(&streams);
                thread::spawn(move || {
                    for i in 0..50 {
                        streams
                            .append_read(&paired_read(&format!("t{}_{}", t, i)), None)
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let streams = Arc::try_unwrap(streams).ok().unwrap();
        let out = text(streams);
        // 4 lines per entry, names line up between the two mate streams
        let names1: Vec<&str> = out[0].lines().step_by(4).map(|l| &l[..l.len() - 2]).collect();
        let names2: Vec<&str> = out[1].lines().step_by(4).map(|l| &l[..l.len() - 2]).collect();
        assert_eq!(names1.len(), 200);
        assert_eq!(names1, names2);
    }

    #[test]
    fn test_create_files() {
        let dir = TempDir::new().unwrap();
        let mut prefix = dir.path().as_os_str().to_os_string();
        prefix.push("/");
        let prefix = PathBuf::from(prefix);
        let streams = MateStreams::create(&prefix, "Unmapped.out", 2).unwrap();
        streams.append_read(&paired_read("f"), None).unwrap();
        streams.flush().unwrap();
        let mate2 = std::fs::read_to_string(mate_path(&prefix, "Unmapped.out", 2)).unwrap();
        assert_eq!(mate2, "@f/2\nTTGG\n+\n####\n");
    }
}
