// src/fastq.rs

//! Minimal FASTQ reading and writing with transparent gzip support.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::types::FastqRecord;

/// Lazy FASTQ record reader. Yields one `io::Result<FastqRecord>` per
/// four-line record; lines before a valid `@` header are skipped.
pub struct FastqReader {
    reader: Box<dyn BufRead>,
    line: String,
}

impl FastqReader {
    /// Opens a FASTQ file; files ending in `.gz` are decompressed on the fly.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

        let is_gz = path
            .extension()
            .map(|ext| ext == "gz")
            .unwrap_or(false);

        let reader: Box<dyn BufRead> = if is_gz {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        Ok(Self {
            reader,
            line: String::new(),
        })
    }

    /// In-memory adapter, mostly for tests and embedding.
    pub fn from_reader<R: io::Read + 'static>(reader: R) -> Self {
        Self {
            reader: Box::new(BufReader::new(reader)),
            line: String::new(),
        }
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        self.line.clear();
        if self.reader.read_line(&mut self.line)? == 0 {
            return Ok(None);
        }
        Ok(Some(self.line.trim_end().to_string()))
    }

    fn next_record(&mut self) -> io::Result<Option<FastqRecord>> {
        // 1) header; skip anything that is not a FASTQ header line
        let header_line = loop {
            match self.read_line()? {
                None => return Ok(None),
                Some(line) if line.starts_with('@') => break line[1..].to_string(),
                Some(_) => continue,
            }
        };

        // 2) sequence, 3) plus line, 4) quality; a truncated record ends the stream
        let seq = match self.read_line()? {
            Some(line) => line,
            None => return Ok(None),
        };
        if self.read_line()?.is_none() {
            return Ok(None);
        }
        let quals = match self.read_line()? {
            Some(line) => line,
            None => return Ok(None),
        };

        let id = header_line
            .split(' ')
            .next()
            .unwrap_or(&header_line)
            .to_string();
        Ok(Some(FastqRecord {
            id,
            header_line,
            seq,
            quals,
        }))
    }
}

impl Iterator for FastqReader {
    type Item = io::Result<FastqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Convenience wrapper that drains a whole file into memory.
pub fn read_fastq_records<P: AsRef<Path>>(path: P) -> io::Result<Vec<FastqRecord>> {
    FastqReader::open(path)?.collect()
}

/// Gzip-compressed FASTQ writer. Parent directories are created on demand;
/// callers must [`finish`](GzFastqWriter::finish) to flush the gzip trailer.
#[derive(Debug)]
pub struct GzFastqWriter {
    inner: BufWriter<GzEncoder<File>>,
}

impl GzFastqWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self {
            inner: BufWriter::new(GzEncoder::new(file, Compression::default())),
        })
    }

    pub fn write_record(&mut self, record: &FastqRecord) -> io::Result<()> {
        writeln!(
            self.inner,
            "@{}\n{}\n+\n{}",
            record.header_line, record.seq, record.quals
        )
    }

    pub fn finish(self) -> io::Result<()> {
        let encoder = self.inner.into_inner().map_err(|e| e.into_error())?;
        encoder.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FastqRecord;

    #[test]
    fn parses_plain_records() {
        let data = "@read1 extra info\nATCG\n+\nIIII\n@read2\nGGCC\n+\nJJJJ\n";
        let records: Vec<FastqRecord> = FastqReader::from_reader(data.as_bytes())
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "read1");
        assert_eq!(records[0].header_line, "read1 extra info");
        assert_eq!(records[0].seq, "ATCG");
        assert_eq!(records[0].quals, "IIII");
        assert_eq!(records[1].id, "read2");
    }

    #[test]
    fn skips_junk_before_header() {
        let data = "garbage line\n@read1\nATCG\n+\nIIII\n";
        let records: Vec<FastqRecord> = FastqReader::from_reader(data.as_bytes())
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "read1");
    }

    #[test]
    fn truncated_record_ends_stream() {
        let data = "@read1\nATCG\n+\nIIII\n@read2\nGGCC\n";
        let records: Vec<FastqRecord> = FastqReader::from_reader(data.as_bytes())
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn gzip_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("reads.fq.gz");

        let record = FastqRecord {
            id: "r1".to_string(),
            header_line: "r1".to_string(),
            seq: "AAACCCGGG".to_string(),
            quals: "IIIIIIIII".to_string(),
        };
        let mut writer = GzFastqWriter::create(&path).unwrap();
        writer.write_record(&record).unwrap();
        writer.finish().unwrap();

        let records = read_fastq_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].seq, "AAACCCGGG");
    }
}
