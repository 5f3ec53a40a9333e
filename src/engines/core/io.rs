//! Buffered file I/O
//!
//! Readers and writers for the artifacts a search produces: query FASTA
//! files, persisted raw tool output, domain tables, and HMM model files.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

// Default buffer sizes
const DEFAULT_READ_BUFFER_SIZE: usize = 256 * 1024;
const DEFAULT_WRITE_BUFFER_SIZE: usize = 256 * 1024;

/// Buffered file reader
pub struct FastReader {
    reader: BufReader<File>,
}

impl FastReader {
    /// Open a reader for the given file path
    pub fn new<P: AsRef<Path>>(path: P, buffer_size: Option<usize>) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        let buf_size = buffer_size.unwrap_or(DEFAULT_READ_BUFFER_SIZE);

        Ok(Self {
            reader: BufReader::with_capacity(buf_size, file),
        })
    }

    /// Read the remainder of the file as UTF-8 text
    pub fn read_to_string(&mut self) -> io::Result<String> {
        let mut text = String::new();
        self.reader.read_to_string(&mut text)?;
        Ok(text)
    }

    /// Read the file line by line, without line terminators
    pub fn read_lines(&mut self) -> Lines<'_> {
        Lines {
            reader: &mut self.reader,
            buffer: String::new(),
        }
    }
}

/// Iterator over lines in a file
pub struct Lines<'a> {
    reader: &'a mut BufReader<File>,
    buffer: String,
}

impl<'a> Iterator for Lines<'a> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buffer.clear();
        match self.reader.read_line(&mut self.buffer) {
            Ok(0) => None,
            Ok(_) => {
                // Trim the trailing newline
                if self.buffer.ends_with('\n') {
                    self.buffer.pop();
                    if self.buffer.ends_with('\r') {
                        self.buffer.pop();
                    }
                }

                Some(Ok(self.buffer.clone()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Buffered file writer that counts what it writes
pub struct FastWriter {
    writer: BufWriter<File>,
    bytes_written: usize,
}

impl FastWriter {
    /// Create (or truncate) the file at the given path
    pub fn new<P: AsRef<Path>>(path: P, buffer_size: Option<usize>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;

        let buf_size = buffer_size.unwrap_or(DEFAULT_WRITE_BUFFER_SIZE);

        Ok(Self {
            writer: BufWriter::with_capacity(buf_size, file),
            bytes_written: 0,
        })
    }

    /// Write all of `data`
    pub fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.writer.write_all(data)?;
        self.bytes_written += data.len();
        Ok(data.len())
    }

    /// Flush any buffered data to disk
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Flush and close, returning the total number of bytes written
    pub fn finish(mut self) -> io::Result<usize> {
        self.writer.flush()?;
        Ok(self.bytes_written)
    }

    /// Bytes handed to the writer so far
    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }
}

impl Write for FastWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        FastWriter::write(self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        FastWriter::flush(self)
    }
}

/// Write `text` verbatim to `path`, replacing any existing file
pub fn write_text_file<P: AsRef<Path>>(path: P, text: &str) -> io::Result<usize> {
    let mut writer = FastWriter::new(path, None)?;
    writer.write(text.as_bytes())?;
    writer.finish()
}

/// Read a whole text file
pub fn read_text_file<P: AsRef<Path>>(path: P) -> io::Result<String> {
    FastReader::new(path, None)?.read_to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_fast_reader_writer() -> io::Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.txt");

        let test_data = b"Line 1\nLine 2\r\nLine 3";
        {
            let mut writer = FastWriter::new(&file_path, None)?;
            writer.write(test_data)?;
            assert_eq!(writer.bytes_written(), test_data.len());
            assert_eq!(writer.finish()?, test_data.len());
        }

        let mut reader = FastReader::new(&file_path, None)?;
        let lines: Result<Vec<String>, _> = reader.read_lines().collect();
        assert_eq!(lines?, vec!["Line 1", "Line 2", "Line 3"]);

        Ok(())
    }

    #[test]
    fn test_write_text_file_truncates() -> io::Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("out.txt");

        write_text_file(&file_path, "a much longer first version\n")?;
        let written = write_text_file(&file_path, "short\n")?;

        assert_eq!(written, 6);
        assert_eq!(read_text_file(&file_path)?, "short\n");
        Ok(())
    }
}
