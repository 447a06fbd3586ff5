//! Byte-progress tracking for dump reads.

use std::io::Read;

/// Reader wrapper that reports the running total of bytes read.
///
/// Used for the reading-files step, where large dumps can take a while.
pub struct ProgressReader<'a, R: Read> {
    reader: R,
    callback: Box<dyn FnMut(u64) + 'a>,
    bytes_read: u64,
}

impl<'a, R: Read> ProgressReader<'a, R> {
    pub fn new(reader: R, callback: Box<dyn FnMut(u64) + 'a>) -> Self {
        Self {
            reader,
            callback,
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl<R: Read> Read for ProgressReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n > 0 {
            self.bytes_read += n as u64;
            (self.callback)(self.bytes_read);
        }
        Ok(n)
    }
}

/// Map `done/total` into the `start..=end` percentage band.
pub fn band_percent(done: u64, total: u64, start: u8, end: u8) -> u8 {
    if total == 0 {
        return end;
    }
    let span = end.saturating_sub(start) as u64;
    let done = done.min(total);
    start + ((span * done) / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_reports_running_total() {
        let seen = Rc::new(Cell::new(0u64));
        let sink = Rc::clone(&seen);
        let mut reader = ProgressReader::new(&b"0123456789"[..], Box::new(move |n| sink.set(n)));
        let mut buf = [0u8; 4];
        reader.read(&mut buf).unwrap();
        reader.read(&mut buf).unwrap();
        assert_eq!(seen.get(), 8);
        assert_eq!(reader.bytes_read(), 8);
    }

    #[test]
    fn test_band_percent() {
        assert_eq!(band_percent(0, 10, 40, 65), 40);
        assert_eq!(band_percent(5, 10, 40, 65), 52);
        assert_eq!(band_percent(10, 10, 40, 65), 65);
        assert_eq!(band_percent(0, 0, 70, 95), 95);
    }
}
