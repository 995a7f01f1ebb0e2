//! Decoding of recorded event logs
//!
//! A log is a plain concatenation of 32-byte [`StackEvent`] records with no
//! header, exactly as an instrumentation engine appends them.

use callscope_common::{StackEvent, EVENT_SIZE};
use std::io::{ErrorKind, Read};

use crate::domain::ReplayError;

/// Iterator over the events of a recorded log
pub struct EventReader<R: Read> {
    reader: R,
    /// Byte offset of the next record
    offset: u64,
    done: bool,
}

impl<R: Read> EventReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, offset: 0, done: false }
    }

    /// Bytes consumed so far
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Fill `buf` as far as the input allows, returning the byte count
    fn fill(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> Iterator for EventReader<R> {
    type Item = Result<StackEvent, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut record = [0u8; EVENT_SIZE];
        let len = match self.fill(&mut record) {
            Ok(len) => len,
            Err(e) => {
                self.done = true;
                return Some(Err(e.into()));
            }
        };

        if len == 0 {
            self.done = true;
            return None;
        }
        if len < EVENT_SIZE {
            self.done = true;
            return Some(Err(ReplayError::TruncatedRecord {
                offset: self.offset,
                len,
                expected: EVENT_SIZE,
            }));
        }

        self.offset += EVENT_SIZE as u64;
        StackEvent::from_bytes(&record).map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(events: &[StackEvent]) -> Vec<u8> {
        events.iter().flat_map(StackEvent::to_bytes).collect()
    }

    #[test]
    fn test_reads_all_records() {
        let events = [StackEvent::call(1, 0x9000, 0x1000), StackEvent::ret(1, 0x9000, false)];
        let bytes = encode(&events);

        let decoded: Vec<StackEvent> =
            EventReader::new(bytes.as_slice()).collect::<Result<_, _>>().unwrap();

        assert_eq!(decoded, events);
    }

    #[test]
    fn test_empty_log_yields_nothing() {
        assert_eq!(EventReader::new(&[][..]).count(), 0);
    }

    #[test]
    fn test_trailing_partial_record_is_reported() {
        let mut bytes = encode(&[StackEvent::call(1, 0x9000, 0x1000)]);
        bytes.extend_from_slice(&[0xff; 5]);

        let mut reader = EventReader::new(bytes.as_slice());
        assert!(reader.next().unwrap().is_ok());
        match reader.next() {
            Some(Err(ReplayError::TruncatedRecord { offset, len, expected })) => {
                assert_eq!(offset, 32);
                assert_eq!(len, 5);
                assert_eq!(expected, EVENT_SIZE);
            }
            other => panic!("expected truncated record, got {other:?}"),
        }
        assert!(reader.next().is_none());
    }
}
