//! Streaming sample records from a path tracer.
//!
//! Each record is 13 big-endian `f32`s:
//!
//! | floats | meaning |
//! |---|---|
//! | 2 | film position `x, y`, normalized to `0..1` |
//! | 3 | ray offset (ignored) |
//! | 3 | ray direction (ignored) |
//! | 1 | frequency (ignored) |
//! | 1 | exposure, used as sample weight |
//! | 3 | radiance `r, g, b` |

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info, warn};

use crate::accum::SharedAccumulator;
use crate::util::Result;

/// Number of `f32` fields in one record.
pub const RECORD_FLOATS: usize = 13;
/// Size of one record in bytes.
pub const RECORD_BYTES: usize = RECORD_FLOATS * 4;

/// Upper bound on records deposited per accumulator lock.
const BATCH: usize = 4096;

/// The parts of a trace record the accumulator cares about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRecord {
    pub x: f32,
    pub y: f32,
    pub exposure: f32,
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl SampleRecord {
    /// Write the record, zero-filling the ignored ray fields.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_f32::<BigEndian>(self.x)?;
        w.write_f32::<BigEndian>(self.y)?;
        for _ in 0..7 {
            w.write_f32::<BigEndian>(0.0)?;
        }
        w.write_f32::<BigEndian>(self.exposure)?;
        w.write_f32::<BigEndian>(self.r)?;
        w.write_f32::<BigEndian>(self.g)?;
        w.write_f32::<BigEndian>(self.b)?;
        Ok(())
    }

    fn parse(mut buf: &[u8]) -> io::Result<Self> {
        let x = buf.read_f32::<BigEndian>()?;
        let y = buf.read_f32::<BigEndian>()?;
        for _ in 0..7 {
            buf.read_f32::<BigEndian>()?;
        }
        Ok(Self {
            x,
            y,
            exposure: buf.read_f32::<BigEndian>()?,
            r: buf.read_f32::<BigEndian>()?,
            g: buf.read_f32::<BigEndian>()?,
            b: buf.read_f32::<BigEndian>()?,
        })
    }
}

/// Reads [`SampleRecord`]s until end of stream.
pub struct TraceReader<R> {
    reader: R,
    records: u64,
    truncated: bool,
}

impl<R: Read> TraceReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, records: 0, truncated: false }
    }

    /// Records read so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Whether the stream ended in the middle of a record.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Next record, or `None` at end of stream.
    ///
    /// A trailing partial record also ends the stream.
    pub fn next_record(&mut self) -> Result<Option<SampleRecord>> {
        let mut buf = [0u8; RECORD_BYTES];
        let mut filled = 0;
        while filled < RECORD_BYTES {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled < RECORD_BYTES {
            warn!("trace dump ends with a partial record ({} of {} bytes)", filled, RECORD_BYTES);
            self.truncated = true;
            return Ok(None);
        }
        self.records += 1;
        Ok(Some(SampleRecord::parse(&buf)?))
    }
}

impl<R: Read> Iterator for TraceReader<R> {
    type Item = Result<SampleRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Counters from [`follow`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FollowStats {
    /// Records read from the stream
    pub read: u64,
    /// Records that landed inside the frame
    pub deposited: u64,
    /// Records outside the frame
    pub dropped: u64,
    /// Times `on_update` was called
    pub updates: u64,
}

/// Deposit every record from `reader` into `acc`.
///
/// `on_update` is called each time a full frame's worth of records
/// (`width * height`) has been read, and once more at end of stream if
/// anything landed since the last call. Records are read without holding the
/// accumulator lock and deposited in batches.
pub fn follow<R: Read>(
    reader: R,
    acc: &SharedAccumulator,
    mut on_update: impl FnMut(&FollowStats),
) -> Result<FollowStats> {
    let period = {
        let a = acc.read();
        (a.width() * a.height()) as u64
    };
    let mut trace = TraceReader::new(reader);
    let mut stats = FollowStats::default();
    let mut pending = false;
    let mut batch = Vec::with_capacity(BATCH);

    loop {
        batch.clear();
        let until_update = (period - stats.read % period) as usize;
        let want = until_update.min(BATCH);
        while batch.len() < want {
            match trace.next_record()? {
                Some(record) => batch.push(record),
                None => break,
            }
        }
        if batch.is_empty() {
            break;
        }

        {
            let mut a = acc.write();
            for s in &batch {
                if a.deposit_sample(s.x, s.y, s.exposure, s.r, s.g, s.b) {
                    stats.deposited += 1;
                    pending = true;
                } else {
                    stats.dropped += 1;
                }
            }
        }
        stats.read += batch.len() as u64;

        if stats.read % period == 0 {
            debug!("{} samples read; updating", stats.read);
            stats.updates += 1;
            on_update(&stats);
            pending = false;
        }
        if batch.len() < want {
            break;
        }
    }

    if pending {
        stats.updates += 1;
        on_update(&stats);
    }
    info!("End of dump reached. {} samples read", stats.read);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accum::{share, RadianceAccumulator};
    use std::io::Cursor;

    fn record(x: f32, y: f32) -> SampleRecord {
        SampleRecord { x, y, exposure: 1.0, r: 0.5, g: 0.25, b: 2.0 }
    }

    fn encode(records: &[SampleRecord]) -> Vec<u8> {
        let mut out = Vec::new();
        for r in records {
            r.write_to(&mut out).unwrap();
        }
        out
    }

    #[test]
    fn test_record_layout() {
        let bytes = encode(&[record(0.5, 0.75)]);
        assert_eq!(bytes.len(), RECORD_BYTES);
        // Big-endian 0.5f32
        assert_eq!(&bytes[0..4], &[0x3F, 0x00, 0x00, 0x00]);
        // Exposure sits after the 7 ignored floats
        assert_eq!(&bytes[36..40], &1.0f32.to_be_bytes());
    }

    #[test]
    fn test_reader_roundtrip_and_truncation() {
        let mut bytes = encode(&[record(0.1, 0.2), record(0.3, 0.4)]);
        bytes.extend_from_slice(&[0u8; 10]);
        let mut reader = TraceReader::new(Cursor::new(bytes));
        let all: Vec<SampleRecord> = reader.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(all, vec![record(0.1, 0.2), record(0.3, 0.4)]);
        assert_eq!(reader.records(), 2);
        assert!(reader.truncated());
    }

    #[test]
    fn test_follow_updates_per_frame() {
        let acc = share(RadianceAccumulator::new(2, 2).unwrap());
        // 9 records: two full frames (4 each) + 1, one of them outside.
        let mut records: Vec<SampleRecord> = (0..8)
            .map(|i| record((i % 2) as f32 * 0.5, (i / 2 % 2) as f32 * 0.5))
            .collect();
        records.push(record(1.5, 0.0));
        let mut seen = Vec::new();
        let stats = follow(Cursor::new(encode(&records)), &acc, |s| seen.push(s.read)).unwrap();

        assert_eq!(stats.read, 9);
        assert_eq!(stats.deposited, 8);
        assert_eq!(stats.dropped, 1);
        // The trailing dropped record does not trigger a final update.
        assert_eq!(seen, vec![4, 8]);
        assert_eq!(stats.updates, 2);

        let a = acc.read();
        assert_eq!(a.pixel(1, 1), Some([1.0, 0.5, 4.0, 2.0]));
    }

    #[test]
    fn test_follow_final_update() {
        let acc = share(RadianceAccumulator::new(4, 4).unwrap());
        let records = vec![record(0.0, 0.0), record(0.9, 0.9)];
        let mut calls = 0;
        let stats = follow(Cursor::new(encode(&records)), &acc, |_| calls += 1).unwrap();
        assert_eq!(calls, 1);
        assert_eq!(stats.deposited, 2);
        assert_eq!(acc.read().pixel(3, 3).map(|p| p[3]), Some(1.0));
    }
}
