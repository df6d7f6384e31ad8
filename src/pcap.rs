use byteorder::BigEndian;
use byteorder::ByteOrder;
use byteorder::LittleEndian;
use byteorder::NativeEndian;
use byteorder::WriteBytesExt;
use std::fs::File;
use std::io::BufReader;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;
use strum_macros::EnumString;

use crate::error::SensorcapError;

/// Magic number for microsecond resolution pcap files.
pub const PCAP_MAGIC: u32 = 0xa1b2c3d4;
/// Snaplen advertised in the global header of every recorded file.
pub const DEFAULT_FILE_SNAPLEN: u32 = 102400;
/// Records written between two forced flushes.
pub const FLUSH_PKT_NUM: u32 = 1600;

pub const FILE_HEADER_LEN: usize = 24;
pub const RECORD_HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcapByteOrder {
    BigEndian,
    LittleEndian,
}

impl PcapByteOrder {
    /// Byte order of the writing platform, used for every file we produce.
    pub fn native() -> PcapByteOrder {
        if cfg!(target_endian = "big") {
            PcapByteOrder::BigEndian
        } else {
            PcapByteOrder::LittleEndian
        }
    }
    fn detect(magic: [u8; 4]) -> Option<PcapByteOrder> {
        if LittleEndian::read_u32(&magic) == PCAP_MAGIC {
            Some(PcapByteOrder::LittleEndian)
        } else if BigEndian::read_u32(&magic) == PCAP_MAGIC {
            Some(PcapByteOrder::BigEndian)
        } else {
            None
        }
    }
    fn read_u16(&self, buf: &[u8]) -> u16 {
        match self {
            PcapByteOrder::BigEndian => BigEndian::read_u16(buf),
            PcapByteOrder::LittleEndian => LittleEndian::read_u16(buf),
        }
    }
    fn read_u32(&self, buf: &[u8]) -> u32 {
        match self {
            PcapByteOrder::BigEndian => BigEndian::read_u32(buf),
            PcapByteOrder::LittleEndian => LittleEndian::read_u32(buf),
        }
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumIter)]
pub enum LinkType {
    NULL = 0,
    ETHERNET = 1,
    RAW = 101,
    IEEE80211 = 105,
    LOOP = 108,
    LINUXSLL = 113,
    IEEE80211RADIOTAP = 127,
    LINUXSLL2 = 276,
}

impl LinkType {
    pub fn to_u32(self) -> u32 {
        self as u32
    }
    pub fn from_u32(value: u32) -> Option<Self> {
        LinkType::iter().find(|&e| e as u32 == value)
    }
}

// File Header
// from https://www.ietf.org/archive/id/draft-gharris-opsawg-pcap-01.html#name-file-header
//
//                         1                   2                   3
//     0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  0 |                          Magic Number                         |
//    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  4 |          Major Version        |         Minor Version         |
//    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  8 |                     Timezone (thiszone)                       |
//    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// 12 |                          Sigfigs                              |
//    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// 16 |                            SnapLen                            |
//    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// 20 |                           LinkType                            |
//    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub magic_number: u32,
    pub major_version: u16,
    pub minor_version: u16,
    /// GMT to local correction, always 0.
    pub thiszone: i32,
    /// Accuracy of timestamps, always 0.
    pub sigfigs: u32,
    /// Maximum number of octets stored for each packet.
    pub snaplen: u32,
    pub linktype: LinkType,
}

impl Default for FileHeader {
    fn default() -> Self {
        FileHeader {
            magic_number: PCAP_MAGIC,
            major_version: 2,
            minor_version: 4,
            thiszone: 0,
            sigfigs: 0,
            snaplen: DEFAULT_FILE_SNAPLEN,
            linktype: LinkType::ETHERNET,
        }
    }
}

impl FileHeader {
    pub fn new(snaplen: u32) -> FileHeader {
        FileHeader {
            snaplen,
            ..FileHeader::default()
        }
    }
    pub fn write<W: Write>(&self, w: &mut W) -> Result<(), SensorcapError> {
        w.write_u32::<NativeEndian>(self.magic_number)?;
        w.write_u16::<NativeEndian>(self.major_version)?;
        w.write_u16::<NativeEndian>(self.minor_version)?;
        w.write_i32::<NativeEndian>(self.thiszone)?;
        w.write_u32::<NativeEndian>(self.sigfigs)?;
        w.write_u32::<NativeEndian>(self.snaplen)?;
        w.write_u32::<NativeEndian>(self.linktype.to_u32())?;
        Ok(())
    }
    fn parse(buf: &[u8; FILE_HEADER_LEN]) -> Result<(FileHeader, PcapByteOrder), SensorcapError> {
        let pbo = match PcapByteOrder::detect([buf[0], buf[1], buf[2], buf[3]]) {
            Some(pbo) => pbo,
            None => {
                return Err(SensorcapError::InvalidPcapFile {
                    msg: format!("unknown magic number {:02x?}", &buf[0..4]),
                });
            }
        };
        let linktype_value = pbo.read_u32(&buf[20..24]);
        let linktype = match LinkType::from_u32(linktype_value) {
            Some(l) => l,
            None => {
                return Err(SensorcapError::InvalidPcapFile {
                    msg: format!("unknown link type {}", linktype_value),
                });
            }
        };
        let header = FileHeader {
            magic_number: PCAP_MAGIC,
            major_version: pbo.read_u16(&buf[4..6]),
            minor_version: pbo.read_u16(&buf[6..8]),
            thiszone: pbo.read_u32(&buf[8..12]) as i32,
            sigfigs: pbo.read_u32(&buf[12..16]),
            snaplen: pbo.read_u32(&buf[16..20]),
            linktype,
        };
        Ok((header, pbo))
    }
}

// Packet Record
// from https://www.ietf.org/archive/id/draft-gharris-opsawg-pcap-01.html#name-packet-record
//                         1                   2                   3
//     0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  0 |                      Timestamp (Seconds)                      |
//    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  4 |                   Timestamp (Microseconds)                    |
//    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//  8 |                    Captured Packet Length                     |
//    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// 12 |                    Original Packet Length                     |
//    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// 16 /                          Packet Data                          /
//    +---------------------------------------------------------------+

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    pub ts_sec: u32,
    pub ts_usec: u32,
    /// Number of octets stored in `packet_data`.
    pub captured_packet_length: u32,
    /// Length of the packet on the wire, may exceed the captured length.
    pub original_packet_length: u32,
    pub packet_data: Vec<u8>,
}

impl PacketRecord {
    /// Build a record from a frame, truncating it to `snaplen` octets.
    pub fn new(ts: SystemTime, packet_data: &[u8], snaplen: u32) -> PacketRecord {
        let (ts_sec, ts_usec) = split_timestamp(ts);
        let captured = packet_data.len().min(snaplen as usize);
        PacketRecord {
            ts_sec,
            ts_usec,
            captured_packet_length: captured as u32,
            original_packet_length: packet_data.len() as u32,
            packet_data: packet_data[..captured].to_vec(),
        }
    }
}

/// Seconds and microseconds since the epoch, clamped to the pcap field width.
pub fn split_timestamp(ts: SystemTime) -> (u32, u32) {
    let dura = ts.duration_since(UNIX_EPOCH).unwrap_or_default();
    // u32 is the pcap file struct defined data type
    (dura.as_secs() as u32, dura.subsec_micros())
}

/// Appends packet records to a pcap stream.
///
/// The global header is written by the constructor, so it is emitted exactly
/// once and always before the first record. Every `flush_interval` records the
/// underlying writer is flushed, which bounds what an abrupt stop can lose.
pub struct PcapWriter<W: Write> {
    inner: W,
    header: FileHeader,
    flush_interval: u32,
    flush_counter: u32,
    records: u64,
    closed: bool,
}

impl<W: Write> PcapWriter<W> {
    pub fn new(inner: W, snaplen: u32) -> Result<Self, SensorcapError> {
        let mut writer = PcapWriter {
            inner,
            header: FileHeader::new(snaplen),
            flush_interval: FLUSH_PKT_NUM,
            flush_counter: 0,
            records: 0,
            closed: false,
        };
        writer.write_global_header()?;
        Ok(writer)
    }
    pub fn with_flush_interval(mut self, flush_interval: u32) -> Self {
        self.flush_interval = flush_interval.max(1);
        self
    }
    fn write_global_header(&mut self) -> Result<(), SensorcapError> {
        self.header.write(&mut self.inner)
    }
    /// Append one record: the 16-byte record header followed by exactly
    /// `captured_len` octets of `data`.
    pub fn write_record(
        &mut self,
        ts_sec: u32,
        ts_usec: u32,
        captured_len: u32,
        original_len: u32,
        data: &[u8],
    ) -> Result<(), SensorcapError> {
        if captured_len > self.header.snaplen {
            return Err(SensorcapError::SnaplenExceeded {
                captured: captured_len,
                snaplen: self.header.snaplen,
            });
        }
        let payload = match data.get(..captured_len as usize) {
            Some(payload) => payload,
            None => {
                return Err(SensorcapError::CapturePacketError {
                    e: format!(
                        "captured length {} larger than buffer of {} bytes",
                        captured_len,
                        data.len()
                    ),
                });
            }
        };
        self.inner.write_u32::<NativeEndian>(ts_sec)?;
        self.inner.write_u32::<NativeEndian>(ts_usec)?;
        self.inner.write_u32::<NativeEndian>(captured_len)?;
        self.inner.write_u32::<NativeEndian>(original_len)?;
        self.inner.write_all(payload)?;
        self.records += 1;

        // flush the file buffer every flush_interval packets to avoid unexpected loss
        self.flush_counter += 1;
        if self.flush_counter == self.flush_interval {
            self.inner.flush()?;
            self.flush_counter = 0;
            tracing::debug!(records = self.records, "forced flush");
        }
        Ok(())
    }
    pub fn append(&mut self, record: &PacketRecord) -> Result<(), SensorcapError> {
        self.write_record(
            record.ts_sec,
            record.ts_usec,
            record.captured_packet_length,
            record.original_packet_length,
            &record.packet_data,
        )
    }
    /// Records written since the last forced flush (0 right after one).
    pub fn since_flush(&self) -> u32 {
        self.flush_counter
    }
    pub fn records(&self) -> u64 {
        self.records
    }
    pub fn header(&self) -> &FileHeader {
        &self.header
    }
    pub fn get_ref(&self) -> &W {
        &self.inner
    }
    /// Flush everything and release the writer.
    pub fn close(mut self) -> Result<(), SensorcapError> {
        self.closed = true;
        self.inner.flush()?;
        Ok(())
    }
}

impl<W: Write> Drop for PcapWriter<W> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.inner.flush() {
                tracing::error!("flush on drop failed: {}", e);
            }
        }
    }
}

/// Sequential reader for files produced by [`PcapWriter`] or any other
/// microsecond pcap writer.
pub struct PcapReader<R: Read> {
    inner: R,
    header: FileHeader,
    pbo: PcapByteOrder,
}

impl PcapReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SensorcapError> {
        let fs = File::open(path.as_ref())?;
        PcapReader::new(BufReader::new(fs))
    }
}

impl<R: Read> PcapReader<R> {
    pub fn new(mut inner: R) -> Result<Self, SensorcapError> {
        let mut buf = [0u8; FILE_HEADER_LEN];
        if fill(&mut inner, &mut buf)? != FILE_HEADER_LEN {
            return Err(SensorcapError::InvalidPcapFile {
                msg: String::from("truncated global header"),
            });
        }
        let (header, pbo) = FileHeader::parse(&buf)?;
        Ok(PcapReader { inner, header, pbo })
    }
    pub fn header(&self) -> &FileHeader {
        &self.header
    }
    pub fn byte_order(&self) -> PcapByteOrder {
        self.pbo
    }
    /// Next record, or `None` at a clean end of file.
    pub fn next_record(&mut self) -> Result<Option<PacketRecord>, SensorcapError> {
        let mut buf = [0u8; RECORD_HEADER_LEN];
        match fill(&mut self.inner, &mut buf)? {
            0 => return Ok(None),
            RECORD_HEADER_LEN => (),
            n => {
                return Err(SensorcapError::InvalidPcapFile {
                    msg: format!("truncated record header ({} bytes)", n),
                });
            }
        }
        let ts_sec = self.pbo.read_u32(&buf[0..4]);
        let ts_usec = self.pbo.read_u32(&buf[4..8]);
        let captured_packet_length = self.pbo.read_u32(&buf[8..12]);
        let original_packet_length = self.pbo.read_u32(&buf[12..16]);
        if captured_packet_length > self.header.snaplen {
            return Err(SensorcapError::SnaplenExceeded {
                captured: captured_packet_length,
                snaplen: self.header.snaplen,
            });
        }
        // read only capt_len length
        let mut packet_data = vec![0u8; captured_packet_length as usize];
        if fill(&mut self.inner, &mut packet_data)? != packet_data.len() {
            return Err(SensorcapError::InvalidPcapFile {
                msg: String::from("truncated packet data"),
            });
        }
        Ok(Some(PacketRecord {
            ts_sec,
            ts_usec,
            captured_packet_length,
            original_packet_length,
            packet_data,
        }))
    }
}

impl<R: Read> Iterator for PcapReader<R> {
    type Item = Result<PacketRecord, SensorcapError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Read until `buf` is full or the stream ends, returning the byte count.
fn fill<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<usize, SensorcapError> {
    let mut n = 0;
    while n < buf.len() {
        match r.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(k) => n += k,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(n)
}

#[derive(Debug, Clone)]
pub struct Pcap {
    pub header: FileHeader,
    pub records: Vec<PacketRecord>,
}

impl Pcap {
    pub fn read_all<P: AsRef<Path>>(path: P) -> Result<Pcap, SensorcapError> {
        let reader = PcapReader::open(path)?;
        let header = reader.header().clone();
        let records = reader.collect::<Result<Vec<_>, _>>()?;
        Ok(Pcap { header, records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;

    /// Vec sink that counts flush calls.
    #[derive(Default)]
    struct FlushProbe {
        data: Vec<u8>,
        flushes: usize,
    }

    impl Write for FlushProbe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::Other, "no space left on device"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn global_header_layout() {
        let w = PcapWriter::new(Vec::new(), DEFAULT_FILE_SNAPLEN).unwrap();
        let buf = w.get_ref().clone();
        assert_eq!(buf.len(), FILE_HEADER_LEN);
        assert_eq!(NativeEndian::read_u32(&buf[0..4]), 0xa1b2c3d4);
        assert_eq!(NativeEndian::read_u16(&buf[4..6]), 2);
        assert_eq!(NativeEndian::read_u16(&buf[6..8]), 4);
        assert_eq!(NativeEndian::read_u32(&buf[8..12]), 0);
        assert_eq!(NativeEndian::read_u32(&buf[12..16]), 0);
        assert_eq!(NativeEndian::read_u32(&buf[16..20]), 102400);
        assert_eq!(NativeEndian::read_u32(&buf[20..24]), 1);
    }

    #[test]
    fn record_writes_captured_length_only() {
        let mut w = PcapWriter::new(Vec::new(), 64).unwrap();
        let frame = [0xabu8; 60];
        w.write_record(7, 42, 10, 60, &frame).unwrap();
        let buf = w.get_ref();
        assert_eq!(buf.len(), FILE_HEADER_LEN + RECORD_HEADER_LEN + 10);
        let rec = &buf[FILE_HEADER_LEN..];
        assert_eq!(NativeEndian::read_u32(&rec[0..4]), 7);
        assert_eq!(NativeEndian::read_u32(&rec[4..8]), 42);
        assert_eq!(NativeEndian::read_u32(&rec[8..12]), 10);
        assert_eq!(NativeEndian::read_u32(&rec[12..16]), 60);
        assert_eq!(&rec[16..], &frame[..10]);
    }

    #[test]
    fn record_longer_than_snaplen_is_rejected() {
        let mut w = PcapWriter::new(Vec::new(), 8).unwrap();
        let ret = w.write_record(0, 0, 9, 9, &[0u8; 9]);
        assert!(matches!(
            ret,
            Err(SensorcapError::SnaplenExceeded {
                captured: 9,
                snaplen: 8
            })
        ));
        assert_eq!(w.records(), 0);
    }

    #[test]
    fn record_longer_than_buffer_is_rejected() {
        let mut w = PcapWriter::new(Vec::new(), 64).unwrap();
        assert!(w.write_record(0, 0, 20, 20, &[0u8; 4]).is_err());
        assert_eq!(w.get_ref().len(), FILE_HEADER_LEN);
    }

    #[test]
    fn flush_forced_every_interval() {
        let mut w = PcapWriter::new(FlushProbe::default(), 128).unwrap();
        for i in 0..(FLUSH_PKT_NUM - 1) {
            w.write_record(i, 0, 4, 4, &[1, 2, 3, 4]).unwrap();
        }
        assert_eq!(w.get_ref().flushes, 0);
        assert_eq!(w.since_flush(), FLUSH_PKT_NUM - 1);

        w.write_record(0, 0, 4, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(w.get_ref().flushes, 1);
        assert_eq!(w.since_flush(), 0);

        for _ in 0..FLUSH_PKT_NUM {
            w.write_record(0, 0, 4, 4, &[1, 2, 3, 4]).unwrap();
        }
        assert_eq!(w.get_ref().flushes, 2);
        assert_eq!(w.records(), 2 * FLUSH_PKT_NUM as u64);
    }

    #[test]
    fn custom_flush_interval() {
        let mut w = PcapWriter::new(FlushProbe::default(), 128)
            .unwrap()
            .with_flush_interval(3);
        for _ in 0..7 {
            w.write_record(0, 0, 1, 1, &[9]).unwrap();
        }
        assert_eq!(w.get_ref().flushes, 2);
        assert_eq!(w.since_flush(), 1);
    }

    #[test]
    fn write_failure_propagates() {
        assert!(matches!(
            PcapWriter::new(FullDisk, 64),
            Err(SensorcapError::Io(_))
        ));
    }

    #[test]
    fn round_trip_through_reader() {
        let base = UNIX_EPOCH + Duration::from_micros(1_709_288_430_123_456);
        let frames: Vec<Vec<u8>> = (0..5u8).map(|i| vec![i; 10 + i as usize * 30]).collect();
        let mut w = PcapWriter::new(Vec::new(), 64).unwrap();
        let mut expected = Vec::new();
        for (i, frame) in frames.iter().enumerate() {
            let ts = base + Duration::from_micros(i as u64 * 250);
            let record = PacketRecord::new(ts, frame, 64);
            w.append(&record).unwrap();
            expected.push(record);
        }
        let buf = w.get_ref().clone();

        let reader = PcapReader::new(&buf[..]).unwrap();
        assert_eq!(reader.byte_order(), PcapByteOrder::native());
        assert_eq!(reader.header(), &FileHeader::new(64));
        let records: Vec<PacketRecord> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(records, expected);
        // frames longer than the snaplen were cut
        assert_eq!(records[4].captured_packet_length, 64);
        assert_eq!(records[4].original_packet_length, 130);
        assert_eq!(records[0].ts_usec, 123_456);
    }

    #[test]
    fn reader_detects_swapped_byte_order() {
        let mut buf = Vec::new();
        buf.write_u32::<BigEndian>(PCAP_MAGIC).unwrap();
        buf.write_u16::<BigEndian>(2).unwrap();
        buf.write_u16::<BigEndian>(4).unwrap();
        buf.write_u32::<BigEndian>(0).unwrap();
        buf.write_u32::<BigEndian>(0).unwrap();
        buf.write_u32::<BigEndian>(1500).unwrap();
        buf.write_u32::<BigEndian>(1).unwrap();
        buf.write_u32::<BigEndian>(3).unwrap();
        buf.write_u32::<BigEndian>(4).unwrap();
        buf.write_u32::<BigEndian>(2).unwrap();
        buf.write_u32::<BigEndian>(2).unwrap();
        buf.extend_from_slice(&[0xde, 0xad]);

        let mut reader = PcapReader::new(&buf[..]).unwrap();
        assert_eq!(reader.byte_order(), PcapByteOrder::BigEndian);
        assert_eq!(reader.header().snaplen, 1500);
        let r = reader.next_record().unwrap().unwrap();
        assert_eq!((r.ts_sec, r.ts_usec), (3, 4));
        assert_eq!(r.packet_data, vec![0xde, 0xad]);
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn reader_rejects_truncated_record() {
        let mut w = PcapWriter::new(Vec::new(), 64).unwrap();
        w.write_record(1, 1, 8, 8, &[7u8; 8]).unwrap();
        let buf = w.get_ref().clone();
        let cut = &buf[..buf.len() - 3];
        let mut reader = PcapReader::new(cut).unwrap();
        assert!(matches!(
            reader.next_record(),
            Err(SensorcapError::InvalidPcapFile { .. })
        ));
    }

    #[test]
    fn reader_rejects_bad_magic() {
        let buf = [0u8; FILE_HEADER_LEN];
        assert!(matches!(
            PcapReader::new(&buf[..]),
            Err(SensorcapError::InvalidPcapFile { .. })
        ));
    }

    #[test]
    fn linktype_lookup() {
        assert_eq!(LinkType::from_u32(1), Some(LinkType::ETHERNET));
        assert_eq!(LinkType::from_u32(276), Some(LinkType::LINUXSLL2));
        assert_eq!(LinkType::from_u32(9999), None);
    }
}
