use chrono::DateTime;
use chrono::Local;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use crate::capture::CaptureEngine;
use crate::endpoint::ProtocolCheck;
use crate::endpoint::parse_endpoint;
use crate::error::SensorcapError;
use crate::filter::Filter;
use crate::naming::DEFAULT_DEVICE_TYPE;
use crate::naming::DEFAULT_NAME;
use crate::naming::NamingPolicy;
use crate::naming::SplitRule;
use crate::naming::is_discovery;
use crate::pcap::DEFAULT_FILE_SNAPLEN;
use crate::pcap::FLUSH_PKT_NUM;
use crate::pcap::LinkType;
use crate::pcap::PcapWriter;
use crate::pcap::split_timestamp;
use crate::platform::Platform;
use crate::report::Reporter;

pub const DEFAULT_SNAPLEN: u32 = 65536;

/// Lifecycle of a capture session. Every transition moves exactly one step
/// to the right.
///
/// `Created -> Opened -> Running -> Stopped -> Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Opened,
    Running,
    Stopped,
    Closed,
}

impl SessionState {
    fn can_move_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Created, SessionState::Opened)
                | (SessionState::Opened, SessionState::Running)
                | (SessionState::Running, SessionState::Stopped)
                | (SessionState::Stopped, SessionState::Closed)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Frames longer than this are cut before delivery.
    pub snaplen: u32,
    /// pcap-filter expression, empty accepts everything.
    pub filter: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            snaplen: DEFAULT_SNAPLEN,
            filter: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames the engine handed over.
    pub seen: u64,
    /// Frames rejected by the filter.
    pub filtered: u64,
    /// Frames passed to the packet callback.
    pub delivered: u64,
}

/// One matching packet as seen by the packet callback.
#[derive(Debug, Clone, Copy)]
pub struct CapturedPacket<'a> {
    pub ts_sec: u32,
    pub ts_usec: u32,
    pub captured_len: u32,
    pub original_len: u32,
    /// Exactly `captured_len` bytes.
    pub data: &'a [u8],
}

pub struct Session<E: CaptureEngine> {
    engine: E,
    state: SessionState,
    snaplen: u32,
    filter: Option<Filter>,
    stats: SessionStats,
}

impl<E: CaptureEngine> Session<E> {
    /// Bind the engine and install the filter.
    ///
    /// The session only reaches `Opened` when the link layer is ethernet and
    /// the filter compiled and validated.
    pub fn open(engine: E, config: &SessionConfig) -> Result<Session<E>, SensorcapError> {
        let mut session = Session {
            engine,
            state: SessionState::Created,
            snaplen: config.snaplen,
            filter: None,
            stats: SessionStats::default(),
        };
        if session.engine.link_type() != LinkType::ETHERNET {
            return Err(SensorcapError::UnsupportedLinkLayer {
                iface: session.engine.interface_name().to_string(),
            });
        }
        let filter = Filter::parser(&config.filter)?;
        if let Some(filter) = &filter {
            filter.validate()?;
            tracing::debug!("filter installed: {}", filter.input_str);
        }
        session.filter = filter;
        session.transition(SessionState::Opened)?;
        Ok(session)
    }
    fn transition(&mut self, to: SessionState) -> Result<(), SensorcapError> {
        if !self.state.can_move_to(to) {
            return Err(SensorcapError::InvalidState {
                from: self.state,
                to,
            });
        }
        tracing::info!(
            iface = self.engine.interface_name(),
            "session {:?} -> {:?}",
            self.state,
            to
        );
        self.state = to;
        Ok(())
    }
    pub fn state(&self) -> SessionState {
        self.state
    }
    pub fn stats(&self) -> SessionStats {
        self.stats
    }
    pub fn interface_name(&self) -> &str {
        self.engine.interface_name()
    }
    /// Deliver matching packets to `on_packet` until `stop` is set, the
    /// engine fails or the callback fails.
    ///
    /// `stop` is checked between frames and after every engine read timeout.
    /// The session ends up `Stopped` on every path out of this call.
    pub fn run<F>(&mut self, stop: &AtomicBool, mut on_packet: F) -> Result<(), SensorcapError>
    where
        F: FnMut(&CapturedPacket) -> Result<(), SensorcapError>,
    {
        self.transition(SessionState::Running)?;
        let ret = self.capture_loop(stop, &mut on_packet);
        if let Err(e) = &ret {
            tracing::error!("capture loop failed: {}", e);
        }
        self.transition(SessionState::Stopped)?;
        ret
    }
    fn capture_loop<F>(&mut self, stop: &AtomicBool, on_packet: &mut F) -> Result<(), SensorcapError>
    where
        F: FnMut(&CapturedPacket) -> Result<(), SensorcapError>,
    {
        while !stop.load(Ordering::Relaxed) {
            let frame = match self.engine.next_frame()? {
                Some(frame) => frame,
                None => continue,
            };
            self.stats.seen += 1;
            if let Some(filter) = &self.filter {
                if !filter.check(frame.data) {
                    self.stats.filtered += 1;
                    continue;
                }
            }
            let (ts_sec, ts_usec) = split_timestamp(frame.ts);
            let captured = frame.data.len().min(self.snaplen as usize);
            let packet = CapturedPacket {
                ts_sec,
                ts_usec,
                captured_len: captured as u32,
                original_len: frame.original_len.max(frame.data.len()) as u32,
                data: &frame.data[..captured],
            };
            self.stats.delivered += 1;
            on_packet(&packet)?;
        }
        Ok(())
    }
    /// Release the device. Only a stopped session can be closed.
    pub fn close(mut self) -> Result<SessionStats, SensorcapError> {
        self.transition(SessionState::Closed)?;
        Ok(self.stats)
    }
}

/// What a recording run writes and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOptions {
    pub device_type: String,
    pub name: String,
    pub check: ProtocolCheck,
    pub split: SplitRule,
    /// Snapshot length stamped into every file header.
    pub file_snaplen: u32,
    pub flush_interval: u32,
}

impl Default for RecordOptions {
    fn default() -> Self {
        RecordOptions {
            device_type: DEFAULT_DEVICE_TYPE.to_string(),
            name: DEFAULT_NAME.to_string(),
            check: ProtocolCheck::default(),
            split: SplitRule::default(),
            file_snaplen: DEFAULT_FILE_SNAPLEN,
            flush_interval: FLUSH_PKT_NUM,
        }
    }
}

/// The per-packet side of a recording run: appends every packet to the
/// current pcap file, prints a sampled endpoint summary and rotates files.
pub struct Recorder<P: Platform, R: Reporter> {
    options: RecordOptions,
    policy: NamingPolicy,
    platform: P,
    reporter: R,
    writer: PcapWriter<Box<dyn Write>>,
    path: PathBuf,
    // capture second of the first record in the current file
    file_start: Option<u32>,
    // capture second a rotation last found no new name in
    held_at: Option<u32>,
    files: u32,
    written: u64,
}

impl<P: Platform, R: Reporter> Recorder<P, R> {
    /// Name and create the first output file.
    pub fn create(
        options: RecordOptions,
        policy: NamingPolicy,
        platform: P,
        mut reporter: R,
    ) -> Result<Recorder<P, R>, SensorcapError> {
        let mut options = options;
        if is_discovery(&options.device_type) && options.split != SplitRule::None {
            tracing::debug!("discovery writes one fixed file, split rule {} ignored", options.split);
            options.split = SplitRule::None;
        }
        let now = platform.now();
        let path = policy.output_path(&options.device_type, &options.name, &now);
        let writer = open_file(&platform, &mut reporter, &options, &path, &now)?;
        Ok(Recorder {
            options,
            policy,
            platform,
            reporter,
            writer,
            path,
            file_start: None,
            held_at: None,
            files: 1,
            written: 0,
        })
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    pub fn files(&self) -> u32 {
        self.files
    }
    pub fn written(&self) -> u64 {
        self.written
    }
    pub fn reporter_mut(&mut self) -> &mut R {
        &mut self.reporter
    }
    pub fn on_packet(&mut self, packet: &CapturedPacket) -> Result<(), SensorcapError> {
        self.maybe_rotate(packet.ts_sec)?;

        self.writer.write_record(
            packet.ts_sec,
            packet.ts_usec,
            packet.captured_len,
            packet.original_len,
            packet.data,
        )?;
        self.written += 1;
        if self.file_start.is_none() {
            self.file_start = Some(packet.ts_sec);
        }

        // one summary per flush batch, printing every packet would cap the rate
        if self.writer.since_flush() == 0 {
            if let Some(summary) = parse_endpoint(
                packet.data,
                packet.captured_len as usize,
                packet.ts_sec,
                packet.ts_usec,
                self.options.check,
            ) {
                self.reporter.on_summary(&summary);
            }
        }
        Ok(())
    }
    fn maybe_rotate(&mut self, ts_sec: u32) -> Result<(), SensorcapError> {
        let secs = match self.file_start {
            Some(start) => ts_sec.saturating_sub(start) as u64,
            None => 0,
        };
        if !self.options.split.due(self.writer.records(), secs) {
            return Ok(());
        }
        // names have one second resolution
        if self.held_at == Some(ts_sec) {
            return Ok(());
        }
        let now = self.platform.now();
        let path = self
            .policy
            .output_path(&self.options.device_type, &self.options.name, &now);
        if path == self.path {
            tracing::debug!("rotation skipped, {} is still current", path.display());
            self.held_at = Some(ts_sec);
            return Ok(());
        }
        let writer = open_file(
            &self.platform,
            &mut self.reporter,
            &self.options,
            &path,
            &now,
        )?;
        let old = std::mem::replace(&mut self.writer, writer);
        let old_path = std::mem::replace(&mut self.path, path);
        let records = old.records();
        old.close()?;
        tracing::info!(
            records,
            "rotated {} -> {}",
            old_path.display(),
            self.path.display()
        );
        self.file_start = None;
        self.held_at = None;
        self.files += 1;
        Ok(())
    }
    /// Flush and close the current file.
    pub fn finish(self) -> Result<u64, SensorcapError> {
        let records = self.writer.records();
        self.writer.close()?;
        tracing::info!(
            records,
            written = self.written,
            files = self.files,
            "closed {}",
            self.path.display()
        );
        Ok(self.written)
    }
}

fn open_file<P: Platform, R: Reporter>(
    platform: &P,
    reporter: &mut R,
    options: &RecordOptions,
    path: &Path,
    now: &DateTime<Local>,
) -> Result<PcapWriter<Box<dyn Write>>, SensorcapError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            platform.create_dir_all(parent)?;
        }
    }
    reporter.on_file(path, now);
    let sink = platform.create_file(path)?;
    let writer = PcapWriter::new(sink, options.file_snaplen)?.with_flush_interval(options.flush_interval);
    Ok(writer)
}

/// Run `session` and hand every delivered packet to `recorder`.
pub fn record<E, P, R>(
    session: &mut Session<E>,
    recorder: &mut Recorder<P, R>,
    stop: &AtomicBool,
) -> Result<(), SensorcapError>
where
    E: CaptureEngine,
    P: Platform,
    R: Reporter,
{
    session.run(stop, |packet| recorder.on_packet(packet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::RawFrame;
    use crate::endpoint::tests::udp_frame;
    use std::collections::VecDeque;
    use std::time::Duration;
    use std::time::UNIX_EPOCH;

    enum Step {
        Frame(Vec<u8>),
        Timeout,
        Fail,
    }

    struct Script {
        steps: VecDeque<Step>,
        current: Vec<u8>,
        link: LinkType,
        stop: &'static AtomicBool,
    }

    impl Script {
        fn new(steps: Vec<Step>, stop: &'static AtomicBool) -> Script {
            Script {
                steps: steps.into(),
                current: Vec::new(),
                link: LinkType::ETHERNET,
                stop,
            }
        }
    }

    impl CaptureEngine for Script {
        fn next_frame(&mut self) -> Result<Option<RawFrame<'_>>, SensorcapError> {
            match self.steps.pop_front() {
                Some(Step::Frame(data)) => {
                    self.current = data;
                    Ok(Some(RawFrame {
                        ts: UNIX_EPOCH + Duration::from_micros(1_700_000_000_000_123),
                        data: &self.current,
                        original_len: self.current.len(),
                    }))
                }
                Some(Step::Timeout) => Ok(None),
                Some(Step::Fail) => Err(SensorcapError::CapturePacketError {
                    e: String::from("interface went down"),
                }),
                None => {
                    self.stop.store(true, Ordering::Relaxed);
                    Ok(None)
                }
            }
        }
        fn interface_name(&self) -> &str {
            "test0"
        }
        fn link_type(&self) -> LinkType {
            self.link
        }
    }

    fn leak_flag() -> &'static AtomicBool {
        Box::leak(Box::new(AtomicBool::new(false)))
    }

    fn lidar() -> Vec<u8> {
        udp_frame([192, 168, 1, 201], 2368, [255, 255, 255, 255], 2368, &[0xaa; 64])
    }

    #[test]
    fn state_walk() {
        let stop = leak_flag();
        let engine = Script::new(vec![Step::Frame(lidar()), Step::Timeout], stop);
        let mut session = Session::open(engine, &SessionConfig::default()).unwrap();
        assert_eq!(session.state(), SessionState::Opened);
        let mut n = 0;
        session
            .run(stop, |_| {
                n += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(session.state(), SessionState::Stopped);
        // a stopped session can not be restarted
        assert!(matches!(
            session.run(stop, |_| Ok(())),
            Err(SensorcapError::InvalidState {
                from: SessionState::Stopped,
                to: SessionState::Running
            })
        ));
        let stats = session.close().unwrap();
        assert_eq!(stats.seen, 1);
        assert_eq!(stats.delivered, 1);
    }

    #[test]
    fn close_requires_stop() {
        let stop = leak_flag();
        let session = Session::open(Script::new(vec![], stop), &SessionConfig::default()).unwrap();
        assert!(matches!(
            session.close(),
            Err(SensorcapError::InvalidState {
                from: SessionState::Opened,
                to: SessionState::Closed
            })
        ));
    }

    #[test]
    fn open_rejects_bad_filters_and_links() {
        let stop = leak_flag();
        let cfg = |f: &str| SessionConfig {
            filter: f.to_string(),
            ..SessionConfig::default()
        };
        assert!(matches!(
            Session::open(Script::new(vec![], stop), &cfg("src")),
            Err(SensorcapError::FilterSyntax { .. })
        ));
        assert!(matches!(
            Session::open(Script::new(vec![], stop), &cfg("port 2368 and")),
            Err(SensorcapError::FilterInstall { .. })
        ));
        let mut engine = Script::new(vec![], stop);
        engine.link = LinkType::RAW;
        assert!(matches!(
            Session::open(engine, &SessionConfig::default()),
            Err(SensorcapError::UnsupportedLinkLayer { .. })
        ));
    }

    #[test]
    fn frames_are_cut_to_snaplen() {
        let stop = leak_flag();
        let engine = Script::new(vec![Step::Frame(lidar())], stop);
        let cfg = SessionConfig {
            snaplen: 40,
            filter: String::new(),
        };
        let mut session = Session::open(engine, &cfg).unwrap();
        let mut seen = Vec::new();
        session
            .run(stop, |p| {
                seen.push((p.captured_len, p.original_len, p.data.len(), p.ts_sec, p.ts_usec));
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![(40, 106, 40, 1_700_000_000, 123)]);
    }

    #[test]
    fn engine_error_stops_session() {
        let stop = leak_flag();
        let engine = Script::new(vec![Step::Frame(lidar()), Step::Fail, Step::Frame(lidar())], stop);
        let mut session = Session::open(engine, &SessionConfig::default()).unwrap();
        let mut n = 0;
        let ret = session.run(stop, |_| {
            n += 1;
            Ok(())
        });
        assert!(matches!(ret, Err(SensorcapError::CapturePacketError { .. })));
        assert_eq!(n, 1);
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.close().is_ok());
    }

    #[test]
    fn callback_error_stops_session() {
        let stop = leak_flag();
        let engine = Script::new(vec![Step::Frame(lidar()), Step::Frame(lidar())], stop);
        let mut session = Session::open(engine, &SessionConfig::default()).unwrap();
        let ret = session.run(stop, |_| {
            Err(SensorcapError::Io(std::io::Error::other("disk full")))
        });
        assert!(matches!(ret, Err(SensorcapError::Io(_))));
        assert_eq!(session.stats().delivered, 1);
    }

    #[test]
    fn stop_flag_checked_before_reading() {
        let stop = leak_flag();
        stop.store(true, Ordering::Relaxed);
        let engine = Script::new(vec![Step::Frame(lidar())], stop);
        let mut session = Session::open(engine, &SessionConfig::default()).unwrap();
        session.run(stop, |_| panic!("no packet expected")).unwrap();
        assert_eq!(session.stats().seen, 0);
    }

    #[test]
    fn filter_counts_rejections() {
        let stop = leak_flag();
        let other = udp_frame([192, 168, 1, 50], 2368, [255, 255, 255, 255], 2368, &[]);
        let engine = Script::new(
            vec![Step::Frame(other.clone()), Step::Frame(lidar()), Step::Frame(other)],
            stop,
        );
        let cfg = SessionConfig {
            filter: String::from("src 192.168.1.201 and port 2368"),
            ..SessionConfig::default()
        };
        let mut session = Session::open(engine, &cfg).unwrap();
        let mut srcs = Vec::new();
        session
            .run(stop, |p| {
                srcs.push(p.data[26..30].to_vec());
                Ok(())
            })
            .unwrap();
        assert_eq!(srcs, vec![vec![192, 168, 1, 201]]);
        let stats = session.stats();
        assert_eq!((stats.seen, stats.filtered, stats.delivered), (3, 2, 1));
    }
}
