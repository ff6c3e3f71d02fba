//! Device host: owns the link and the two engine threads.
//!
//! ```text
//!  serial port ──► [I/O thread] FrameSynchronizer ─► Packet::decode ─► InboundQueue
//!                                                                         │
//!  listeners ◄── SampleBatcher ◄── PacketDispatcher [dispatch thread] ◄───┘
//!
//!  application ──► CommandSender ──► Transport (single write lock)
//! ```
//!
//! The I/O thread only frames and decodes, so a slow listener on the dispatch
//! thread can never stall reads from the port. When the queue fills up the
//! reader blocks rather than dropping packets.
//!
//! # Example
//! ```ignore
//! let host = DeviceHost::open_serial(HostConfig::for_port("/dev/ttyUSB0"), Arc::new(NoEvents));
//! host.connect()?;                       // also sends GET_CONFIG
//! // ... wait for on_device_identified ...
//! host.register_channel_listener(0, &plot)?;
//! host.send_command(Command::StartTransmission)?;
//! ```

use std::fs;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::batcher::{listener_ref, ChannelListener, ListenerRef, BATCH_SIZE};
use crate::dispatcher::{Device, DeviceEvents, PacketDispatcher, Registration, SharedDevice};
use crate::errors::{DriverError, Result};
use crate::framing::FrameSynchronizer;
use crate::packet::{Command, Packet};
use crate::queue::{InboundQueue, DEFAULT_CAPACITY};
use crate::transport::{ByteStream, LinkConfig, SerialTransport, Transport};

// ============================================================================
// Configuration
// ============================================================================

/// Engine settings. Every field has a default, so partial JSON files load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub link: LinkConfig,
    /// Packets buffered between the I/O and dispatch threads.
    pub queue_capacity: usize,
    /// Values per flushed channel batch.
    pub batch_size: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            link: LinkConfig::default(),
            queue_capacity: DEFAULT_CAPACITY,
            batch_size: BATCH_SIZE,
        }
    }
}

impl HostConfig {
    pub fn for_port(port: impl Into<String>) -> Self {
        Self {
            link: LinkConfig::new(port),
            ..Self::default()
        }
    }

    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Counters for link health, cumulative over the host's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Frames extracted from the byte stream (decodable or not).
    pub frames: u64,
    /// Bytes skipped while looking for a frame marker.
    pub noise_bytes: u64,
    /// Frames dropped because they failed to decode.
    pub decode_errors: u64,
    /// Data packets ignored because no device had been identified.
    pub dropped_before_config: u64,
    /// Channel batches flushed.
    pub batches_flushed: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    frames: AtomicU64,
    noise_bytes: AtomicU64,
    decode_errors: AtomicU64,
    dropped_before_config: AtomicU64,
    batches_flushed: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> LinkStats {
        LinkStats {
            frames: self.frames.load(Ordering::Relaxed),
            noise_bytes: self.noise_bytes.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            dropped_before_config: self.dropped_before_config.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
        }
    }

    fn record_dispatch(&self, dispatcher: &PacketDispatcher) {
        self.dropped_before_config
            .store(dispatcher.dropped_before_config(), Ordering::Relaxed);
        self.batches_flushed
            .store(dispatcher.batcher().flushed(), Ordering::Relaxed);
    }
}

// ============================================================================
// Link State
// ============================================================================

/// Transport plus connection/transmission flags, shared by the command path
/// and the I/O thread.
struct Link {
    transport: Mutex<Box<dyn Transport>>,
    up: AtomicBool,
    transmitting: AtomicBool,
    recording: AtomicBool,
    events: Arc<dyn DeviceEvents>,
}

impl Link {
    fn transport(&self) -> MutexGuard<'_, Box<dyn Transport>> {
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_connected(&self) -> bool {
        self.up.load(Ordering::SeqCst) && self.transport().is_open()
    }

    /// Clear the recording flag; fires the hook if a recording was active.
    fn stop_recording(&self) -> bool {
        let was_recording = self.recording.swap(false, Ordering::SeqCst);
        if was_recording {
            info!("recording stopped");
            self.events.on_recording_stopped();
        }
        was_recording
    }

    /// Mark the link as failed. Only the first caller closes the port and
    /// notifies the application.
    fn lose(&self, err: &DriverError) {
        if !self.up.swap(false, Ordering::SeqCst) {
            return;
        }
        error!("serial link lost: {}", err);
        self.transport().close();
        self.stop_recording();
        self.transmitting.store(false, Ordering::SeqCst);
        self.events.on_link_lost(err);
    }
}

// ============================================================================
// Command Sender
// ============================================================================

/// Validates and writes outbound commands. Cheap to clone; usable from any thread.
#[derive(Clone)]
pub struct CommandSender {
    link: Arc<Link>,
    device: SharedDevice,
}

impl CommandSender {
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Check preconditions, encode and write `command`.
    ///
    /// # Errors
    /// - [`DriverError::NotConnected`] if the link is not open (nothing is written)
    /// - [`DriverError::InvalidState`] for a reboot while disconnected, or a
    ///   start before the device has identified itself
    /// - transport errors from the write; the link is then marked lost
    pub fn send(&self, command: Command) -> Result<()> {
        self.check_preconditions(command)?;

        if command == Command::StopTransmission {
            self.link.stop_recording();
        }

        self.write(&command.encode())?;

        match command {
            Command::StartTransmission => self.link.transmitting.store(true, Ordering::SeqCst),
            Command::StopTransmission | Command::Reboot => {
                self.link.transmitting.store(false, Ordering::SeqCst)
            }
            Command::GetConfig => {}
        }
        debug!("sent command {:?}", command);
        Ok(())
    }

    fn check_preconditions(&self, command: Command) -> Result<()> {
        let connected = self.link.is_connected();
        match command {
            Command::Reboot if !connected => Err(DriverError::InvalidState(
                "cannot reboot: device not connected".into(),
            )),
            _ if !connected => Err(DriverError::NotConnected),
            Command::StartTransmission if current_device(&self.device).is_none() => {
                Err(DriverError::InvalidState(
                    "cannot start transmission: device not identified yet".into(),
                ))
            }
            _ => Ok(()),
        }
    }

    fn write(&self, bytes: &[u8]) -> Result<()> {
        let result = {
            let mut transport = self.link.transport();
            if !self.link.up.load(Ordering::SeqCst) || !transport.is_open() {
                return Err(DriverError::NotConnected);
            }
            transport.write_all(bytes)
        };
        if let Err(err) = &result {
            self.link.lose(err);
        }
        result
    }
}

fn current_device(shared: &SharedDevice) -> Option<Device> {
    *shared.read().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Device Host
// ============================================================================

/// Threads and queue of one connection.
struct Session {
    queue: InboundQueue,
    reader: Option<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<PacketDispatcher>>,
}

/// Handle to the protocol engine. Share it behind an `Arc`; every method takes `&self`.
pub struct DeviceHost {
    config: HostConfig,
    sender: CommandSender,
    events: Arc<dyn DeviceEvents>,
    registrations_tx: Sender<Registration>,
    registrations_rx: Receiver<Registration>,
    // Parked here between connections so listeners survive a reconnect.
    dispatcher: Mutex<Option<PacketDispatcher>>,
    session: Mutex<Option<Session>>,
    stats: Arc<StatsCounters>,
}

impl DeviceHost {
    pub fn new(
        transport: Box<dyn Transport>,
        config: HostConfig,
        events: Arc<dyn DeviceEvents>,
    ) -> Self {
        let (registrations_tx, registrations_rx) = unbounded();
        let link = Arc::new(Link {
            transport: Mutex::new(transport),
            up: AtomicBool::new(false),
            transmitting: AtomicBool::new(false),
            recording: AtomicBool::new(false),
            events: Arc::clone(&events),
        });
        let sender = CommandSender {
            link,
            device: SharedDevice::default(),
        };

        Self {
            config,
            sender,
            events,
            registrations_tx,
            registrations_rx,
            dispatcher: Mutex::new(None),
            session: Mutex::new(None),
            stats: Arc::new(StatsCounters::default()),
        }
    }

    /// Host over the serial port named in `config.link`.
    pub fn open_serial(config: HostConfig, events: Arc<dyn DeviceEvents>) -> Self {
        let transport = SerialTransport::new(config.link.clone());
        Self::new(Box::new(transport), config, events)
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// A sender sharing this host's link, for threads that only issue commands.
    pub fn command_sender(&self) -> CommandSender {
        self.sender.clone()
    }

    // ------------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------------

    /// Open the link, start the engine threads and request the device config.
    ///
    /// Connecting while already connected is a no-op.
    pub fn connect(&self) -> Result<()> {
        if self.is_connected() {
            warn!("device is already connected");
            return Ok(());
        }
        // A previous session may have ended through link loss.
        self.teardown();

        let link = &self.sender.link;
        let stream = link.transport().open()?;
        link.up.store(true, Ordering::SeqCst);

        if let Err(err) = self.start_session(stream) {
            link.up.store(false, Ordering::SeqCst);
            link.transport().close();
            return Err(err);
        }

        info!("connected to {}", link.transport().name());
        self.sender.send(Command::GetConfig)
    }

    fn start_session(&self, stream: ByteStream) -> Result<()> {
        let queue = InboundQueue::bounded(self.config.queue_capacity);
        let dispatcher = self
            .lock_dispatcher()
            .take()
            .unwrap_or_else(|| self.new_dispatcher());

        let reader = {
            let ctx = ReaderContext {
                link: Arc::clone(&self.sender.link),
                queue: queue.clone(),
                stats: Arc::clone(&self.stats),
                events: Arc::clone(&self.events),
                chunk_size: self.config.link.read_chunk_size.max(1),
            };
            thread::Builder::new()
                .name("biolink-io".into())
                .spawn(move || read_loop(stream, ctx))?
        };

        let dispatch = {
            let queue = queue.clone();
            let stats = Arc::clone(&self.stats);
            thread::Builder::new()
                .name("biolink-dispatch".into())
                .spawn(move || dispatch_loop(dispatcher, queue, stats))
        };
        let dispatch = match dispatch {
            Ok(handle) => handle,
            Err(err) => {
                self.sender.link.up.store(false, Ordering::SeqCst);
                queue.shutdown();
                let _ = reader.join();
                return Err(err.into());
            }
        };

        *self.lock_session() = Some(Session {
            queue,
            reader: Some(reader),
            dispatcher: Some(dispatch),
        });
        Ok(())
    }

    /// Stop transmission and recording, stop the threads and close the port.
    ///
    /// Packets still queued are discarded.
    pub fn disconnect(&self) -> Result<()> {
        if !self.is_connected() {
            warn!("device is already disconnected");
            self.teardown();
            return Ok(());
        }

        self.sender.link.stop_recording();
        if self.is_transmitting() {
            if let Err(err) = self.sender.send(Command::StopTransmission) {
                warn!("failed to stop transmission before disconnect: {}", err);
            }
        }

        self.teardown();
        info!("disconnected from device");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.sender.is_connected()
    }

    fn teardown(&self) {
        let link = &self.sender.link;
        link.up.store(false, Ordering::SeqCst);
        link.transmitting.store(false, Ordering::SeqCst);
        link.transport().close();

        // Take the session out before joining so a listener calling back into
        // the host cannot deadlock on the session lock.
        let Some(mut session) = self.lock_session().take() else {
            return;
        };
        session.queue.shutdown();

        if let Some(reader) = session.reader.take() {
            if reader.thread().id() == thread::current().id() {
                // Called from `on_link_lost`; the I/O thread exits once the hook returns.
                debug!("disconnect requested from the I/O thread");
            } else if reader.join().is_err() {
                error!("I/O thread panicked");
            }
        }
        if let Some(dispatch) = session.dispatcher.take() {
            if dispatch.thread().id() == thread::current().id() {
                // Called from a listener; the dispatch thread exits on its own
                // and its dispatcher is not parked, so the identity goes with it.
                debug!("disconnect requested from the dispatch thread");
                self.forget_device();
                return;
            }
            match dispatch.join() {
                Ok(dispatcher) => *self.lock_dispatcher() = Some(dispatcher),
                Err(_) => error!("dispatch thread panicked"),
            }
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Send a control command. After a reboot the host disconnects.
    pub fn send_command(&self, command: Command) -> Result<()> {
        self.sender.send(command)?;
        if command == Command::Reboot {
            info!("device rebooting; disconnecting");
            self.teardown();
        }
        Ok(())
    }

    pub fn is_transmitting(&self) -> bool {
        self.sender.link.transmitting.load(Ordering::SeqCst)
    }

    /// Mark a recording as active. Requires an identified device and active transmission.
    pub fn start_recording(&self) -> Result<()> {
        if self.device().is_none() {
            return Err(DriverError::InvalidState(
                "cannot record: device not identified".into(),
            ));
        }
        if !self.is_transmitting() {
            return Err(DriverError::InvalidState(
                "cannot record: transmission not started".into(),
            ));
        }
        if self.sender.link.recording.swap(true, Ordering::SeqCst) {
            warn!("recording is already in progress");
        } else {
            info!("recording started");
        }
        Ok(())
    }

    pub fn stop_recording(&self) -> Result<()> {
        if !self.sender.link.stop_recording() {
            return Err(DriverError::InvalidState("no recording in progress".into()));
        }
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.sender.link.recording.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------------
    // Device and listeners
    // ------------------------------------------------------------------------

    /// The most recently identified device, if any.
    pub fn device(&self) -> Option<Device> {
        current_device(&self.sender.device)
    }

    pub fn channel_count(&self) -> Option<u8> {
        self.device().map(|d| d.channel_count)
    }

    /// Register `listener` for batches on `channel`.
    ///
    /// Only a weak reference is kept: the registration lapses once the caller
    /// drops its `Arc`. Registrations are cleared whenever a device with a
    /// different serial number is identified.
    pub fn register_channel_listener<L>(&self, channel: u8, listener: &Arc<L>) -> Result<()>
    where
        L: ChannelListener + 'static,
    {
        let device = self.check_channel(channel)?;
        self.queue_registration(device, channel, Some(listener_ref(listener)))
    }

    pub fn clear_channel_listener(&self, channel: u8) -> Result<()> {
        let device = self.check_channel(channel)?;
        self.queue_registration(device, channel, None)
    }

    fn check_channel(&self, channel: u8) -> Result<Device> {
        let device = self.device().ok_or_else(|| {
            DriverError::InvalidState("no device identified; wait for its config".into())
        })?;
        if channel >= device.channel_count {
            return Err(DriverError::ChannelOutOfRange {
                channel,
                channel_count: device.channel_count,
            });
        }
        Ok(device)
    }

    fn queue_registration(
        &self,
        device: Device,
        channel: u8,
        listener: Option<ListenerRef>,
    ) -> Result<()> {
        let registration = Registration {
            serial_number: device.serial_number,
            channel,
            listener,
        };
        self.registrations_tx
            .send(registration)
            .map_err(|_| DriverError::QueueClosed)
    }

    pub fn stats(&self) -> LinkStats {
        self.stats.snapshot()
    }

    fn new_dispatcher(&self) -> PacketDispatcher {
        // A fresh dispatcher has not seen a config packet yet.
        self.forget_device();
        PacketDispatcher::new(
            Arc::clone(&self.events),
            self.registrations_rx.clone(),
            Arc::clone(&self.sender.device),
            self.config.batch_size,
        )
    }

    fn forget_device(&self) {
        *self
            .sender
            .device
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_dispatcher(&self) -> MutexGuard<'_, Option<PacketDispatcher>> {
        self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for DeviceHost {
    fn drop(&mut self) {
        self.teardown();
    }
}

// ============================================================================
// Engine Threads
// ============================================================================

struct ReaderContext {
    link: Arc<Link>,
    queue: InboundQueue,
    stats: Arc<StatsCounters>,
    events: Arc<dyn DeviceEvents>,
    chunk_size: usize,
}

fn read_loop(mut stream: ByteStream, ctx: ReaderContext) {
    debug!("I/O thread started");
    let mut sync = FrameSynchronizer::new();
    let mut buf = vec![0u8; ctx.chunk_size];

    let failure = 'read: loop {
        if !ctx.link.up.load(Ordering::SeqCst) {
            break None;
        }

        let n = match stream.read(&mut buf) {
            Ok(0) => continue,
            Ok(n) => n,
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                continue
            }
            Err(e) => break Some(DriverError::from(e)),
        };

        let skipped = sync.skipped();
        let frames = sync.push(&buf[..n]);
        ctx.stats
            .noise_bytes
            .fetch_add(sync.skipped() - skipped, Ordering::Relaxed);

        for frame in frames {
            ctx.stats.frames.fetch_add(1, Ordering::Relaxed);
            match Packet::decode(&frame) {
                Ok(packet) => {
                    if ctx.queue.push(packet).is_err() {
                        break 'read None;
                    }
                }
                Err(err) => {
                    warn!("dropping frame (type {:#04X}): {}", frame.kind(), err);
                    ctx.stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                    ctx.events.on_decode_error(&err);
                }
            }
        }
    };

    ctx.queue.shutdown();
    if let Some(err) = failure {
        ctx.link.lose(&err);
    }
    debug!("I/O thread stopped");
}

fn dispatch_loop(
    mut dispatcher: PacketDispatcher,
    queue: InboundQueue,
    stats: Arc<StatsCounters>,
) -> PacketDispatcher {
    debug!("dispatch thread started");
    while let Some(packet) = queue.pop() {
        dispatcher.dispatch(packet);
        stats.record_dispatch(&dispatcher);
    }
    debug!("dispatch thread stopped");
    dispatcher
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::NoEvents;
    use std::io;

    /// Reader that never produces data.
    struct Silent;

    impl Read for Silent {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            std::thread::sleep(std::time::Duration::from_millis(5));
            Err(io::ErrorKind::TimedOut.into())
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        open: bool,
        written: Arc<Mutex<Vec<Vec<u8>>>>,
        fail_writes: bool,
    }

    impl Transport for RecordingTransport {
        fn open(&mut self) -> Result<ByteStream> {
            self.open = true;
            Ok(Box::new(Silent))
        }

        fn close(&mut self) {
            self.open = false;
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged").into());
            }
            self.written.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }
    }

    fn host() -> (DeviceHost, Arc<Mutex<Vec<Vec<u8>>>>) {
        let transport = RecordingTransport::default();
        let written = Arc::clone(&transport.written);
        let host = DeviceHost::new(Box::new(transport), HostConfig::default(), Arc::new(NoEvents));
        (host, written)
    }

    fn identify(host: &DeviceHost) {
        *host.sender.device.write().unwrap() = Some(Device {
            serial_number: 7,
            channel_count: 2,
        });
    }

    #[test]
    fn start_when_disconnected_writes_nothing() {
        let (host, written) = host();
        let err = host.send_command(Command::StartTransmission).unwrap_err();
        assert!(matches!(err, DriverError::NotConnected));
        assert!(written.lock().unwrap().is_empty());
    }

    #[test]
    fn reboot_when_disconnected_is_invalid_state() {
        let (host, _) = host();
        let err = host.send_command(Command::Reboot).unwrap_err();
        assert!(matches!(err, DriverError::InvalidState(_)));
    }

    #[test]
    fn connect_requests_config() {
        let (host, written) = host();
        assert_eq!(host.config().batch_size, BATCH_SIZE);
        host.connect().unwrap();
        assert!(host.is_connected());
        assert_eq!(written.lock().unwrap().as_slice(), &[Command::GetConfig.encode()]);
        host.disconnect().unwrap();
        assert!(!host.is_connected());
    }

    #[test]
    fn start_requires_identified_device() {
        let (host, written) = host();
        host.connect().unwrap();
        let err = host.send_command(Command::StartTransmission).unwrap_err();
        assert!(matches!(err, DriverError::InvalidState(_)));

        identify(&host);
        host.send_command(Command::StartTransmission).unwrap();
        assert!(host.is_transmitting());
        assert_eq!(written.lock().unwrap().len(), 2);
    }

    #[test]
    fn stop_transmission_ends_recording_first() {
        let (host, written) = host();
        host.connect().unwrap();
        identify(&host);

        assert!(host.start_recording().is_err());
        host.send_command(Command::StartTransmission).unwrap();
        host.start_recording().unwrap();
        assert!(host.is_recording());

        host.send_command(Command::StopTransmission).unwrap();
        assert!(!host.is_recording());
        assert!(!host.is_transmitting());
        assert!(host.stop_recording().is_err());
        assert_eq!(
            written.lock().unwrap().last(),
            Some(&Command::StopTransmission.encode())
        );
    }

    #[test]
    fn disconnect_stops_active_transmission() {
        let (host, written) = host();
        host.connect().unwrap();
        identify(&host);
        host.send_command(Command::StartTransmission).unwrap();

        host.disconnect().unwrap();
        assert_eq!(
            written.lock().unwrap().last(),
            Some(&Command::StopTransmission.encode())
        );
        assert!(!host.is_transmitting());
    }

    #[test]
    fn reboot_disconnects() {
        let (host, written) = host();
        host.connect().unwrap();
        host.send_command(Command::Reboot).unwrap();
        assert!(!host.is_connected());
        assert_eq!(written.lock().unwrap().last(), Some(&Command::Reboot.encode()));
    }

    #[test]
    fn write_failure_marks_link_lost() {
        let transport = RecordingTransport {
            fail_writes: true,
            ..Default::default()
        };
        let host = DeviceHost::new(Box::new(transport), HostConfig::default(), Arc::new(NoEvents));
        assert!(host.connect().is_err());
        assert!(!host.is_connected());
        // Idempotent afterwards.
        host.disconnect().unwrap();
    }

    #[test]
    fn listener_registration_requires_device() {
        let (host, _) = host();
        let listener = Arc::new(|_: u8, _: &[i32]| {});
        assert!(matches!(
            host.register_channel_listener(0, &listener),
            Err(DriverError::InvalidState(_))
        ));

        identify(&host);
        host.register_channel_listener(1, &listener).unwrap();
        assert!(matches!(
            host.register_channel_listener(2, &listener),
            Err(DriverError::ChannelOutOfRange {
                channel: 2,
                channel_count: 2
            })
        ));
    }

    #[test]
    fn config_file_defaults() {
        let config: HostConfig =
            serde_json::from_str(r#"{"link": {"port": "COM3"}, "queue_capacity": 16}"#).unwrap();
        assert_eq!(config.link.port, "COM3");
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.batch_size, BATCH_SIZE);
    }
}
