//! H.264 encoder state machine
//!
//! [`H264Encoder`] drives an opaque hardware backend through a pull-model
//! protocol: the driver thread configures, starts and polls the encoder,
//! the backend pulls packed input buffers through [`FrameSource::on_read`]
//! on its own threads and hands them back through
//! [`BufferReturnObserver::on_buffer_returned`] once encoded.
//!
//! Lifecycle is strictly `Unconfigured -> Configured -> Running ->
//! Stopped`, with `Stopped` terminal. The only blocking point is the
//! frame queue inside `on_read`; `stop` closes the queue before
//! stopping the backend so a backend joining its reader thread cannot
//! deadlock against a blocked read.

mod pending;
mod stats;

pub use stats::EncoderStats;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::backend::{
    format_keys, metadata_buffer_type, BufferReturnObserver, EncoderBackend, FrameSource,
    InputBuffer, MediaFormat, SourceReadError, BITRATE_MODE_CONSTANT, COLOR_FORMAT_OPAQUE,
    H264_MIME_TYPE, RAW_MIME_TYPE,
};
use crate::config::EncoderConfig;
use crate::convert::{rgb_to_yuv420p, yuv420p_len};
use crate::error::{EncoderError, EncoderResult};
use crate::frame::{OutputBuffer, VideoFrame};
use crate::queue::FrameQueue;
use crate::sink::{EncoderDelegate, EncoderReport};

use pending::PendingBuffers;
use stats::StatsCounters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unconfigured,
    Configured,
    Running,
    Stopped,
}

/// Build the backend output format from an accepted configuration.
///
/// Keys are written in a fixed order and passed through verbatim. The
/// store-metadata keys depend on the input mode: readout marks the input
/// as plain converted pixels, passthrough marks it as wrapped native
/// window buffers. Profile, level and constraint-set are advisory and
/// only set when positive.
fn build_output_format(config: &EncoderConfig, readout: bool) -> MediaFormat {
    let metadata_type = if readout {
        metadata_buffer_type::INVALID
    } else {
        metadata_buffer_type::NATIVE_WINDOW_BUFFER
    };

    let mut format = MediaFormat::new();
    format.set_str(format_keys::MIME, H264_MIME_TYPE);
    format.set_i32(format_keys::STORE_METADATA_IN_BUFFERS, metadata_type);
    format.set_i32(format_keys::STORE_METADATA_IN_BUFFERS_OUTPUT, 0);
    format.set_i32(format_keys::INPUT_METADATA_BUFFER_TYPE, metadata_type);
    format.set_i32(format_keys::ANDROID_STORE_METADATA_IN_BUFFERS_OUTPUT, 0);
    format.set_i32(format_keys::WIDTH, config.width as i32);
    format.set_i32(format_keys::HEIGHT, config.height as i32);
    format.set_i32(format_keys::STRIDE, config.width as i32);
    format.set_i32(format_keys::SLICE_HEIGHT, config.height as i32);
    format.set_i32(format_keys::COLOR_FORMAT, COLOR_FORMAT_OPAQUE);
    format.set_i32(format_keys::BITRATE, config.bitrate as i32);
    format.set_i32(format_keys::BITRATE_MODE, BITRATE_MODE_CONSTANT);
    format.set_i32(format_keys::FRAMERATE, config.framerate);
    format.set_i32(format_keys::INTRA_REFRESH_MODE, config.intra_refresh_mode);
    format.set_i32(format_keys::INTRA_REFRESH_CIR_MBS, config.intra_refresh_mbs());

    if config.i_frame_interval_secs > 0 {
        format.set_i32(format_keys::I_FRAME_INTERVAL, config.i_frame_interval_secs);
    }
    if config.profile_idc > 0 {
        format.set_i32(format_keys::PROFILE_IDC, config.profile_idc);
    }
    if config.level_idc > 0 {
        format.set_i32(format_keys::LEVEL_IDC, config.level_idc);
    }
    if config.constraint_set > 0 {
        format.set_i32(format_keys::CONSTRAINT_SET, config.constraint_set);
    }

    format.set_i32(format_keys::PREPEND_SPS_PPS_TO_IDR_FRAMES, 1);
    format
}

/// Build the raw source format. The opaque color format tells the
/// backend to derive the real layout from the incoming buffers itself.
fn build_source_format(config: &EncoderConfig) -> MediaFormat {
    let mut format = MediaFormat::new();
    format.set_str(format_keys::MIME, RAW_MIME_TYPE);
    format.set_i32(format_keys::COLOR_FORMAT, COLOR_FORMAT_OPAQUE);
    format.set_i32(format_keys::WIDTH, config.width as i32);
    format.set_i32(format_keys::HEIGHT, config.height as i32);
    format.set_i32(format_keys::STRIDE, config.width as i32);
    format.set_i32(format_keys::SLICE_HEIGHT, config.height as i32);
    format.set_i32(format_keys::FRAMERATE, config.framerate);
    format
}

/// Shared core: the driver-facing handle and the backend-facing
/// callbacks both operate on this.
struct Inner {
    backend: Arc<dyn EncoderBackend>,
    report: Arc<dyn EncoderReport>,
    delegate: Mutex<Option<Weak<dyn EncoderDelegate>>>,
    readout: bool,
    state: Mutex<State>,
    config: Mutex<Option<EncoderConfig>>,
    // Read from backend threads; published before backend.start() since
    // the backend may pull synchronously from its start path.
    running: AtomicBool,
    queue: FrameQueue,
    pending: Mutex<PendingBuffers>,
    counters: StatsCounters,
    weak_self: Weak<Inner>,
}

impl Inner {
    /// Pack a dequeued frame into a backend input buffer.
    ///
    /// Readout mode converts pixel data into a freshly allocated buffer;
    /// passthrough mode wraps the frame's native handle without copying.
    /// A frame that fits neither mode is refused.
    fn pack_frame(&self, frame: &Arc<dyn VideoFrame>) -> Option<Box<dyn InputBuffer>> {
        let config = self.config.lock().clone()?;

        match frame.native_handle() {
            None if self.readout && !frame.is_empty() => {
                let Some(mut buffer) = self.backend.allocate_buffer(yuv420p_len(
                    config.width,
                    config.height,
                )) else {
                    warn!("input buffer pool exhausted, dropping frame");
                    return None;
                };
                if let Err(error) =
                    rgb_to_yuv420p(frame.data(), buffer.data_mut(), config.width, config.height)
                {
                    warn!(%error, "failed to convert frame, dropping it");
                    return None;
                }
                Some(buffer)
            }
            Some(handle) if !self.readout => match self.backend.wrap_native_handle(handle) {
                Some(buffer) => Some(buffer),
                None => {
                    warn!("input buffer pool exhausted, dropping frame");
                    None
                }
            },
            _ => {
                warn!(
                    readout = self.readout,
                    has_handle = frame.native_handle().is_some(),
                    len = frame.len(),
                    "frame does not fit the configured input mode, dropping it"
                );
                None
            }
        }
    }

    fn drop_frame(&self, frame: Arc<dyn VideoFrame>) {
        self.counters.record_dropped();
        frame.release();
    }
}

impl FrameSource for Inner {
    fn on_start(&self) {
        debug!("backend source started");
    }

    fn on_stop(&self) {
        debug!("backend source stopped");
    }

    fn on_pause(&self) {
        debug!("backend source paused");
    }

    fn on_read(&self) -> Result<Box<dyn InputBuffer>, SourceReadError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(SourceReadError::NotConnected);
        }

        let frame = self.queue.next().ok_or(SourceReadError::EndOfStream)?;
        let timestamp_us = frame.timestamp_us();

        let Some(mut buffer) = self.pack_frame(&frame) else {
            self.drop_frame(frame);
            return Err(SourceReadError::EndOfStream);
        };

        buffer.set_timestamp_us(timestamp_us);
        let observer: Weak<dyn BufferReturnObserver> = self.weak_self.clone();
        buffer.set_return_observer(Some(observer));

        if let Err(error) = self
            .pending
            .lock()
            .track(buffer.id(), Arc::clone(&frame))
        {
            warn!(%error, "refusing to hand out a duplicate buffer id");
            self.drop_frame(frame);
            return Err(SourceReadError::EndOfStream);
        }

        self.counters.record_packed();
        self.report.began_frame(timestamp_us);
        Ok(buffer)
    }
}

impl BufferReturnObserver for Inner {
    fn on_buffer_returned(&self, mut buffer: Box<dyn InputBuffer>) {
        let id = buffer.id();
        let Some(frame) = self.pending.lock().resolve(id) else {
            warn!(%id, "backend returned a buffer that was never handed out");
            return;
        };

        // Clear the observer before the backend buffer goes away so its
        // release cannot re-enter this path, then hand the frame back to
        // its producer.
        buffer.set_return_observer(None);
        drop(buffer);
        frame.release();
    }
}

/// Hardware-backed H.264 encoding pipeline.
///
/// Single driver thread for `configure`/`start`/`stop`/`execute`;
/// [`H264Encoder::queue_buffer`] may be called concurrently from the
/// frame producer.
pub struct H264Encoder {
    inner: Arc<Inner>,
}

impl H264Encoder {
    /// Create an encoder over the given backend.
    ///
    /// `readout` selects the input-delivery mode: `true` converts frame
    /// pixel data on the CPU, `false` passes native buffer handles
    /// through untouched.
    pub fn new(
        backend: Arc<dyn EncoderBackend>,
        report: Arc<dyn EncoderReport>,
        readout: bool,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak_self| Inner {
            backend,
            report,
            delegate: Mutex::new(None),
            readout,
            state: Mutex::new(State::Unconfigured),
            config: Mutex::new(None),
            running: AtomicBool::new(false),
            queue: FrameQueue::new(),
            pending: Mutex::new(PendingBuffers::new()),
            counters: StatsCounters::default(),
            weak_self: weak_self.clone(),
        });
        Self { inner }
    }

    /// Name used for report and diagnostic labeling.
    pub fn name(&self) -> &'static str {
        "H264Encoder"
    }

    /// Register the consumer of encoded output. Held weakly; a dropped
    /// delegate ends delivery without error.
    pub fn set_delegate(&self, delegate: &Arc<dyn EncoderDelegate>) {
        *self.inner.delegate.lock() = Some(Arc::downgrade(delegate));
    }

    /// The accepted configuration, if any.
    pub fn configuration(&self) -> Option<EncoderConfig> {
        self.inner.config.lock().clone()
    }

    /// Snapshot of the pipeline counters.
    pub fn stats(&self) -> EncoderStats {
        self.inner.counters.snapshot()
    }

    /// Build the backend session from the configuration.
    ///
    /// A backend failure leaves the encoder unconfigured with no partial
    /// state behind.
    pub fn configure(&self, config: EncoderConfig) -> EncoderResult<()> {
        let mut state = self.inner.state.lock();
        match *state {
            State::Unconfigured => {}
            State::Stopped => return Err(EncoderError::Stopped),
            State::Configured | State::Running => return Err(EncoderError::AlreadyConfigured),
        }

        debug!(
            width = config.width,
            height = config.height,
            framerate = config.framerate,
            bitrate = config.bitrate,
            "configuring encoder"
        );

        let format = build_output_format(&config, self.inner.readout);
        let source_format = build_source_format(&config);
        let source: Arc<dyn FrameSource> = self
            .inner
            .weak_self
            .upgrade()
            .ok_or(EncoderError::Stopped)?;

        self.inner
            .backend
            .create_session(format, source_format, source)?;

        *self.inner.config.lock() = Some(config);
        *state = State::Configured;
        debug!("encoder configured");
        Ok(())
    }

    /// Start the backend.
    ///
    /// `running` is published before the backend start call because the
    /// backend may pull input synchronously from its start path; it is
    /// rolled back if the backend refuses to start.
    pub fn start(&self) -> EncoderResult<()> {
        let mut state = self.inner.state.lock();
        match *state {
            State::Configured => {}
            State::Unconfigured => return Err(EncoderError::NotConfigured),
            State::Running => return Err(EncoderError::AlreadyRunning),
            State::Stopped => return Err(EncoderError::Stopped),
        }

        self.inner.running.store(true, Ordering::Release);
        if let Err(error) = self.inner.backend.start() {
            self.inner.running.store(false, Ordering::Release);
            warn!(%error, "backend refused to start");
            return Err(error.into());
        }

        *state = State::Running;
        self.inner.report.started();
        Ok(())
    }

    /// Stop the backend. Terminal: a stopped encoder cannot be restarted.
    ///
    /// The frame queue is closed first so a backend blocked in its pull
    /// callback wakes with end-of-stream before the backend joins its
    /// reader threads. Unconsumed frames are only released back to the
    /// producer once the backend stop succeeds; on failure the encoder
    /// stays running and a later stop or drop returns them.
    pub fn stop(&self) -> EncoderResult<()> {
        let mut state = self.inner.state.lock();
        if *state != State::Running {
            return Err(EncoderError::NotRunning);
        }

        self.inner.queue.close();
        self.inner.backend.stop()?;

        for frame in self.inner.queue.teardown() {
            self.inner.drop_frame(frame);
        }

        self.inner.running.store(false, Ordering::Release);
        *state = State::Stopped;
        self.inner.report.stopped();
        debug!(
            in_flight = self.inner.pending.lock().len(),
            stats = ?self.inner.counters.snapshot(),
            "encoder stopped"
        );
        Ok(())
    }

    /// Pull one encoded buffer from the backend and deliver it.
    ///
    /// One backend read per call; the driver owns the polling cadence. A
    /// codec-configuration buffer is delivered through the dedicated
    /// delegate entry point first and then through the normal one.
    pub fn execute(&self) -> EncoderResult<()> {
        if !self.inner.running.load(Ordering::Acquire) {
            return Err(EncoderError::NotRunning);
        }

        let encoded = match self.inner.backend.read_output() {
            Ok(encoded) => encoded,
            Err(error) => {
                warn!(%error, "failed to read encoded output");
                return Err(error.into());
            }
        };

        let buffer = OutputBuffer::new(
            Bytes::copy_from_slice(encoded.data()),
            encoded.timestamp_us(),
            encoded.is_codec_config(),
        );

        self.inner.counters.record_encoded(buffer.codec_config);
        self.inner.report.finished_frame(buffer.timestamp_us);

        let delegate = self.inner.delegate.lock().clone();
        if let Some(delegate) = delegate.and_then(|weak| weak.upgrade()) {
            if buffer.codec_config {
                delegate.on_buffer_with_codec_config(&buffer);
            }
            delegate.on_buffer_available(&buffer);
        }

        Ok(())
    }

    /// Hand a frame to the encoder. Frames queued while not running are
    /// released back to the producer immediately.
    pub fn queue_buffer(&self, frame: Arc<dyn VideoFrame>) {
        if !self.inner.running.load(Ordering::Acquire) {
            trace!(
                timestamp_us = frame.timestamp_us(),
                "dropping frame queued while not running"
            );
            self.inner.drop_frame(frame);
            return;
        }

        let timestamp_us = frame.timestamp_us();
        let queued = Arc::clone(&frame);
        if self.inner.queue.push(queued) {
            self.inner.counters.record_queued();
            self.inner.report.received_input_buffer(timestamp_us);
        } else {
            self.inner.drop_frame(frame);
        }
    }

    /// Ask the backend for a keyframe at its next opportunity.
    /// Best-effort; no-op while unconfigured.
    pub fn send_idr_frame(&self) {
        if self.inner.config.lock().is_none() {
            return;
        }
        debug!("requesting keyframe");
        self.inner.backend.request_keyframe();
    }
}

impl Drop for H264Encoder {
    fn drop(&mut self) {
        if self.inner.running.load(Ordering::Acquire) {
            if let Err(error) = self.stop() {
                warn!(%error, "failed to stop encoder during teardown");
            }
        }

        // A failed backend stop leaves frames stranded in the closed
        // queue; return them to the producer here.
        for frame in self.inner.queue.teardown() {
            self.inner.drop_frame(frame);
        }

        // The backend may never return buffers it still held; give their
        // frames back to the producer exactly once.
        for frame in self.inner.pending.lock().drain() {
            frame.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, EncodedBuffer};
    use crate::frame::NativeHandle;
    use crate::sink::NullReport;
    use std::sync::atomic::AtomicU32;

    fn config_720p() -> EncoderConfig {
        EncoderConfig {
            framerate: 30,
            ..EncoderConfig::with_resolution(1280, 720)
        }
    }

    #[test]
    fn test_output_format_readout_mode() {
        let format = build_output_format(&config_720p(), true);

        assert_eq!(format.string(format_keys::MIME), Some(H264_MIME_TYPE));
        assert_eq!(
            format.int32(format_keys::STORE_METADATA_IN_BUFFERS),
            Some(metadata_buffer_type::INVALID)
        );
        assert_eq!(
            format.int32(format_keys::INPUT_METADATA_BUFFER_TYPE),
            Some(metadata_buffer_type::INVALID)
        );
        assert_eq!(format.int32(format_keys::STORE_METADATA_IN_BUFFERS_OUTPUT), Some(0));
        assert_eq!(format.int32(format_keys::WIDTH), Some(1280));
        assert_eq!(format.int32(format_keys::HEIGHT), Some(720));
        assert_eq!(format.int32(format_keys::STRIDE), Some(1280));
        assert_eq!(format.int32(format_keys::SLICE_HEIGHT), Some(720));
        assert_eq!(format.int32(format_keys::COLOR_FORMAT), Some(COLOR_FORMAT_OPAQUE));
        assert_eq!(format.int32(format_keys::BITRATE), Some(5_000_000));
        assert_eq!(format.int32(format_keys::BITRATE_MODE), Some(BITRATE_MODE_CONSTANT));
        assert_eq!(format.int32(format_keys::FRAMERATE), Some(30));
        assert_eq!(format.int32(format_keys::INTRA_REFRESH_MODE), Some(0));
        // 80 * 45 macroblocks, 10% per refresh cycle.
        assert_eq!(format.int32(format_keys::INTRA_REFRESH_CIR_MBS), Some(360));
        assert_eq!(format.int32(format_keys::I_FRAME_INTERVAL), Some(15));
        assert_eq!(format.int32(format_keys::PREPEND_SPS_PPS_TO_IDR_FRAMES), Some(1));
    }

    #[test]
    fn test_output_format_passthrough_mode() {
        let format = build_output_format(&config_720p(), false);

        assert_eq!(
            format.int32(format_keys::STORE_METADATA_IN_BUFFERS),
            Some(metadata_buffer_type::NATIVE_WINDOW_BUFFER)
        );
        assert_eq!(
            format.int32(format_keys::INPUT_METADATA_BUFFER_TYPE),
            Some(metadata_buffer_type::NATIVE_WINDOW_BUFFER)
        );
    }

    #[test]
    fn test_output_format_omits_nonpositive_advisory_keys() {
        let mut config = config_720p();
        config.i_frame_interval_secs = 0;
        let format = build_output_format(&config, true);

        assert!(!format.contains(format_keys::I_FRAME_INTERVAL));
        assert!(!format.contains(format_keys::PROFILE_IDC));
        assert!(!format.contains(format_keys::LEVEL_IDC));
        assert!(!format.contains(format_keys::CONSTRAINT_SET));
    }

    #[test]
    fn test_output_format_includes_positive_advisory_keys() {
        let mut config = config_720p();
        config.profile_idc = 66;
        config.level_idc = 31;
        config.constraint_set = 1;
        let format = build_output_format(&config, true);

        assert_eq!(format.int32(format_keys::PROFILE_IDC), Some(66));
        assert_eq!(format.int32(format_keys::LEVEL_IDC), Some(31));
        assert_eq!(format.int32(format_keys::CONSTRAINT_SET), Some(1));
    }

    #[test]
    fn test_source_format_keys() {
        let format = build_source_format(&config_720p());

        assert_eq!(format.string(format_keys::MIME), Some(RAW_MIME_TYPE));
        assert_eq!(format.int32(format_keys::COLOR_FORMAT), Some(COLOR_FORMAT_OPAQUE));
        assert_eq!(format.int32(format_keys::WIDTH), Some(1280));
        assert_eq!(format.int32(format_keys::HEIGHT), Some(720));
        assert_eq!(format.int32(format_keys::STRIDE), Some(1280));
        assert_eq!(format.int32(format_keys::SLICE_HEIGHT), Some(720));
        assert_eq!(format.int32(format_keys::FRAMERATE), Some(30));
    }

    #[derive(Default)]
    struct IdleBackend {
        sessions: AtomicU32,
        refuse_start: bool,
        refuse_stop: bool,
    }

    impl EncoderBackend for IdleBackend {
        fn create_session(
            &self,
            _format: MediaFormat,
            _source_format: MediaFormat,
            _source: Arc<dyn FrameSource>,
        ) -> Result<(), BackendError> {
            self.sessions.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn start(&self) -> Result<(), BackendError> {
            if self.refuse_start {
                Err(BackendError::StartFailed("refused".into()))
            } else {
                Ok(())
            }
        }

        fn stop(&self) -> Result<(), BackendError> {
            if self.refuse_stop {
                Err(BackendError::StopFailed("refused".into()))
            } else {
                Ok(())
            }
        }

        fn read_output(&self) -> Result<Box<dyn EncodedBuffer>, BackendError> {
            Err(BackendError::ReadFailed("no output".into()))
        }

        fn request_keyframe(&self) {}

        fn allocate_buffer(&self, _len: usize) -> Option<Box<dyn InputBuffer>> {
            None
        }

        fn wrap_native_handle(&self, _handle: NativeHandle) -> Option<Box<dyn InputBuffer>> {
            None
        }
    }

    fn encoder_with(backend: Arc<IdleBackend>) -> H264Encoder {
        H264Encoder::new(backend, Arc::new(NullReport), true)
    }

    #[derive(Default)]
    struct CountedFrame {
        releases: AtomicU32,
    }

    impl VideoFrame for CountedFrame {
        fn len(&self) -> u32 {
            0
        }
        fn data(&self) -> &[u8] {
            &[]
        }
        fn native_handle(&self) -> Option<NativeHandle> {
            None
        }
        fn timestamp_us(&self) -> i64 {
            0
        }
        fn is_valid(&self) -> bool {
            true
        }
        fn release(&self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_configure_twice_fails_and_keeps_first_config() {
        let backend = Arc::new(IdleBackend::default());
        let encoder = encoder_with(Arc::clone(&backend));

        encoder.configure(config_720p()).unwrap();
        let second = EncoderConfig::with_resolution(640, 480);
        assert!(matches!(
            encoder.configure(second),
            Err(EncoderError::AlreadyConfigured)
        ));

        let kept = encoder.configuration().unwrap();
        assert_eq!(kept.width, 1280);
        assert_eq!(kept.height, 720);
        assert_eq!(backend.sessions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_start_before_configure_fails() {
        let encoder = encoder_with(Arc::new(IdleBackend::default()));
        assert!(matches!(encoder.start(), Err(EncoderError::NotConfigured)));
    }

    #[test]
    fn test_execute_before_start_fails() {
        let encoder = encoder_with(Arc::new(IdleBackend::default()));
        encoder.configure(config_720p()).unwrap();
        assert!(matches!(encoder.execute(), Err(EncoderError::NotRunning)));
    }

    #[test]
    fn test_stop_when_not_running_fails() {
        let encoder = encoder_with(Arc::new(IdleBackend::default()));
        encoder.configure(config_720p()).unwrap();
        assert!(matches!(encoder.stop(), Err(EncoderError::NotRunning)));
    }

    #[test]
    fn test_start_failure_rolls_running_back() {
        let backend = Arc::new(IdleBackend {
            refuse_start: true,
            ..IdleBackend::default()
        });
        let encoder = encoder_with(backend);
        encoder.configure(config_720p()).unwrap();

        assert!(matches!(encoder.start(), Err(EncoderError::Backend(_))));
        // Still in the configured state: a second start attempt is not
        // rejected as already-running.
        assert!(matches!(encoder.start(), Err(EncoderError::Backend(_))));
    }

    #[test]
    fn test_stopped_is_terminal() {
        let encoder = encoder_with(Arc::new(IdleBackend::default()));
        encoder.configure(config_720p()).unwrap();
        encoder.start().unwrap();
        encoder.stop().unwrap();

        assert!(matches!(encoder.start(), Err(EncoderError::Stopped)));
        assert!(matches!(encoder.stop(), Err(EncoderError::NotRunning)));
    }

    #[test]
    fn test_queue_buffer_while_not_running_releases_frame() {
        let encoder = encoder_with(Arc::new(IdleBackend::default()));
        let frame = Arc::new(CountedFrame::default());
        encoder.queue_buffer(frame.clone());

        assert_eq!(frame.releases.load(Ordering::SeqCst), 1);
        assert_eq!(encoder.stats().frames_dropped, 1);
        assert_eq!(encoder.stats().frames_queued, 0);
    }

    #[test]
    fn test_failed_backend_stop_defers_queued_frame_release() {
        let encoder = encoder_with(Arc::new(IdleBackend {
            refuse_stop: true,
            ..IdleBackend::default()
        }));
        encoder.configure(config_720p()).unwrap();
        encoder.start().unwrap();

        let frame = Arc::new(CountedFrame::default());
        encoder.queue_buffer(frame.clone());
        assert_eq!(encoder.stats().frames_queued, 1);

        assert!(matches!(encoder.stop(), Err(EncoderError::Backend(_))));
        // The backend never stopped, so the frame stays queued for a
        // retry instead of being handed back mid-flight.
        assert_eq!(frame.releases.load(Ordering::SeqCst), 0);

        // Teardown retries the stop, fails again, and still returns the
        // stranded frame to the producer exactly once.
        drop(encoder);
        assert_eq!(frame.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_send_idr_frame_is_noop_while_unconfigured() {
        let encoder = encoder_with(Arc::new(IdleBackend::default()));
        encoder.send_idr_frame();
    }

    #[test]
    fn test_report_sees_started_then_stopped_exactly_once() {
        let mut report = crate::sink::MockEncoderReport::new();
        report.expect_started().times(1).return_const(());
        report.expect_stopped().times(1).return_const(());

        let encoder = H264Encoder::new(
            Arc::new(IdleBackend::default()),
            Arc::new(report),
            true,
        );
        encoder.configure(config_720p()).unwrap();
        encoder.start().unwrap();
        encoder.stop().unwrap();
    }
}
