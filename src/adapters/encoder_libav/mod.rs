// Encoder LibAV adapter - Live surface encoder backed by ffmpeg-next
//
// The encoder thread owns the codec and the muxer. It snapshots the capture
// surface at the capture rate, muxes into a temporary container file and, once
// stopped, streams the finished file back as ordered chunks.

use std::path::Path;
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ffmpeg_next::format::{self, Pixel};
use ffmpeg_next::software::scaling::{Context as ScaleCtx, Flags as ScaleFlags};
use ffmpeg_next::util::frame::video::Video as RawFrame;
use ffmpeg_next::{codec, encoder, Packet, Rational};
use tempfile::NamedTempFile;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::model::{CodecPreference, EncoderSettings};
use crate::domain::surface::{lock_surface, SharedSurface};
use crate::ports::{EncoderEvent, EncoderFactory, EncoderHandle, StreamEncoder};

/// Size of the chunks the finished container is delivered in
const CHUNK_SIZE: usize = 256 * 1024;

/// Encoder time base: milliseconds
const TIME_BASE: Rational = Rational(1, 1000);

/// Builds encoders from ffmpeg's registered codecs
#[derive(Debug, Clone, Copy, Default)]
pub struct LibavEncoderFactory;

impl LibavEncoderFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EncoderFactory for LibavEncoderFactory {
    async fn create(
        &self,
        preference: &CodecPreference,
        settings: &EncoderSettings,
        surface: SharedSurface,
    ) -> PipelineResult<EncoderHandle> {
        let (commands, command_rx) = std_mpsc::channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let job = EncodeJob {
            preference: preference.clone(),
            settings: settings.clone(),
            surface,
        };

        let thread = std::thread::Builder::new()
            .name(format!("reelcut-encode-{}", preference.codec))
            .spawn(move || encoder_thread(job, command_rx, events_tx, ready_tx))?;

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let _ = thread.join();
                return Err(err);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(PipelineError::encode("encoder thread exited during setup"));
            }
        }

        Ok(EncoderHandle {
            encoder: Box::new(LibavStreamEncoder {
                commands,
                thread: Some(thread),
                recording: false,
                started: false,
            }),
            events,
        })
    }
}

enum EncodeCommand {
    Start,
    Stop,
    Abort,
}

struct EncodeJob {
    preference: CodecPreference,
    settings: EncoderSettings,
    surface: SharedSurface,
}

/// Handle to a running encoder thread
pub struct LibavStreamEncoder {
    commands: std_mpsc::Sender<EncodeCommand>,
    thread: Option<JoinHandle<()>>,
    recording: bool,
    started: bool,
}

#[async_trait]
impl StreamEncoder for LibavStreamEncoder {
    fn start(&mut self) -> PipelineResult<()> {
        if self.started {
            return Err(PipelineError::encode("encoder cannot be restarted"));
        }
        self.commands
            .send(EncodeCommand::Start)
            .map_err(|_| PipelineError::encode("encoder thread is gone"))?;
        self.started = true;
        self.recording = true;
        Ok(())
    }

    fn stop(&mut self) {
        if self.recording {
            self.recording = false;
            let _ = self.commands.send(EncodeCommand::Stop);
        }
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    async fn abort(&mut self) {
        self.recording = false;
        let _ = self.commands.send(EncodeCommand::Abort);
        if let Some(thread) = self.thread.take() {
            let joined = tokio::task::spawn_blocking(move || thread.join()).await;
            if !matches!(joined, Ok(Ok(()))) {
                warn!("Encoder thread did not shut down cleanly");
            }
        }
    }
}

/// Codec, muxer and pixel conversion for one encoding session
struct Muxer {
    output: format::context::Output,
    encoder: encoder::video::Encoder,
    scaler: ScaleCtx,
    rgba: RawFrame,
    yuv: RawFrame,
    stream_time_base: Rational,
    file: NamedTempFile,
}

impl Muxer {
    fn open(job: &EncodeJob) -> PipelineResult<Self> {
        let EncodeJob {
            preference,
            settings,
            ..
        } = job;
        let found = encoder::find_by_name(&preference.codec).ok_or_else(|| {
            PipelineError::encode(format!("{} is not available", preference.codec))
        })?;

        let file = tempfile::Builder::new()
            .prefix("reelcut-out-")
            .suffix(&format!(".{}", preference.extension()))
            .tempfile()?;
        let mut output = format::output_as(file.path(), &preference.container).map_err(|e| {
            PipelineError::encode(format!("{} muxer unavailable: {}", preference.container, e))
        })?;
        let global_header = output
            .format()
            .flags()
            .contains(format::Flags::GLOBAL_HEADER);

        let mut stream = output
            .add_stream(found)
            .map_err(|e| PipelineError::encode(format!("cannot add stream: {}", e)))?;
        stream.set_time_base(TIME_BASE);

        let mut video = codec::context::Context::new_with_codec(found)
            .encoder()
            .video()
            .map_err(|e| PipelineError::encode(format!("not a video encoder: {}", e)))?;
        video.set_width(settings.size.width);
        video.set_height(settings.size.height);
        video.set_format(Pixel::YUV420P);
        video.set_time_base(TIME_BASE);
        video.set_frame_rate(Some(Rational::from(settings.nominal_fps())));
        video.set_bit_rate(settings.bitrate as usize);
        if global_header {
            video.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let encoder = video.open_as(found).map_err(|e| {
            PipelineError::encode(format!("cannot open {}: {}", preference.codec, e))
        })?;
        stream.set_parameters(&encoder);

        output
            .write_header()
            .map_err(|e| PipelineError::encode(format!("cannot write header: {}", e)))?;
        let stream_time_base = output
            .stream(0)
            .map(|s| s.time_base())
            .unwrap_or(TIME_BASE);

        let (width, height) = (settings.size.width, settings.size.height);
        let scaler = ScaleCtx::get(
            Pixel::RGBA,
            width,
            height,
            Pixel::YUV420P,
            width,
            height,
            ScaleFlags::BILINEAR,
        )
        .map_err(|e| PipelineError::encode(format!("cannot convert to YUV420P: {}", e)))?;

        Ok(Self {
            output,
            encoder,
            scaler,
            rgba: RawFrame::new(Pixel::RGBA, width, height),
            yuv: RawFrame::empty(),
            stream_time_base,
            file,
        })
    }

    /// Encode the surface as it looks right now
    fn capture(&mut self, surface: &SharedSurface, pts_ms: i64) -> PipelineResult<()> {
        {
            let guard = lock_surface(surface);
            let pixels = guard.pixels();
            let row_bytes = guard.size().width as usize * 4;
            let stride = self.rgba.stride(0);
            let data = self.rgba.data_mut(0);
            for (row, src) in pixels.chunks_exact(row_bytes).enumerate() {
                let start = row * stride;
                data[start..start + row_bytes].copy_from_slice(src);
            }
        }

        self.scaler
            .run(&self.rgba, &mut self.yuv)
            .map_err(|e| PipelineError::encode(format!("pixel conversion failed: {}", e)))?;
        self.yuv.set_pts(Some(pts_ms));
        self.encoder
            .send_frame(&self.yuv)
            .map_err(|e| PipelineError::encode(format!("encoder rejected frame: {}", e)))?;
        self.drain()
    }

    fn drain(&mut self) -> PipelineResult<()> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet.rescale_ts(TIME_BASE, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .map_err(|e| PipelineError::encode(format!("mux failed: {}", e)))?;
        }
        Ok(())
    }

    /// Flush, write the trailer and hand back the container bytes
    fn finish(mut self) -> PipelineResult<Vec<u8>> {
        self.encoder
            .send_eof()
            .map_err(|e| PipelineError::encode(format!("flush failed: {}", e)))?;
        self.drain()?;
        self.output
            .write_trailer()
            .map_err(|e| PipelineError::encode(format!("cannot write trailer: {}", e)))?;

        let Muxer { output, file, .. } = self;
        drop(output);
        read_container(file.path())
    }
}

fn read_container(path: &Path) -> PipelineResult<Vec<u8>> {
    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        return Err(PipelineError::encode("encoder produced an empty container"));
    }
    Ok(bytes)
}

fn encoder_thread(
    job: EncodeJob,
    commands: std_mpsc::Receiver<EncodeCommand>,
    events: mpsc::UnboundedSender<EncoderEvent>,
    ready: oneshot::Sender<PipelineResult<()>>,
) {
    let mut muxer = match Muxer::open(&job) {
        Ok(muxer) => {
            if ready.send(Ok(())).is_err() {
                return;
            }
            muxer
        }
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    match commands.recv() {
        Ok(EncodeCommand::Start) => {}
        _ => return,
    }
    info!(
        codec = %job.preference.codec,
        width = job.settings.size.width,
        height = job.settings.size.height,
        fps = job.settings.capture_fps,
        "Encoder recording"
    );

    let period = Duration::from_secs_f64(1.0 / job.settings.capture_fps.max(1) as f64);
    let mut next_capture = Instant::now();
    // slot on the capture timeline; late periods still occupy theirs
    let mut index = 0u64;
    let mut captured = 0u64;

    loop {
        let wait = next_capture.saturating_duration_since(Instant::now());
        match commands.recv_timeout(wait) {
            Ok(EncodeCommand::Stop) => break,
            Ok(EncodeCommand::Abort) | Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                debug!(frames = captured, "Encoder aborted");
                return;
            }
            Ok(EncodeCommand::Start) => {}
            Err(std_mpsc::RecvTimeoutError::Timeout) => {
                let pts = job.settings.frame_pts_ms(index);
                if let Err(err) = muxer.capture(&job.surface, pts) {
                    let _ = events.send(EncoderEvent::Failed(err));
                    return;
                }
                captured += 1;
                let (next, skipped) =
                    skip_late_periods(next_capture + period, period, Instant::now());
                if skipped > 0 {
                    debug!(skipped, "Encoder behind, dropping capture slots");
                }
                next_capture = next;
                index += 1 + skipped;
            }
        }
    }

    match muxer.finish() {
        Ok(bytes) => {
            debug!(frames = captured, slots = index, bytes = bytes.len(), "Encoder finalized");
            for chunk in bytes.chunks(CHUNK_SIZE) {
                if events.send(EncoderEvent::Chunk(chunk.to_vec())).is_err() {
                    return;
                }
            }
            let _ = events.send(EncoderEvent::Finalized);
        }
        Err(err) => {
            let _ = events.send(EncoderEvent::Failed(err));
        }
    }
}

/// Move `next` past capture slots that are already over.
///
/// Returns the next slot still worth waiting for and how many were skipped.
fn skip_late_periods(mut next: Instant, period: Duration, now: Instant) -> (Instant, u64) {
    let mut skipped = 0;
    while next + period < now {
        next += period;
        skipped += 1;
    }
    (next, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_time_capture_skips_nothing() {
        let start = Instant::now();
        let period = Duration::from_millis(100);
        let (next, skipped) = skip_late_periods(start + period, period, start + period);
        assert_eq!(next, start + period);
        assert_eq!(skipped, 0);
    }

    #[test]
    fn test_stalled_capture_keeps_timeline_slots() {
        let start = Instant::now();
        let period = Duration::from_millis(100);
        // frame 0 took 1.05 s to encode
        let (next, skipped) =
            skip_late_periods(start + period, period, start + Duration::from_millis(1050));
        assert_eq!(skipped, 9);
        assert_eq!(next, start + Duration::from_millis(1000));

        let settings = EncoderSettings {
            size: crate::domain::model::SurfaceSize { width: 2, height: 2 },
            capture_fps: 10,
            bitrate: 1,
            time_scale: 1.0,
        };
        assert_eq!(settings.frame_pts_ms(1 + skipped), 1000);
    }
}
