//! Export configuration, sinks, and the frame-by-frame export driver.

use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;
use std::time::Instant;

use image::RgbaImage;
use montage_common::{ExportDefaults, MontageError};
use montage_project_model::{FrameSize, MediaCatalog, Rgba, TimelineState};

use crate::compositor::Compositor;
use crate::decode::PictureSource;
use crate::playback::RenderLoop;

/// An export job ready to be rendered.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Output file path.
    pub output_path: PathBuf,

    /// Frames per second of the captured stream.
    pub fps: u32,

    /// Encoder selection passed through to the sink.
    pub video_codec: String,

    /// Start time offset (for partial exports).
    pub start_secs: Option<f64>,

    /// End time (for partial exports).
    pub end_secs: Option<f64>,
}

impl ExportJob {
    pub fn new(output_path: impl Into<PathBuf>, defaults: &ExportDefaults) -> Self {
        Self {
            output_path: output_path.into(),
            fps: defaults.fps,
            video_codec: defaults.video_codec.clone(),
            start_secs: None,
            end_secs: None,
        }
    }

    /// The exported interval, clamped to `[0, duration]`.
    pub fn range(&self, duration: f64) -> (f64, f64) {
        let start = self.start_secs.unwrap_or(0.0).clamp(0.0, duration);
        let end = self.end_secs.unwrap_or(duration).clamp(start, duration);
        (start, end)
    }

    /// Number of frames covering the exported interval.
    pub fn total_frames(&self, duration: f64) -> u64 {
        let (start, end) = self.range(duration);
        ((end - start) * self.fps.max(1) as f64).ceil() as u64
    }
}

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send>;

/// Export progress report.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames rendered so far.
    pub frames_rendered: u64,

    /// Total frames to render.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: ExportStage,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Rendering,
    Finalizing,
    Complete,
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing to export: timeline is empty")]
    EmptyTimeline,

    #[error("export sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("frame size mismatch: got {got_w}x{got_h}, expected {want_w}x{want_h}")]
    FrameSize {
        got_w: u32,
        got_h: u32,
        want_w: u32,
        want_h: u32,
    },

    #[error("sink used out of order: {0}")]
    State(&'static str),

    #[error("failed to write frame: {0}")]
    Write(String),

    #[error("encoder failed (status {status}): {stderr}")]
    Encoder { status: String, stderr: String },
}

impl From<ExportError> for MontageError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::SinkUnavailable(msg) => MontageError::unsupported(msg),
            other => MontageError::export(other.to_string()),
        }
    }
}

/// Consumes composited frames at a fixed rate.
pub trait ExportSink {
    fn begin(&mut self, size: FrameSize, fps: u32) -> Result<(), ExportError>;
    fn write_frame(&mut self, frame: &RgbaImage) -> Result<(), ExportError>;
    fn finish(&mut self) -> Result<(), ExportError>;
    fn name(&self) -> &str;
}

/// Collects frames in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    size: Option<FrameSize>,
    pub fps: u32,
    pub frames: Vec<RgbaImage>,
    pub finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExportSink for MemorySink {
    fn begin(&mut self, size: FrameSize, fps: u32) -> Result<(), ExportError> {
        self.size = Some(size);
        self.fps = fps;
        self.frames.clear();
        self.finished = false;
        Ok(())
    }

    fn write_frame(&mut self, frame: &RgbaImage) -> Result<(), ExportError> {
        let size = self.size.ok_or(ExportError::State("write before begin"))?;
        check_size(frame, size)?;
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ExportError> {
        self.finished = true;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

fn check_size(frame: &RgbaImage, size: FrameSize) -> Result<(), ExportError> {
    if frame.width() != size.width || frame.height() != size.height {
        return Err(ExportError::FrameSize {
            got_w: frame.width(),
            got_h: frame.height(),
            want_w: size.width,
            want_h: size.height,
        });
    }
    Ok(())
}

struct RunningEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
    size: FrameSize,
}

/// Pipes raw RGBA frames into the `ffmpeg` binary.
pub struct FfmpegSink {
    output_path: PathBuf,
    video_codec: String,
    overwrite: bool,
    background: [u8; 3],
    running: Option<RunningEncoder>,
    scratch: Vec<u8>,
}

impl std::fmt::Debug for FfmpegSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegSink")
            .field("output_path", &self.output_path)
            .field("video_codec", &self.video_codec)
            .field("running", &self.running.is_some())
            .finish()
    }
}

impl FfmpegSink {
    pub fn new(job: &ExportJob) -> Self {
        Self {
            output_path: job.output_path.clone(),
            video_codec: job.video_codec.clone(),
            overwrite: true,
            background: [0, 0, 0],
            running: None,
            scratch: Vec::new(),
        }
    }

    /// Color that transparent areas of a frame are flattened onto.
    pub fn with_background(mut self, color: Rgba) -> Self {
        self.background = [color.r, color.g, color.b];
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn is_available() -> bool {
        command_exists("ffmpeg")
    }
}

impl ExportSink for FfmpegSink {
    fn begin(&mut self, size: FrameSize, fps: u32) -> Result<(), ExportError> {
        if self.running.is_some() {
            return Err(ExportError::State("begin called twice"));
        }
        if !Self::is_available() {
            return Err(ExportError::SinkUnavailable(
                "ffmpeg was not found in PATH".to_string(),
            ));
        }
        let codec_args = codec_args_for(&self.video_codec)?;
        if let Some(parent) = self.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ExportError::SinkUnavailable(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .arg(if self.overwrite { "-y" } else { "-n" })
            .args([
                "-loglevel",
                "error",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-s",
                &format!("{}x{}", size.width, size.height),
                "-r",
                &fps.to_string(),
                "-i",
                "pipe:0",
                "-an",
            ])
            .args(&codec_args)
            .arg(&self.output_path);
        tracing::debug!(codec = %self.video_codec, args = ?codec_args, "Spawning ffmpeg");

        let mut child = cmd
            .spawn()
            .map_err(|e| ExportError::SinkUnavailable(format!("failed to start ffmpeg: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or(ExportError::State("ffmpeg stdin was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(ExportError::State("ffmpeg stderr was not captured"))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        tracing::info!(
            pid = child.id(),
            output = %self.output_path.display(),
            width = size.width,
            height = size.height,
            fps,
            "ffmpeg process started"
        );
        self.scratch = vec![0; size.width as usize * size.height as usize * 4];
        self.running = Some(RunningEncoder {
            child,
            stdin: Some(stdin),
            stderr_task: Some(stderr_task),
            size,
        });
        Ok(())
    }

    fn write_frame(&mut self, frame: &RgbaImage) -> Result<(), ExportError> {
        let running = self
            .running
            .as_mut()
            .ok_or(ExportError::State("write before begin"))?;
        check_size(frame, running.size)?;
        flatten_opaque(&mut self.scratch, frame.as_raw(), self.background);
        let stdin = running
            .stdin
            .as_mut()
            .ok_or(ExportError::State("write after finish"))?;
        stdin
            .write_all(&self.scratch)
            .map_err(|e| ExportError::Write(e.to_string()))
    }

    fn finish(&mut self) -> Result<(), ExportError> {
        let Some(mut running) = self.running.take() else {
            return Err(ExportError::State("finish before begin"));
        };
        drop(running.stdin.take());

        let status = running
            .child
            .wait()
            .map_err(|e| ExportError::Write(format!("failed to wait on ffmpeg: {e}")))?;
        let stderr = running
            .stderr_task
            .take()
            .map(|task| {
                task.join()
                    .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
            })
            .unwrap_or_default();

        if !status.success() {
            return Err(ExportError::Encoder {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        tracing::info!(output = %self.output_path.display(), "ffmpeg finished");
        Ok(())
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let Some(mut running) = self.running.take() {
            drop(running.stdin.take());
            let _ = running.child.kill();
            let _ = running.child.wait();
        }
    }
}

/// Composite straight-alpha RGBA over an opaque background.
fn flatten_opaque(dst: &mut [u8], src: &[u8], bg: [u8; 3]) {
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = s[3] as u32;
        for c in 0..3 {
            d[c] = ((s[c] as u32 * a + bg[c] as u32 * (255 - a) + 127) / 255) as u8;
        }
        d[3] = 255;
    }
}

/// Encoder arguments for a codec name.
pub fn codec_args_for(codec: &str) -> Result<Vec<String>, ExportError> {
    let args: &[&str] = match codec.to_ascii_lowercase().as_str() {
        "h264" | "avc" | "mp4" => &[
            "-c:v",
            "libx264",
            "-preset",
            "medium",
            "-profile:v",
            "high",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ],
        "h265" | "hevc" => &[
            "-c:v",
            "libx265",
            "-preset",
            "medium",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ],
        "vp9" | "webm" => &["-c:v", "libvpx-vp9", "-b:v", "0", "-crf", "32"],
        "gif" => &[
            "-vf",
            "fps=15,split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse",
        ],
        other => return Err(ExportError::UnsupportedCodec(other.to_string())),
    };
    Ok(args.iter().map(|s| s.to_string()).collect())
}

pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn progress_report(
    frames_rendered: u64,
    total_frames: u64,
    elapsed_secs: f64,
    stage: ExportStage,
) -> ExportProgress {
    let progress = if total_frames == 0 {
        0.0
    } else {
        (frames_rendered as f64 / total_frames as f64).clamp(0.0, 1.0)
    };
    let eta_secs = if progress > 0.0 {
        (elapsed_secs / progress) - elapsed_secs
    } else {
        0.0
    }
    .max(0.0);

    ExportProgress {
        progress,
        frames_rendered,
        total_frames,
        eta_secs,
        stage,
    }
}

/// What an export produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub frames: u64,
    pub fps: u32,
    pub start_secs: f64,
    pub end_secs: f64,
}

/// Everything the export driver renders from.
pub struct ExportInputs<'a> {
    pub state: &'a TimelineState,
    pub catalog: &'a MediaCatalog,
    pub compositor: &'a Compositor,
    pub pictures: &'a mut dyn PictureSource,
}

/// Drive the master clock over the job's interval and push one composited
/// frame per step into `sink`.
///
/// On failure playback is stopped and rewound to zero before the error is
/// returned.
pub fn export_timeline(
    job: &ExportJob,
    inputs: ExportInputs<'_>,
    render_loop: &mut RenderLoop,
    sink: &mut dyn ExportSink,
    progress: Option<ProgressCallback>,
) -> Result<ExportSummary, ExportError> {
    let result = run_export(job, inputs, render_loop, sink, &progress);
    match &result {
        Ok(summary) => {
            tracing::info!(
                frames = summary.frames,
                output = %job.output_path.display(),
                sink = sink.name(),
                "Export finished"
            );
        }
        Err(err) => {
            tracing::error!(error = %err, sink = sink.name(), "Export failed");
            if let Some(cb) = &progress {
                cb(ExportProgress {
                    progress: 0.0,
                    frames_rendered: 0,
                    total_frames: 0,
                    eta_secs: 0.0,
                    stage: ExportStage::Failed,
                });
            }
        }
    }
    result
}

fn run_export(
    job: &ExportJob,
    inputs: ExportInputs<'_>,
    render_loop: &mut RenderLoop,
    sink: &mut dyn ExportSink,
    progress: &Option<ProgressCallback>,
) -> Result<ExportSummary, ExportError> {
    let ExportInputs {
        state,
        catalog,
        compositor,
        pictures,
    } = inputs;

    let fail = |render_loop: &mut RenderLoop, err: ExportError| -> Result<ExportSummary, ExportError> {
        render_loop.rewind(state);
        Err(err)
    };

    if state.duration <= 0.0 {
        return fail(render_loop, ExportError::EmptyTimeline);
    }
    let fps = job.fps.max(1);
    let (start, end) = job.range(state.duration);
    let total_frames = job.total_frames(state.duration);
    if total_frames == 0 {
        return fail(render_loop, ExportError::EmptyTimeline);
    }

    tracing::info!(
        output = %job.output_path.display(),
        sink = sink.name(),
        fps,
        start,
        end,
        total_frames,
        "Starting export"
    );
    if let Some(cb) = progress {
        cb(progress_report(0, total_frames, 0.0, ExportStage::Preparing));
    }

    if let Err(err) = sink.begin(compositor.frame(), fps) {
        return fail(render_loop, err);
    }

    render_loop.pause();
    let started = Instant::now();
    let report_every = u64::from(fps);
    for index in 0..total_frames {
        let t = (start + index as f64 / fps as f64).min(end);
        render_loop.seek(t, state);
        let tick = render_loop.tick(started.elapsed().as_secs_f64(), state);
        let frame = compositor.render(state, catalog, tick.time, &mut *pictures);
        if let Err(err) = sink.write_frame(&frame) {
            return fail(render_loop, err);
        }

        let done = index + 1;
        if let Some(cb) = progress {
            if done % report_every == 0 || done == total_frames {
                cb(progress_report(
                    done,
                    total_frames,
                    started.elapsed().as_secs_f64(),
                    ExportStage::Rendering,
                ));
            }
        }
    }

    if let Some(cb) = progress {
        cb(progress_report(
            total_frames,
            total_frames,
            started.elapsed().as_secs_f64(),
            ExportStage::Finalizing,
        ));
    }
    if let Err(err) = sink.finish() {
        return fail(render_loop, err);
    }
    render_loop.rewind(state);

    if let Some(cb) = progress {
        cb(progress_report(
            total_frames,
            total_frames,
            started.elapsed().as_secs_f64(),
            ExportStage::Complete,
        ));
    }
    Ok(ExportSummary {
        frames: total_frames,
        fps,
        start_secs: start,
        end_secs: end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_and_frame_count() {
        let mut job = ExportJob::new("out.mp4", &ExportDefaults::default());
        assert_eq!(job.range(10.0), (0.0, 10.0));
        assert_eq!(job.total_frames(10.0), 300);

        job.start_secs = Some(2.0);
        job.end_secs = Some(50.0);
        assert_eq!(job.range(10.0), (2.0, 10.0));
        assert_eq!(job.total_frames(2.5), 15);
    }

    #[test]
    fn test_codec_args() {
        let args = codec_args_for("H264").unwrap();
        assert!(args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "libx264"));
        assert!(matches!(
            codec_args_for("prores"),
            Err(ExportError::UnsupportedCodec(_))
        ));
    }

    #[test]
    fn test_flatten_over_background() {
        let mut dst = vec![0u8; 8];
        flatten_opaque(&mut dst, &[255, 0, 0, 128, 10, 20, 30, 255], [0, 0, 0]);
        assert_eq!(dst, vec![128, 0, 0, 255, 10, 20, 30, 255]);
    }

    #[test]
    fn test_progress_report() {
        let p = progress_report(25, 100, 5.0, ExportStage::Rendering);
        assert!((p.progress - 0.25).abs() < 1e-9);
        assert!((p.eta_secs - 15.0).abs() < 1e-9);

        let empty = progress_report(0, 0, 1.0, ExportStage::Preparing);
        assert_eq!(empty.progress, 0.0);
        assert_eq!(empty.eta_secs, 0.0);
    }

    #[test]
    fn test_memory_sink_rejects_wrong_size() {
        let mut sink = MemorySink::new();
        assert!(matches!(
            sink.write_frame(&RgbaImage::new(2, 2)),
            Err(ExportError::State(_))
        ));
        sink.begin(FrameSize::new(4, 4), 30).unwrap();
        assert!(matches!(
            sink.write_frame(&RgbaImage::new(2, 2)),
            Err(ExportError::FrameSize { .. })
        ));
    }
}
