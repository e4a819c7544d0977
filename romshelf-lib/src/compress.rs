//! Bulk video re-encoding with a bounded worker pool.
//!
//! Every qualifying video under the media tree goes through the same job:
//! back up the original into a sibling `backup` directory, probe it, encode
//! a scaled/trimmed replacement to a temp file, then atomically swap it in.
//! Any failure after the backup restores the original, so a job can fail
//! but never destroy a file. Jobs run on a fixed pool of workers; failures
//! are collected per file and never stop the batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::Duration;

use crate::error::CompressError;
use crate::scanner::{self, BACKUP_DIR_NAME};

/// Hard deadline for one encoder invocation.
const ENCODE_TIMEOUT: Duration = Duration::from_secs(600);

/// Outer deadline for a whole job (backup + probe + encode + swap). Sits
/// well above [`ENCODE_TIMEOUT`] so the encoder's own deadline fires first;
/// this one only catches a stuck probe or filesystem call, and the job
/// still reports a [`CompressError::Timeout`] instead of stalling the pool.
const JOB_DEADLINE: Duration = Duration::from_secs(900);

/// Scaled output keeps its original dimensions if the scaled height would
/// drop below this.
const MIN_HEIGHT: u32 = 240;

/// Options controlling a compression run.
#[derive(Debug, Clone)]
pub struct CompressOptions {
    /// Resolution scale factor (0.1 to 1.0).
    pub scale: f64,
    /// x264 constant rate factor (0 to 51, lower is better).
    pub crf: u32,
    /// Output duration ceiling in seconds; longer sources are center-trimmed.
    pub max_duration: f64,
    /// Concurrent encode jobs.
    pub workers: usize,
    /// Extension of files to process, without the dot.
    pub video_ext: String,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            scale: 0.75,
            crf: 27,
            max_duration: 10.0,
            workers: 6,
            video_ext: "mp4".to_string(),
        }
    }
}

/// What the prober learned about a media file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeInfo {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

impl ProbeInfo {
    /// Assumed values when probing fails. The job proceeds with these
    /// rather than failing outright.
    pub fn fallback() -> Self {
        Self {
            duration: 10.0,
            width: 640,
            height: 480,
        }
    }
}

/// One resolved encoder invocation.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub crf: u32,
    /// Center-trim window as (start offset, duration), when the source
    /// runs past the configured maximum.
    pub trim: Option<(f64, f64)>,
}

/// Media probing capability.
pub trait MediaProber: Send + Sync {
    fn probe(
        &self,
        path: &Path,
    ) -> impl std::future::Future<Output = Result<ProbeInfo, CompressError>> + Send;
}

/// Video encoding capability.
pub trait VideoEncoder: Send + Sync {
    fn encode(
        &self,
        request: &EncodeRequest,
    ) -> impl std::future::Future<Output = Result<(), CompressError>> + Send;
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Prober backed by the `ffprobe` binary on `$PATH`.
#[derive(Debug, Clone, Default)]
pub struct FfProber;

impl MediaProber for FfProber {
    async fn probe(&self, path: &Path) -> Result<ProbeInfo, CompressError> {
        let output = tokio::process::Command::new("ffprobe")
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(CompressError::probe(format!(
                "ffprobe exited with {}",
                output.status
            )));
        }

        let parsed: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
        let video = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| CompressError::probe("no video stream"))?;

        let duration = parsed
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .ok_or_else(|| CompressError::probe("no duration in format"))?;
        let (width, height) = match (video.width, video.height) {
            (Some(w), Some(h)) => (w, h),
            _ => return Err(CompressError::probe("video stream missing dimensions")),
        };

        Ok(ProbeInfo {
            duration,
            width,
            height,
        })
    }
}

/// Encoder backed by the `ffmpeg` binary on `$PATH`.
///
/// Fixed x264/AAC parameter set tuned for small preview clips; only
/// resolution, CRF and the trim window vary per job.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEncoder;

impl FfmpegEncoder {
    fn build_args(request: &EncodeRequest) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        // Trim flags go before -i so ffmpeg seeks instead of decoding
        // the skipped lead-in
        if let Some((start, duration)) = request.trim {
            args.extend(["-ss".into(), start.to_string()]);
            args.extend(["-t".into(), duration.to_string()]);
        }
        args.extend(["-i".into(), request.input.display().to_string(), "-y".into()]);

        args.extend([
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "slow".into(),
            "-crf".into(),
            request.crf.to_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-vf".into(),
            format!("scale={}:{}:flags=lanczos", request.width, request.height),
            "-profile:v".into(),
            "high".into(),
            "-level".into(),
            "4.0".into(),
            "-tune".into(),
            "film".into(),
            "-x264opts".into(),
            "merange=24:b-adapt=2".into(),
        ]);

        args.extend([
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            "64k".into(),
            "-ac".into(),
            "2".into(),
            "-ar".into(),
            "48000".into(),
            "-profile:a".into(),
            "aac_low".into(),
        ]);

        args.extend([
            "-movflags".into(),
            "+faststart".into(),
            "-threads".into(),
            "2".into(),
            request.output.display().to_string(),
        ]);
        args
    }
}

impl VideoEncoder for FfmpegEncoder {
    async fn encode(&self, request: &EncodeRequest) -> Result<(), CompressError> {
        let args = Self::build_args(request);
        let child = tokio::process::Command::new("ffmpeg")
            .args(&args)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match tokio::time::timeout(ENCODE_TIMEOUT, child.wait_with_output()).await
        {
            Ok(result) => result?,
            // kill_on_drop reaps the child when the future is dropped
            Err(_) => return Err(CompressError::Timeout(ENCODE_TIMEOUT.as_secs())),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(CompressError::encode(format!(
                "ffmpeg exited with {}: {tail}",
                output.status
            )));
        }
        Ok(())
    }
}

/// Scale source dimensions, with two corrections: if the scaled height
/// falls below [`MIN_HEIGHT`] the original dimensions are kept, and both
/// dimensions round down to even (required by yuv420p).
pub fn target_dimensions(width: u32, height: u32, scale: f64) -> (u32, u32) {
    let mut new_width = (width as f64 * scale) as u32;
    let mut new_height = (height as f64 * scale) as u32;

    if new_height < MIN_HEIGHT {
        new_width = width;
        new_height = height;
    }

    (new_width / 2 * 2, new_height / 2 * 2)
}

/// Center-trim window for sources longer than `max_duration`:
/// equal amounts come off both ends.
pub fn trim_window(duration: f64, max_duration: f64) -> Option<(f64, f64)> {
    if duration > max_duration {
        let start = ((duration - max_duration) / 2.0).max(0.0);
        Some((start, max_duration))
    } else {
        None
    }
}

/// Progress information for callbacks.
#[derive(Debug, Clone)]
pub enum CompressProgress {
    /// Files discovered, run starting.
    Started { total: usize },
    /// A job finished successfully.
    JobDone {
        file_name: String,
        completed: usize,
        total: usize,
    },
    /// A job failed; the original was restored from backup.
    JobFailed {
        file_name: String,
        error: String,
        completed: usize,
        total: usize,
    },
    /// All jobs drained.
    Done,
}

/// Summary of a compression run.
#[derive(Debug, Clone, Default)]
pub struct CompressSummary {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
    /// One entry per failed file.
    pub errors: Vec<String>,
}

/// Run one file through backup, probe, encode and swap.
///
/// Every failure path after the backup restores the original from its
/// backup copy and removes any partial output, then surfaces the error as
/// the job result.
pub async fn run_job<P, E>(
    prober: &P,
    encoder: &E,
    input: &Path,
    options: &CompressOptions,
) -> Result<(), CompressError>
where
    P: MediaProber,
    E: VideoEncoder,
{
    if scanner::in_backup_dir(input) {
        return Err(CompressError::InBackupDir(input.display().to_string()));
    }
    if !input.is_file() {
        return Err(CompressError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            input.display().to_string(),
        )));
    }

    let backup_path = ensure_backup(input).await?;

    let temp_path = temp_output_path(input, &options.video_ext);
    match encode_replacement(prober, encoder, input, &temp_path, options).await {
        Ok(()) => Ok(()),
        Err(e) => {
            restore_from_backup(input, &backup_path).await;
            if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("could not remove partial output {}: {cleanup}", temp_path.display());
                }
            }
            Err(e)
        }
    }
}

/// Copy the source into the sibling `backup` directory unless a backup is
/// already there. Existing backups are never overwritten: if a previous
/// run failed, the backup is still the pristine original.
async fn ensure_backup(input: &Path) -> Result<PathBuf, CompressError> {
    let parent = input.parent().unwrap_or_else(|| Path::new("."));
    let backup_dir = parent.join(BACKUP_DIR_NAME);
    tokio::fs::create_dir_all(&backup_dir).await?;

    let file_name = input
        .file_name()
        .ok_or_else(|| CompressError::encode("input has no file name"))?;
    let backup_path = backup_dir.join(file_name);
    match tokio::fs::try_exists(&backup_path).await {
        Ok(true) => log::debug!("reusing existing backup for {}", input.display()),
        _ => {
            tokio::fs::copy(input, &backup_path).await?;
            log::debug!("backed up {} to {}", input.display(), backup_path.display());
        }
    }
    Ok(backup_path)
}

/// Probe, encode to `temp_path`, validate, rename over the original.
async fn encode_replacement<P, E>(
    prober: &P,
    encoder: &E,
    input: &Path,
    temp_path: &Path,
    options: &CompressOptions,
) -> Result<(), CompressError>
where
    P: MediaProber,
    E: VideoEncoder,
{
    let info = match prober.probe(input).await {
        Ok(info) => info,
        Err(e) => {
            log::warn!("probe failed for {} ({e}), using fallback values", input.display());
            ProbeInfo::fallback()
        }
    };

    let (width, height) = target_dimensions(info.width, info.height, options.scale);
    let request = EncodeRequest {
        input: input.to_path_buf(),
        output: temp_path.to_path_buf(),
        width,
        height,
        crf: options.crf,
        trim: trim_window(info.duration, options.max_duration),
    };

    encoder.encode(&request).await?;

    let meta = tokio::fs::metadata(temp_path)
        .await
        .map_err(|_| CompressError::EmptyOutput(temp_path.display().to_string()))?;
    if meta.len() == 0 {
        return Err(CompressError::EmptyOutput(temp_path.display().to_string()));
    }

    tokio::fs::rename(temp_path, input).await?;
    Ok(())
}

/// Best-effort restore; a failed restore is logged, the original job error
/// still wins.
async fn restore_from_backup(input: &Path, backup_path: &Path) {
    match tokio::fs::copy(backup_path, input).await {
        Ok(_) => log::info!("restored {} from backup", input.display()),
        Err(e) => log::error!(
            "could not restore {} from {}: {e}",
            input.display(),
            backup_path.display()
        ),
    }
}

/// Temp output next to the input: `clip.mp4` encodes into `clip.tmp.mp4`.
/// Paths are unique per job, so no random component is needed.
fn temp_output_path(input: &Path, ext: &str) -> PathBuf {
    input.with_extension(format!("tmp.{ext}"))
}

/// Compress every qualifying video under `media_dir`.
///
/// Jobs are dispatched to a fixed pool of [`CompressOptions::workers`]
/// workers; completion order is whichever finishes first. Per-file
/// failures go into the summary and the batch keeps going.
pub async fn run_compression<P, E>(
    media_dir: &Path,
    options: CompressOptions,
    prober: P,
    encoder: E,
    progress: &dyn Fn(CompressProgress),
) -> Result<CompressSummary, CompressError>
where
    P: MediaProber + 'static,
    E: VideoEncoder + 'static,
{
    let files = scanner::scan_video_files(media_dir, &options.video_ext)?;
    let mut summary = CompressSummary {
        total: files.len(),
        ..Default::default()
    };
    progress(CompressProgress::Started { total: summary.total });
    if files.is_empty() {
        progress(CompressProgress::Done);
        return Ok(summary);
    }

    let mut results = spawn_workers(files, Arc::new(prober), Arc::new(encoder), Arc::new(options));

    while let Some((path, result)) = results.recv().await {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        match result {
            Ok(()) => {
                summary.completed += 1;
                progress(CompressProgress::JobDone {
                    file_name,
                    completed: summary.completed + summary.failed,
                    total: summary.total,
                });
            }
            Err(e) => {
                summary.failed += 1;
                log::warn!("compression failed for {}: {e}", path.display());
                summary.errors.push(format!("{file_name}: {e}"));
                progress(CompressProgress::JobFailed {
                    file_name,
                    error: e.to_string(),
                    completed: summary.completed + summary.failed,
                    total: summary.total,
                });
            }
        }
    }

    progress(CompressProgress::Done);
    log::info!(
        "compression finished: {}/{} succeeded, {} failed",
        summary.completed,
        summary.total,
        summary.failed
    );
    Ok(summary)
}

/// One finished job: the file it worked on and how it went.
type JobResult = (PathBuf, Result<(), CompressError>);

/// Fan the job list out to [`CompressOptions::workers`] encode tasks and
/// stream results back as they finish.
///
/// The job channel is bounded at the worker count, so discovery never
/// races far ahead of encoding and at most `workers` files are in flight
/// at once. Feeding happens on its own task; once the last job is handed
/// out the channel closes and the workers drain and exit. Each worker
/// holds a clone of the job receiver (`async_channel` receivers are
/// `Clone`), so no locking is needed around the queue.
///
/// Every job runs under [`JOB_DEADLINE`]. A job that blows the deadline
/// is reported as a [`CompressError::Timeout`] result like any other
/// failure; the worker moves on and the result stream stays complete.
fn spawn_workers<P, E>(
    jobs: Vec<PathBuf>,
    prober: Arc<P>,
    encoder: Arc<E>,
    options: Arc<CompressOptions>,
) -> mpsc::UnboundedReceiver<JobResult>
where
    P: MediaProber + 'static,
    E: VideoEncoder + 'static,
{
    let workers = options.workers.max(1);
    let (job_tx, job_rx) = async_channel::bounded::<PathBuf>(workers);
    let (result_tx, result_rx) = mpsc::unbounded_channel::<JobResult>();

    for _ in 0..workers {
        let job_rx = job_rx.clone();
        let result_tx = result_tx.clone();
        let prober = prober.clone();
        let encoder = encoder.clone();
        let options = options.clone();
        tokio::spawn(async move {
            while let Ok(path) = job_rx.recv().await {
                let job = run_job(prober.as_ref(), encoder.as_ref(), &path, &options);
                let outcome = match tokio::time::timeout(JOB_DEADLINE, job).await {
                    Ok(result) => result,
                    Err(_) => {
                        log::warn!(
                            "job for {} ran past {}s, giving up on it",
                            path.display(),
                            JOB_DEADLINE.as_secs()
                        );
                        Err(CompressError::Timeout(JOB_DEADLINE.as_secs()))
                    }
                };
                if result_tx.send((path, outcome)).is_err() {
                    // Caller stopped listening
                    break;
                }
            }
        });
    }
    // Workers hold the remaining result senders; the channel closes when
    // the last of them exits
    drop(result_tx);

    tokio::spawn(async move {
        for path in jobs {
            if job_tx.send(path).await.is_err() {
                break;
            }
        }
    });

    result_rx
}

#[cfg(test)]
#[path = "tests/compress_tests.rs"]
mod tests;
