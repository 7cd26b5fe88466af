use std::{
    ffi::{OsStr, OsString},
    io::prelude::*,
    path::{Path, PathBuf},
    process::{Child, ChildStdout, Command, Stdio},
    thread::JoinHandle,
    time::{Duration, Instant},
};

#[cfg(target_family = "windows")]
use std::os::windows::process::CommandExt;

use image::RgbImage;
use FfmpegCommandName::*;
use FfmpegError::*;

use crate::*;

const FFPROBE_TIMEOUT_SECS: u64 = 60;

// Attempt to prevent OOM on very implausible sizes
const MAX_FRAME_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// Decoded frames of one video, in display order.
///
/// Yields `Err` at most once, after which the iterator is finished. The ffmpeg
/// process is killed and reaped when the iterator is dropped.
#[derive(Debug)]
pub struct FfmpegFrameIterRgb {
    width: u32,
    height: u32,
    child: Child,
    stdout: ChildStdout,
    num_frames: u32,
    frames_read: u32,
    deadline: Option<(Instant, u64)>,
    finished: bool,
}

impl FfmpegFrameIterRgb {
    pub fn frames_read(&self) -> u32 {
        self.frames_read
    }

    fn finish(&mut self) {
        self.finished = true;
        let _kill_error = self.child.kill();
        let _wait_error = self.child.wait();
    }

    // called once ffmpeg has closed its stdout. A nonzero exit code means ffmpeg
    // gave up on the video rather than reaching its end.
    fn end_of_stream(&mut self) -> Option<Result<RgbImage, FfmpegError>> {
        self.finished = true;
        match self.child.wait() {
            Ok(status) if status.success() => None,
            Ok(status) => Some(Err(FfmpegInternal(format!(
                "ffmpeg exited with {status} after {} frames",
                self.frames_read
            )))),
            Err(e) => Some(Err(Io(format!("{:?}", e.kind())))),
        }
    }
}

impl Iterator for FfmpegFrameIterRgb {
    type Item = Result<RgbImage, FfmpegError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if self.frames_read >= self.num_frames {
            self.finish();
            return None;
        }

        if let Some((deadline, secs)) = self.deadline {
            if Instant::now() > deadline {
                self.finish();
                return Some(Err(Timeout(secs)));
            }
        }

        let mut raw_buf = vec![0u8; frame_bytes(self.width, self.height)?];
        match read_frame(&mut self.stdout, &mut raw_buf) {
            Ok(true) => (),
            Ok(false) => return self.end_of_stream(),
            Err(e) => {
                self.finish();
                return Some(Err(Io(format!("{:?}", e.kind()))));
            }
        }

        self.frames_read += 1;

        let frame = RgbImage::from_raw(self.width, self.height, raw_buf)
            .ok_or(FrameTooLarge(self.width, self.height));
        Some(frame)
    }
}

// to prevent accumulation of zombie processes, reap the return code of
// ffmpeg subcommands (if nothing else has done so already) here
impl Drop for FfmpegFrameIterRgb {
    fn drop(&mut self) {
        let _kill_error = self.child.kill();
        let _wait_error = self.child.wait();
    }
}

fn frame_bytes(width: u32, height: u32) -> Option<usize> {
    usize::try_from(width)
        .ok()?
        .checked_mul(usize::try_from(height).ok()?)?
        .checked_mul(3)
}

// Also rejects frames that do not fit in memory on this platform.
fn frame_size_is_plausible(width: u32, height: u32) -> bool {
    let bytes = u64::from(width)
        .checked_mul(u64::from(height))
        .and_then(|pixels| pixels.checked_mul(3));
    matches!(bytes, Some(b) if b <= MAX_FRAME_BYTES) && frame_bytes(width, height).is_some()
}

/// Fill `buf` from `reader`. Returns `Ok(false)` if the reader ran dry first: a
/// partial frame at the end of the pipe is treated as the end of the stream.
fn read_frame<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut buf_head = 0;
    while buf_head < buf.len() {
        match reader.read(&mut buf[buf_head..]) {
            Ok(0) => return Ok(false),
            Ok(bytes_read) => buf_head += bytes_read,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => (),
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

/// Configures and spawns an ffmpeg process that decodes a video to raw RGB24 frames.
#[derive(Clone, Debug)]
pub struct FfmpegFrameReaderBuilder {
    src_path: PathBuf,
    fps: Option<String>,
    multithreaded: bool,
    num_frames: Option<u32>,
    start_offset: Option<Duration>,
    timeout_secs: Option<u64>,
}

impl FfmpegFrameReaderBuilder {
    pub fn new(src_path: impl AsRef<Path>) -> Self {
        Self {
            src_path: src_path.as_ref().to_path_buf(),
            fps: None,
            multithreaded: false,
            num_frames: None,
            start_offset: None,
            timeout_secs: None,
        }
    }

    pub fn src_path(&self) -> &Path {
        &self.src_path
    }

    /// Subsample the video to this frame rate, in any form ffmpeg's `fps` filter
    /// accepts (`"5"`, `"30000/1001"`, ...).
    pub fn fps(&mut self, fps: impl AsRef<str>) -> &mut Self {
        self.fps = Some(fps.as_ref().to_string());
        self
    }

    pub fn multithreaded(&mut self, val: bool) -> &mut Self {
        self.multithreaded = val;
        self
    }

    /// Stop after this many frames.
    pub fn num_frames(&mut self, num_frames: u32) -> &mut Self {
        self.num_frames = Some(num_frames);
        self
    }

    /// Begin decoding at this position in the video.
    pub fn start_offset(&mut self, offset: Duration) -> &mut Self {
        self.start_offset = Some(offset);
        self
    }

    /// Give up (yielding [`FfmpegError::Timeout`]) if decoding takes longer than this.
    pub fn timeout_secs(&mut self, timeout_secs: u64) -> &mut Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn spawn_rgb(&self) -> Result<(FfmpegFrameIterRgb, VideoInfo), FfmpegError> {
        //we need to find out the resolution of the video so that stdout can be converted into frames.
        let stats = VideoInfo::new(&self.src_path)?;

        //bail out if we get invalid dimensions.
        let (width, height) = stats.resolution();
        if width == 0 || height == 0 {
            return Err(InvalidResolution);
        }
        if !frame_size_is_plausible(width, height) {
            return Err(FrameTooLarge(width, height));
        }

        let args = self.decode_args();
        log::debug!(
            target: "ffmpeg",
            "spawning ffmpeg {}",
            args.iter()
                .map(|arg| arg.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let mut child = spawn_ffmpeg_command(Ffmpeg, &args, Stdio::null())?;
        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _kill_error = child.kill();
                let _wait_error = child.wait();
                return Err(Io("ffmpeg stdout was not captured".to_string()));
            }
        };

        let frame_iterator = FfmpegFrameIterRgb {
            width,
            height,
            child,
            stdout,
            num_frames: self.num_frames.unwrap_or(u32::MAX),
            frames_read: 0,
            deadline: self
                .timeout_secs
                .map(|secs| (Instant::now() + Duration::from_secs(secs), secs)),
            finished: false,
        };

        Ok((frame_iterator, stats))
    }

    fn decode_args(&self) -> Vec<OsString> {
        #[rustfmt::skip]
        let mut args: Vec<OsString> = vec![
            "-hide_banner".into(),
            "-loglevel".into(), "warning".into(),
            "-nostats".into(),
        ];

        if !self.multithreaded {
            args.extend(["-threads".into(), "1".into()]);
        }

        if let Some(offset) = self.start_offset {
            args.extend(["-ss".into(), format!("{:.3}", offset.as_secs_f64()).into()]);
        }

        args.extend(["-i".into(), self.src_path.clone().into_os_string()]);

        if let Some(fps) = &self.fps {
            args.extend(["-vf".into(), format!("fps={fps}").into()]);
        }

        if let Some(num_frames) = self.num_frames {
            args.extend(["-vframes".into(), num_frames.to_string().into()]);
        }

        #[rustfmt::skip]
        args.extend([
            "-pix_fmt".into(), "rgb24".into(),
            "-c:v".into(),     "rawvideo".into(),
            "-f".into(),       "image2pipe".into(),
            "-".into(),
        ]);

        args
    }
}

/// Run ffprobe on a file and return its JSON description of the file's format and streams.
pub fn get_video_stats<P: AsRef<Path>>(src_path: P) -> Result<String, FfmpegError> {
    #[rustfmt::skip]
    let args = [
        OsStr::new("-v"),            OsStr::new("quiet"),
        OsStr::new("-show_format"),
        OsStr::new("-show_streams"),
        OsStr::new("-print_format"), OsStr::new("json"),
        src_path.as_ref().as_os_str(),
    ];

    let stdout = run_ffmpeg_command(Ffprobe, &args)?;

    String::from_utf8(stdout).map_err(|_| Utf8Conversion)
}

pub fn ffmpeg_and_ffprobe_are_callable() -> bool {
    [Ffprobe, Ffmpeg]
        .into_iter()
        .all(|name| run_ffmpeg_command(name, &[OsStr::new("-version")]).is_ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FfmpegCommandName {
    Ffprobe,
    Ffmpeg,
}

impl FfmpegCommandName {
    pub fn as_os_str(&self) -> &'static OsStr {
        match self {
            Self::Ffprobe => OsStr::new("ffprobe"),
            Self::Ffmpeg => OsStr::new("ffmpeg"),
        }
    }
}

fn spawn_ffmpeg_command<S: AsRef<OsStr>>(
    name: FfmpegCommandName,
    args: &[S],
    stderr_cfg: Stdio,
) -> Result<Child, FfmpegError> {
    let mut command = Command::new(name.as_os_str());
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(stderr_cfg);

    //do not spawn a command window on windows
    #[cfg(target_family = "windows")]
    command.creation_flags(winapi::um::winbase::CREATE_NO_WINDOW);

    command.spawn().map_err(|e| match e.kind() {
        //Separate out NotFound from all other errors as by far the most likely
        //cause is ffmpeg is not installed.
        std::io::ErrorKind::NotFound => FfmpegNotFound,
        _ => Io(format!("{:?}", e.kind())),
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<std::io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut acc = vec![];
        pipe.read_to_end(&mut acc)?;
        Ok(acc)
    })
}

fn join_drain(handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> Result<Vec<u8>, FfmpegError> {
    match handle {
        None => Ok(vec![]),
        Some(handle) => handle
            .join()
            .map_err(|_| Io("pipe reader thread panicked".to_string()))?
            .map_err(|e| Io(format!("{:?}", e.kind()))),
    }
}

// Run a short-lived ffmpeg/ffprobe command to completion and return its stdout.
fn run_ffmpeg_command(name: FfmpegCommandName, args: &[&OsStr]) -> Result<Vec<u8>, FfmpegError> {
    fn truncate_ffmpeg_err_msg(stderr: &[u8]) -> FfmpegError {
        match std::str::from_utf8(stderr) {
            Ok(error_text) => FfmpegInternal(error_text.chars().take(500).collect::<String>()),
            Err(_) => Utf8Conversion,
        }
    }

    let mut child = spawn_ffmpeg_command(name, args, Stdio::piped())?;

    // both pipes are drained on their own threads so that a full stderr cannot
    // stall the child while we wait on stdout.
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + Duration::from_secs(FFPROBE_TIMEOUT_SECS);
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() > deadline => {
                let _kill_error = child.kill();
                let _wait_error = child.wait();
                return Err(Timeout(FFPROBE_TIMEOUT_SECS));
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(1)),
            Err(e) => return Err(Io(format!("{:?}", e.kind()))),
        }
    };

    let stdout = join_drain(stdout)?;
    let stderr = join_drain(stderr)?;

    if status.success() {
        Ok(stdout)
    } else {
        //sometimes ffmpeg creates very long error messages. Limit them to the first 500 characters
        Err(truncate_ffmpeg_err_msg(&stderr))
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_read_frame_full() {
        let mut reader = Cursor::new(vec![1u8; 12]);
        let mut buf = vec![0u8; 6];
        assert!(read_frame(&mut reader, &mut buf).unwrap());
        assert!(read_frame(&mut reader, &mut buf).unwrap());
        assert!(!read_frame(&mut reader, &mut buf).unwrap());
    }

    #[test]
    fn test_read_frame_short_read_is_end() {
        let mut reader = Cursor::new(vec![7u8; 10]);
        let mut buf = vec![0u8; 6];
        assert!(read_frame(&mut reader, &mut buf).unwrap());
        assert!(!read_frame(&mut reader, &mut buf).unwrap());
    }

    #[test]
    fn test_frame_bytes() {
        assert_eq!(frame_bytes(4, 2), Some(24));
        assert_eq!(frame_bytes(0, 100), Some(0));
    }

    #[test]
    fn test_frame_size_limit() {
        assert!(frame_size_is_plausible(3840, 2160));
        assert!(!frame_size_is_plausible(60_000, 60_000));
        assert!(!frame_size_is_plausible(u32::MAX, u32::MAX));
    }

    #[test]
    fn test_decode_args_defaults() {
        let args = FfmpegFrameReaderBuilder::new("cam1.mp4").decode_args();
        let args = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>();

        assert_eq!(
            args,
            vec![
                "-hide_banner", "-loglevel", "warning", "-nostats", "-threads", "1", "-i",
                "cam1.mp4", "-pix_fmt", "rgb24", "-c:v", "rawvideo", "-f", "image2pipe", "-",
            ]
        );
    }

    #[test]
    fn test_decode_args_options() {
        let mut builder = FfmpegFrameReaderBuilder::new("cam1.mp4");
        builder
            .fps("5")
            .num_frames(10)
            .start_offset(Duration::from_millis(2500))
            .multithreaded(true);

        let args = builder
            .decode_args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ");

        assert_eq!(
            args,
            "-hide_banner -loglevel warning -nostats -ss 2.500 -i cam1.mp4 \
             -vf fps=5 -vframes 10 -pix_fmt rgb24 -c:v rawvideo -f image2pipe -"
        );
    }
}
