//! Render side channel.
//!
//! Frames produced by `Simulation::render` are handed to a `FrameSink`.
//! Sinks only observe; nothing they do flows back into step results.

use crate::simulation::RenderFrame;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Grayscale ramp used to draw pixel frames as text, dark to light.
const SHADES: &[u8] = b" .:-=+*#%@";

/// Consumer of rendered frames.
pub trait FrameSink: Send {
    /// Presents the frame of instance `instance` (0 for single handles).
    fn present(&mut self, instance: usize, frame: &RenderFrame);
}

/// Prints frames to stdout.
///
/// Write failures (e.g. a closed pipe) are logged and the frame dropped.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

impl FrameSink for ConsoleSink {
    fn present(&mut self, instance: usize, frame: &RenderFrame) {
        if let Err(e) = write_frame(&mut io::stdout().lock(), instance, frame) {
            warn!("Dropped frame of env {}: {}", instance, e);
        }
    }
}

fn write_frame(out: &mut impl Write, instance: usize, frame: &RenderFrame) -> io::Result<()> {
    writeln!(out, "[env {}]", instance)?;
    write!(out, "{}", to_text(frame))?;
    out.flush()
}

/// Keeps every presented frame in memory.
///
/// Cloning shares the underlying buffer, so a test can hand one clone to
/// the server and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<(usize, RenderFrame)>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the recorded frames.
    pub fn frames(&self) -> Vec<(usize, RenderFrame)> {
        match self.frames.lock() {
            Ok(frames) => frames.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FrameSink for RecordingSink {
    fn present(&mut self, instance: usize, frame: &RenderFrame) {
        let mut frames = match self.frames.lock() {
            Ok(frames) => frames,
            Err(poisoned) => poisoned.into_inner(),
        };
        frames.push((instance, frame.clone()));
    }
}

/// Converts a frame to printable text.
pub fn to_text(frame: &RenderFrame) -> String {
    match frame {
        RenderFrame::Text(text) => text.clone(),
        RenderFrame::Pixels { width, height, data } => {
            let mut out = String::with_capacity((width + 1) * height);
            for row in data.chunks(*width).take(*height) {
                for &pixel in row {
                    let shade = pixel as usize * (SHADES.len() - 1) / 255;
                    out.push(SHADES[shade] as char);
                }
                out.push('\n');
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixels_to_text() {
        let frame = RenderFrame::Pixels {
            width: 3,
            height: 2,
            data: vec![0, 255, 0, 255, 0, 255],
        };
        assert_eq!(to_text(&frame), " @ \n@ @\n");
    }

    #[test]
    fn test_text_passthrough() {
        let frame = RenderFrame::Text("SFFF\n".to_string());
        assert_eq!(to_text(&frame), "SFFF\n");
    }

    #[test]
    fn test_write_frame_layout() {
        let mut out = Vec::new();
        write_frame(&mut out, 2, &RenderFrame::Text("SF\n".to_string())).unwrap();
        assert_eq!(out, b"[env 2]\nSF\n");
    }

    #[test]
    fn test_write_frame_reports_broken_pipe() {
        struct Closed;
        impl Write for Closed {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::BrokenPipe))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let err = write_frame(&mut Closed, 0, &RenderFrame::Text("x".to_string())).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_recording_sink_shares_buffer() {
        let sink = RecordingSink::new();
        let mut writer: Box<dyn FrameSink> = Box::new(sink.clone());

        writer.present(1, &RenderFrame::Text("a".to_string()));
        writer.present(0, &RenderFrame::Text("b".to_string()));

        let frames = sink.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].0, 1);
        assert_eq!(frames[1].1, RenderFrame::Text("b".to_string()));
    }
}
