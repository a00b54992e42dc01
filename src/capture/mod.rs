//! Frame graph event capture.
//!
//! An [`EventCapture`] records what the scheduler did, frame by frame, as
//! strongly typed [`CaptureEvent`]s with monotonic timestamps. The log can be
//! exported as line-oriented text: a header with the event and frame counts,
//! then one comma-separated event per line.
//!
//! ```text
//! FrameGraphCapture,events=3,frames=1
//! 0,FrameBegun,frame=1,generation=7
//! 12,ObjectCreated,object=obj1,shape=buffer 256 bytes
//! 15,FrameCompleted,generation=7,executed=0
//! ```

use std::fmt::{self, Write as _};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::pool::ObjectId;

/// A capture shared between a frame graph and its object map.
pub type SharedCapture = Arc<Mutex<EventCapture>>;

/// Something the scheduler did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    FrameBegun { frame: u64, generation: u64 },
    PassPrepared { pass: String, position: usize },
    PassExecuted { pass: String, position: usize },
    PassFailed { pass: String, error: String },
    ResourceDeclared { ticket: String, shape: String },
    ResourceAcquired { ticket: String, object: ObjectId },
    ResourceReleased { ticket: String, object: ObjectId },
    ResourceForceReleased { ticket: String, object: ObjectId },
    ObjectCreated { object: ObjectId, shape: String },
    ObjectReallocated { object: ObjectId, from: String, to: String },
    ObjectDisposed { object: ObjectId },
    FrameCompleted { generation: u64, executed: usize },
    FrameAborted { generation: u64, reason: String },
}

impl CaptureEvent {
    /// Event name as written in exports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FrameBegun { .. } => "FrameBegun",
            Self::PassPrepared { .. } => "PassPrepared",
            Self::PassExecuted { .. } => "PassExecuted",
            Self::PassFailed { .. } => "PassFailed",
            Self::ResourceDeclared { .. } => "ResourceDeclared",
            Self::ResourceAcquired { .. } => "ResourceAcquired",
            Self::ResourceReleased { .. } => "ResourceReleased",
            Self::ResourceForceReleased { .. } => "ResourceForceReleased",
            Self::ObjectCreated { .. } => "ObjectCreated",
            Self::ObjectReallocated { .. } => "ObjectReallocated",
            Self::ObjectDisposed { .. } => "ObjectDisposed",
            Self::FrameCompleted { .. } => "FrameCompleted",
            Self::FrameAborted { .. } => "FrameAborted",
        }
    }
}

/// Writes the event's fields as `key=value` pairs separated by commas.
impl fmt::Display for CaptureEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        match self {
            Self::FrameBegun { frame, generation } => {
                write!(f, ",frame={frame},generation={generation}")
            }
            Self::PassPrepared { pass, position } | Self::PassExecuted { pass, position } => {
                write!(f, ",pass={},position={position}", Field(pass))
            }
            Self::PassFailed { pass, error } => {
                write!(f, ",pass={},error={}", Field(pass), Field(error))
            }
            Self::ResourceDeclared { ticket, shape } => {
                write!(f, ",ticket={},shape={}", Field(ticket), Field(shape))
            }
            Self::ResourceAcquired { ticket, object }
            | Self::ResourceReleased { ticket, object }
            | Self::ResourceForceReleased { ticket, object } => {
                write!(f, ",ticket={},object={object}", Field(ticket))
            }
            Self::ObjectCreated { object, shape } => {
                write!(f, ",object={object},shape={}", Field(shape))
            }
            Self::ObjectReallocated { object, from, to } => {
                write!(f, ",object={object},from={},to={}", Field(from), Field(to))
            }
            Self::ObjectDisposed { object } => write!(f, ",object={object}"),
            Self::FrameCompleted {
                generation,
                executed,
            } => write!(f, ",generation={generation},executed={executed}"),
            Self::FrameAborted { generation, reason } => {
                write!(f, ",generation={generation},reason={}", Field(reason))
            }
        }
    }
}

/// Free text with separators and line breaks replaced.
struct Field<'a>(&'a str);

impl fmt::Display for Field<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                ',' => f.write_char(';')?,
                '\n' | '\r' => f.write_char(' ')?,
                c => f.write_char(c)?,
            }
        }
        Ok(())
    }
}

/// An event with the time it was recorded, relative to the capture start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    pub timestamp: Duration,
    pub event: CaptureEvent,
}

/// In-memory event log.
#[derive(Debug)]
pub struct EventCapture {
    start: Instant,
    last_timestamp: Duration,
    events: Vec<CapturedEvent>,
    frames: u64,
}

impl EventCapture {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            last_timestamp: Duration::ZERO,
            events: Vec::new(),
            frames: 0,
        }
    }

    /// Wrap the capture for sharing.
    pub fn shared(self) -> SharedCapture {
        Arc::new(Mutex::new(self))
    }

    pub fn record(&mut self, event: CaptureEvent) {
        if matches!(event, CaptureEvent::FrameBegun { .. }) {
            self.frames += 1;
        }
        let timestamp = self.start.elapsed().max(self.last_timestamp);
        self.last_timestamp = timestamp;
        self.events.push(CapturedEvent { timestamp, event });
    }

    pub fn events(&self) -> &[CapturedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of frames begun since the capture started.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Forget all events. Timestamps keep counting from the original start.
    pub fn clear(&mut self) {
        self.events.clear();
        self.frames = 0;
    }

    /// Render the log as text. Timestamps are in microseconds.
    pub fn export(&self) -> String {
        let mut out = format!(
            "FrameGraphCapture,events={},frames={}\n",
            self.events.len(),
            self.frames
        );
        for captured in &self.events {
            let _ = writeln!(out, "{},{}", captured.timestamp.as_micros(), captured.event);
        }
        out
    }

    pub fn export_to_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        fs::write(path, self.export())?;
        log::info!("Wrote {} capture events to {}", self.events.len(), path.display());
        Ok(())
    }
}

impl Default for EventCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_format() {
        let mut capture = EventCapture::new();
        capture.record(CaptureEvent::FrameBegun {
            frame: 1,
            generation: 5,
        });
        capture.record(CaptureEvent::PassFailed {
            pass: "shadow".into(),
            error: "bad, very bad".into(),
        });
        capture.record(CaptureEvent::ObjectDisposed {
            object: ObjectId::new(3),
        });

        let text = capture.export();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "FrameGraphCapture,events=3,frames=1");
        assert_eq!(lines.len(), 4);
        assert!(lines[1].ends_with(",FrameBegun,frame=1,generation=5"));
        assert!(lines[2].ends_with(",PassFailed,pass=shadow,error=bad; very bad"));
        assert!(lines[3].ends_with(",ObjectDisposed,object=obj3"));
    }

    #[test]
    fn test_timestamps_are_monotonic() {
        let mut capture = EventCapture::new();
        for i in 0..100 {
            capture.record(CaptureEvent::ObjectDisposed {
                object: ObjectId::new(i),
            });
        }
        assert!(capture
            .events()
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp));
    }

    #[test]
    fn test_clear() {
        let mut capture = EventCapture::new();
        capture.record(CaptureEvent::FrameBegun {
            frame: 1,
            generation: 1,
        });
        capture.clear();
        assert!(capture.is_empty());
        assert_eq!(capture.frame_count(), 0);
    }
}
