use crate::error::ControllerError;
use crate::feed::{DetectionFeed, DetectionFrame};
use std::path::Path;

/// Replays a fixed list of detection frames, one per tick.
#[derive(Debug, Clone)]
pub struct ScriptedFeed {
    frames: Vec<DetectionFrame>,
    cursor: usize,
    looping: bool,
}

impl ScriptedFeed {
    pub fn new(frames: Vec<DetectionFrame>, looping: bool) -> Self {
        Self {
            frames,
            cursor: 0,
            looping,
        }
    }

    /// Load a JSON array of frames.
    pub fn from_path(path: impl AsRef<Path>, looping: bool) -> Result<Self, ControllerError> {
        let contents = std::fs::read_to_string(path)?;
        let frames: Vec<DetectionFrame> = serde_json::from_str(&contents)?;
        Ok(Self::new(frames, looping))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        !self.looping && self.cursor >= self.frames.len()
    }
}

impl DetectionFeed for ScriptedFeed {
    fn next_frame(&mut self) -> Option<DetectionFrame> {
        if self.frames.is_empty() {
            return None;
        }
        if self.cursor >= self.frames.len() {
            if !self.looping {
                return None;
            }
            self.cursor = 0;
        }
        let frame = self.frames[self.cursor].clone();
        self.cursor += 1;
        Some(frame)
    }
}
