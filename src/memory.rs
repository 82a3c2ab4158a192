use crate::error::{Error, Result};
use crate::types::Detection;

/// Fixed-depth ring buffer of per-frame detections.
///
/// Each [`push`](DetectionMemory::push) overwrites the oldest frame and
/// returns the union of every remembered frame. Feeding that union back
/// through clustering smooths detections over time: an object seen in
/// several recent frames gathers more members, and so more quality, than a
/// one-frame blip.
#[derive(Debug, Clone)]
pub struct DetectionMemory {
    slots: Vec<Vec<Detection>>,
    cursor: usize,
}

impl DetectionMemory {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidParameter(
                "detection memory size must be positive".into(),
            ));
        }
        Ok(Self {
            slots: vec![Vec::new(); size],
            cursor: 0,
        })
    }

    /// Number of frames remembered.
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Store this frame's detections and return all remembered detections,
    /// in slot order.
    pub fn push(&mut self, detections: Vec<Detection>) -> Vec<Detection> {
        self.slots[self.cursor] = detections;
        self.cursor = (self.cursor + 1) % self.slots.len();
        self.slots.concat()
    }

    /// Forget every remembered frame.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
        self.cursor = 0;
    }
}
