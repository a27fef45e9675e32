//! Synthetic screen source for the headless binary and tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use super::{RawFrame, ScreenCapture};

/// Produces a moving gradient so consecutive frames differ.
#[derive(Debug)]
pub struct SimulatedScreen {
    width: u32,
    height: u32,
    tick: AtomicU32,
    available: AtomicBool,
}

impl SimulatedScreen {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tick: AtomicU32::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// While unavailable, [`capture`](ScreenCapture::capture) returns `None`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    /// Number of frames handed out so far.
    pub fn frames_captured(&self) -> u32 {
        self.tick.load(Ordering::Relaxed)
    }
}

impl ScreenCapture for SimulatedScreen {
    fn capture(&self) -> Option<RawFrame> {
        if !self.available.load(Ordering::Relaxed) {
            return None;
        }
        let tick = self.tick.fetch_add(1, Ordering::Relaxed);
        let shift = (tick % 256) as u8;

        let mut rgba = Vec::with_capacity((self.width * self.height * 4) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                let r = ((x * 255) / self.width.max(1)) as u8;
                let g = ((y * 255) / self.height.max(1)) as u8;
                rgba.extend_from_slice(&[r.wrapping_add(shift), g, shift, 255]);
            }
        }

        Some(RawFrame {
            width: self.width,
            height: self.height,
            rgba,
        })
    }
}
