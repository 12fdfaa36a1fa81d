//! Frame buffer management
//!
//! Holds one or two caller-owned RGB565 buffers and tracks which one is
//! being shown. The front slot is what a push streams out; the back slot is
//! where the caller draws. With a single buffer both are the same slot.
//!
//! Pixels are little-endian, row-major, without row padding.

use crate::devices::anx7625::error::{BridgeError, BridgeResult};
use crate::display::modes::BYTES_PER_PIXEL;
use heapless::Vec;

/// Destination of a frame push
///
/// The push protocol is `begin_frame(offset)`, any number of
/// `write_chunk()` calls of at most `chunk_size()` bytes, then
/// `commit_frame()` once the last byte of the frame is out.
pub trait PixelSink {
    /// Largest chunk `write_chunk` accepts
    fn chunk_size(&self) -> usize;

    /// Position the window at byte `offset` of the frame
    fn begin_frame(&mut self, offset: usize) -> BridgeResult<()>;

    fn write_chunk(&mut self, bytes: &[u8]) -> BridgeResult<()>;

    /// Latch the completed frame
    fn commit_frame(&mut self) -> BridgeResult<()>;
}

/// Buffering configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferMode {
    /// One buffer, re-sent in place after each present
    Single,
    /// Two buffers swapped on each present
    Double,
}

/// Role a bound buffer currently plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotRole {
    /// Shown and streamed out by pushes
    Primary,
    /// Drawn into, shown by the next present
    Pending,
}

/// Reference to one bound buffer
///
/// Only handed out by [`FrameBufferManager`]; the role it plays changes
/// with every double-buffer swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameSlot {
    index: u8,
}

impl FrameSlot {
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// Result of one push call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PushOutcome {
    /// Bytes written by this call
    pub bytes: usize,
    /// The frame was committed by this call
    pub complete: bool,
}

/// Single or double buffered RGB565 frame store
pub struct FrameBufferManager<'a> {
    slots: Vec<&'a mut [u8], 2>,
    width: u16,
    height: u16,
    active: usize,
    pending: bool,
    cursor: usize,
    presents: u32,
    frames: u32,
}

impl<'a> FrameBufferManager<'a> {
    /// Bind one buffer
    pub fn single(buffer: &'a mut [u8], width: u16, height: u16) -> BridgeResult<Self> {
        Self::bind(buffer, None, width, height)
    }

    /// Bind two buffers; `front` is shown first
    pub fn double(
        front: &'a mut [u8],
        back: &'a mut [u8],
        width: u16,
        height: u16,
    ) -> BridgeResult<Self> {
        Self::bind(front, Some(back), width, height)
    }

    /// Bind one or two buffers, checking each is exactly `width * height * 2` bytes
    pub fn bind(
        front: &'a mut [u8],
        back: Option<&'a mut [u8]>,
        width: u16,
        height: u16,
    ) -> BridgeResult<Self> {
        if width == 0 || height == 0 {
            return Err(BridgeError::InvalidConfig("frame size must be non-zero"));
        }
        let expected = frame_len(width, height);
        check_len(expected, front.len())?;

        let mut slots = Vec::new();
        slots
            .push(front)
            .map_err(|_| BridgeError::InvalidConfig("too many buffers"))?;
        if let Some(back) = back {
            check_len(expected, back.len())?;
            slots
                .push(back)
                .map_err(|_| BridgeError::InvalidConfig("too many buffers"))?;
        }

        Ok(Self {
            slots,
            width,
            height,
            active: 0,
            pending: false,
            cursor: 0,
            presents: 0,
            frames: 0,
        })
    }

    pub fn mode(&self) -> BufferMode {
        if self.slots.len() == 2 {
            BufferMode::Double
        } else {
            BufferMode::Single
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Bytes per frame
    pub fn frame_len(&self) -> usize {
        frame_len(self.width, self.height)
    }

    /// Index of the slot being shown
    pub fn active_index(&self) -> usize {
        self.active
    }

    fn back_index(&self) -> usize {
        match self.mode() {
            BufferMode::Double => 1 - self.active,
            BufferMode::Single => self.active,
        }
    }

    /// Slot the caller draws into
    pub fn back_slot(&self) -> FrameSlot {
        FrameSlot {
            index: self.back_index() as u8,
        }
    }

    /// Slot a push streams out
    pub fn front_slot(&self) -> FrameSlot {
        FrameSlot {
            index: self.active as u8,
        }
    }

    /// Current role of `slot`; the only slot of a single buffer is `Primary`
    pub fn role(&self, slot: FrameSlot) -> SlotRole {
        if slot.index() == self.active {
            SlotRole::Primary
        } else {
            SlotRole::Pending
        }
    }

    /// Bytes of a bound slot
    pub fn slot_mut(&mut self, slot: FrameSlot) -> BridgeResult<&mut [u8]> {
        match self.slots.get_mut(slot.index()) {
            Some(buffer) => Ok(&mut **buffer),
            None => Err(BridgeError::InvalidConfig("frame slot not bound")),
        }
    }

    /// Drawing slot as bytes
    pub fn back_buffer_mut(&mut self) -> &mut [u8] {
        let index = self.back_index();
        &mut *self.slots[index]
    }

    /// Slot a push streams out
    pub fn front_buffer(&self) -> &[u8] {
        &self.slots[self.active]
    }

    /// A frame is waiting to be pushed
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Bytes of the pending frame already pushed
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn presents(&self) -> u32 {
        self.presents
    }

    /// Frames committed so far
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Show the back buffer
    ///
    /// Double buffering swaps the slots without copying; single buffering
    /// marks the slot dirty. Either way the next push starts from byte 0,
    /// abandoning a push still in flight.
    pub fn present(&mut self) {
        if self.mode() == BufferMode::Double {
            self.active = 1 - self.active;
        }
        self.presents = self.presents.wrapping_add(1);
        self.mark_pending();
    }

    /// Show a bound slot holding a `width x height` frame
    ///
    /// A `Pending` slot is swapped in like [`present`](Self::present); the
    /// `Primary` slot is re-sent in place. No bytes are copied.
    pub fn present_slot(&mut self, slot: FrameSlot, width: u16, height: u16) -> BridgeResult<()> {
        if (width, height) != (self.width, self.height) {
            return Err(BridgeError::BufferSizeMismatch {
                expected: self.frame_len(),
                actual: frame_len(width, height),
            });
        }
        if slot.index() >= self.slots.len() {
            return Err(BridgeError::InvalidConfig("frame slot not bound"));
        }
        match self.role(slot) {
            SlotRole::Pending => self.present(),
            SlotRole::Primary => {
                self.presents = self.presents.wrapping_add(1);
                self.mark_pending();
            }
        }
        Ok(())
    }

    /// Re-send the front buffer from the start
    pub fn mark_pending(&mut self) {
        self.pending = true;
        self.cursor = 0;
    }

    /// Drop any pending or partial push
    pub fn cancel(&mut self) {
        self.pending = false;
        self.cursor = 0;
    }

    /// Fill the back buffer with one color
    pub fn fill(&mut self, color: u16) {
        fill_slot(self.back_buffer_mut(), color);
    }

    /// Fill every slot with one color
    pub fn fill_all(&mut self, color: u16) {
        for slot in self.slots.iter_mut() {
            fill_slot(slot, color);
        }
    }

    /// Copy a complete `width x height` frame into the back buffer
    pub fn load(&mut self, src: &[u8], width: u16, height: u16) -> BridgeResult<()> {
        let expected = self.frame_len();
        if (width, height) != (self.width, self.height) {
            return Err(BridgeError::BufferSizeMismatch {
                expected,
                actual: frame_len(width, height),
            });
        }
        check_len(expected, src.len())?;
        self.back_buffer_mut().copy_from_slice(src);
        Ok(())
    }

    /// Stream the pending frame into `sink`
    ///
    /// Writes at most `budget` chunks (all remaining with `None`) and
    /// commits once the last byte is out. A partial push resumes at the
    /// cursor on the next call. On error the cursor stays after the last
    /// chunk that went through.
    pub fn push<S: PixelSink>(
        &mut self,
        sink: &mut S,
        budget: Option<usize>,
    ) -> BridgeResult<PushOutcome> {
        let mut outcome = PushOutcome::default();
        if !self.pending {
            return Ok(outcome);
        }

        let chunk = sink.chunk_size().max(1);
        let front: &[u8] = &self.slots[self.active];
        let len = front.len();

        sink.begin_frame(self.cursor)?;
        let mut chunks = 0;
        while self.cursor < len {
            if budget.is_some_and(|b| chunks >= b) {
                break;
            }
            let end = core::cmp::min(self.cursor + chunk, len);
            sink.write_chunk(&front[self.cursor..end])?;
            outcome.bytes += end - self.cursor;
            self.cursor = end;
            chunks += 1;
        }

        if self.cursor >= len {
            sink.commit_frame()?;
            self.pending = false;
            self.cursor = 0;
            self.frames = self.frames.wrapping_add(1);
            outcome.complete = true;
        }
        Ok(outcome)
    }
}

fn frame_len(width: u16, height: u16) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

fn check_len(expected: usize, actual: usize) -> BridgeResult<()> {
    if expected != actual {
        return Err(BridgeError::BufferSizeMismatch { expected, actual });
    }
    Ok(())
}

fn fill_slot(slot: &mut [u8], color: u16) {
    let bytes = color.to_le_bytes();
    for pixel in slot.chunks_exact_mut(BYTES_PER_PIXEL) {
        pixel.copy_from_slice(&bytes);
    }
}
