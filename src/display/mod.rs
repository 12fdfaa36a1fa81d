//! Display pipeline
//!
//! - `modes`: static video mode table
//! - `framebuffer`: single/double buffered RGB565 frame store and push
//! - `handle`: caller-owned bridge handle (`begin`/`end`/`poll`/`image`)
//! - `task`: cooperative presentation loop

pub mod framebuffer;
pub mod handle;
pub mod modes;
pub mod task;

pub use framebuffer::{BufferMode, FrameBufferManager, FrameSlot, PixelSink, PushOutcome, SlotRole};
pub use handle::{BridgeHandle, BufferSet, HandleConfig, PollReport};
pub use modes::{lookup, rgb565, DisplayTiming, ModeId, VideoMode, MODES};
pub use task::{
    ExitReason, LinkLossPolicy, LoopConfig, LoopEvent, LoopObserver, LoopStats,
    PresentationLoop, StepOutcome,
};
