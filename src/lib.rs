//! kino - a terminal media viewer with Kitty graphics support
//!
//! Browses directories, shows images and animated GIFs, and plays video
//! inline in the terminal with:
//! - Kitty graphics protocol, Sixel, and half-block rendering backends
//! - A real-time decode/present pipeline with jitter smoothing and
//!   late-frame recovery
//! - Image preloading around the browser selection

pub mod app;
pub mod browser;
pub mod config;
pub mod error;
pub mod event;
pub mod graphics;
pub mod layout;
pub mod player;
pub mod preload;
pub mod render;
pub mod terminal;
pub mod viewer;

// Re-export commonly used types
pub use app::App;
pub use browser::{Browser, EntryKind, FileEntry};
pub use config::Config;
pub use error::MediaError;
pub use event::{Event, Key};
pub use graphics::{EncodedFrame, FrameEncoder, GraphicsBackend};
pub use layout::Rect;
pub use player::{FrameQueue, FrameRecord, MediaSource, Picture, VideoPlayer};
pub use preload::PreloadCache;
pub use render::{Renderer, TermSink};
pub use terminal::{TerminalCapabilities, TerminalContext, TerminalGeometry};
pub use viewer::ImageView;
