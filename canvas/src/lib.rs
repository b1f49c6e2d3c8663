//! Composer engine for the dorm desktop designer.
//!
//! The crate owns everything between raw pointer input and a finished PNG:
//! the element store, stacking order, drag and context-menu interaction,
//! local persistence and the export pipeline. Hosts supply the platform
//! pieces through small traits ([`input::PointerListeners`],
//! [`persist::KeyValueStore`], [`engine::Confirm`], [`export::RenderTarget`],
//! [`export::DownloadSink`]) and act on the [`engine::Action`]s the engine
//! returns.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Top-level engine and testable [`engine::EngineCore`] |
//! | [`doc`] | Element store and the placed-element record |
//! | [`palette`] | Palette descriptors and the drag payload codec |
//! | [`layer`] | Bring-to-front / send-to-back policy |
//! | [`input`] | Pointer buttons, drag gesture and context-menu state |
//! | [`hit`] | Topmost-element hit testing |
//! | [`geom`] | Points, rectangles and canvas-local clamping |
//! | [`persist`] | Scene snapshots and the key-value store seam |
//! | [`scene`] | Host-neutral render tree |
//! | [`export`] | Watermark, color sanitization and PNG export |
//! | [`consts`] | Footprints, defaults and fixed labels |

pub mod consts;
pub mod doc;
pub mod engine;
pub mod export;
pub mod geom;
pub mod hit;
pub mod input;
pub mod layer;
pub mod palette;
pub mod persist;
pub mod scene;
