// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — the two document codecs and the object, content and text
// plumbing they share.

pub mod annotations;
pub mod codec;
pub(crate) mod content;
pub(crate) mod objects;
pub(crate) mod raster;
pub mod render;
pub mod structure;
pub mod text;

pub use codec::{Codec, RenderCodec};
pub use render::RenderHandle;
pub use structure::StructureHandle;
pub use text::{base14_font, is_base14};
