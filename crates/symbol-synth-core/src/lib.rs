//! Core library for synthesizing object-detection training data.
//!
//! - Placement: symbols are pasted onto a copy of a background at random, non-overlapping
//!   positions, largest first, with a fixed number of attempts per symbol
//! - Annotations: one normalized `class x_center y_center width height` box per placed symbol
//! - Session: draw pool, per-image batches, optional resize/rotation/matte, output sinks
//! - Export: YOLO label directories to CreateML-style JSON; synthetic backgrounds
//! - Label cards: a row of symbols on a white card pasted onto a synthetic background
//!
//! Quick example:
//! ```ignore
//! use rand::SeedableRng;
//! use symbol_synth_core::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let symbols = SymbolLibrary::load_dir("symbols".as_ref())?;
//! let backgrounds = BackgroundLibrary::load_dir("backgrounds".as_ref())?;
//! let cfg = SynthConfig::builder().occurrences_per_class(50).per_image(2, 6).build();
//! let session = DatasetSession::new(symbols, backgrounds, cfg)?;
//! let mut sink = DirectorySink::create("out".as_ref(), OutputFormat::Jpeg)?;
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//! let stats = session.generate(&mut rng, &mut sink)?;
//! println!("{}", stats.summary());
//! # Ok(()) }
//! ```

pub mod background;
pub mod compositing;
pub mod config;
pub mod error;
pub mod export;
pub mod label_card;
pub mod library;
pub mod model;
pub mod placement;
pub mod session;
pub mod sink;
pub mod transform;

pub use config::*;
pub use error::*;
pub use export::*;
pub use model::*;
pub use placement::*;

/// Convenience prelude for common types and functions.
/// Importing `symbol_synth_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::background::{BackgroundStyle, synthesize_background};
    pub use crate::config::{OutputFormat, SynthConfig, SynthConfigBuilder};
    pub use crate::error::{Result, SynthError};
    pub use crate::label_card::{LabelCardStyle, synthesize_labeled_example};
    pub use crate::library::{BackgroundLibrary, SymbolLibrary};
    pub use crate::model::{Annotation, GenerationStats, Placement, Rect, SkipReason};
    pub use crate::placement::{PlacementEngine, PlacementResult, SymbolInstance, place_symbols};
    pub use crate::session::{BatchPlan, DatasetSession};
    pub use crate::sink::{DirectorySink, Example, ExampleSink};
}
