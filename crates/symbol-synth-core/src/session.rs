use image::Rgba;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, instrument};

use crate::config::SynthConfig;
use crate::error::{Result, SynthError};
use crate::library::{BackgroundLibrary, SymbolLibrary};
use crate::model::{GenerationStats, SkippedSymbol};
use crate::placement::{PlacementEngine, SymbolInstance};
use crate::sink::{Example, ExampleSink};
use crate::transform::transform_symbol;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Batches composed together on the rayon pool before being handed to the sink.
#[cfg(feature = "parallel")]
const PARALLEL_CHUNK: usize = 64;

/// Every class id repeated `occurrences` times, uniformly shuffled.
pub fn build_draw_pool<R: Rng + ?Sized>(
    num_classes: usize,
    occurrences: usize,
    rng: &mut R,
) -> Vec<usize> {
    let mut pool: Vec<usize> = (0..num_classes)
        .flat_map(|class| std::iter::repeat_n(class, occurrences))
        .collect();
    pool.shuffle(rng);
    pool
}

/// Splits `pool` into consecutive batches whose sizes are drawn uniformly from
/// `[min, max]`. The last batch takes whatever is left and may be shorter.
///
/// Batches are never empty: `min` is raised to 1 and `max` to `min`.
pub fn partition_pool<R: Rng + ?Sized>(
    pool: &[usize],
    min: usize,
    max: usize,
    rng: &mut R,
) -> Vec<Vec<usize>> {
    let lo = min.max(1);
    let hi = max.max(lo);
    let mut batches = Vec::new();
    let mut rest = pool;
    while !rest.is_empty() {
        let size = rng.gen_range(lo..=hi).min(rest.len());
        let (head, tail) = rest.split_at(size);
        batches.push(head.to_vec());
        rest = tail;
    }
    batches
}

/// Everything needed to compose one example, fixed up front so composition
/// can run in any order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub name: String,
    /// Index into the background library.
    pub background: usize,
    /// Class ids drawn for this image, in draw order.
    pub classes: Vec<usize>,
    /// Seed for the transforms and placement of this batch.
    pub seed: u64,
}

/// A composed example with the symbols that did not make it onto the canvas.
#[derive(Debug, Clone)]
pub struct Composed {
    pub example: Example,
    pub requested: usize,
    pub skipped: Vec<SkippedSymbol>,
}

/// Drives dataset generation: plans batches, transforms symbols, runs the
/// placement engine and hands finished examples to a sink.
pub struct DatasetSession {
    symbols: SymbolLibrary,
    backgrounds: BackgroundLibrary,
    cfg: SynthConfig,
    engine: PlacementEngine,
}

impl DatasetSession {
    /// Validates `cfg` against the libraries. Fails before any output is produced.
    pub fn new(
        symbols: SymbolLibrary,
        backgrounds: BackgroundLibrary,
        cfg: SynthConfig,
    ) -> Result<Self> {
        if symbols.is_empty() {
            return Err(SynthError::Empty("symbols"));
        }
        if backgrounds.is_empty() {
            return Err(SynthError::Empty("backgrounds"));
        }
        cfg.validate_for(symbols.len())?;
        let outline = cfg.draw_boxes.then_some(Rgba([255, 0, 0, 255]));
        let engine = PlacementEngine::new(cfg.attempts_per_symbol)?.with_box_outline(outline);
        Ok(Self {
            symbols,
            backgrounds,
            cfg,
            engine,
        })
    }

    pub fn config(&self) -> &SynthConfig {
        &self.cfg
    }

    pub fn symbols(&self) -> &SymbolLibrary {
        &self.symbols
    }

    /// Size of the shuffled draw pool.
    pub fn pool_size(&self) -> usize {
        self.cfg.pool_size(self.symbols.len())
    }

    /// Draws the pool, partitions it and picks a background and seed per batch.
    pub fn plan<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<BatchPlan> {
        let pool = build_draw_pool(self.symbols.len(), self.cfg.occurrences_per_class, rng);
        let batches = partition_pool(&pool, self.cfg.min_per_image, self.cfg.max_per_image, rng);
        batches
            .into_iter()
            .enumerate()
            .map(|(i, classes)| BatchPlan {
                name: format!("{}{}", self.cfg.name_prefix, self.cfg.first_index + i),
                background: rng.gen_range(0..self.backgrounds.len()),
                classes,
                seed: rng.r#gen(),
            })
            .collect()
    }

    /// Composes one planned batch. Deterministic for a given plan.
    pub fn compose(&self, plan: &BatchPlan) -> Result<Composed> {
        let bg = self.backgrounds.get(plan.background).ok_or_else(|| {
            SynthError::InvalidConfig(format!("background index {} out of range", plan.background))
        })?;
        let (bg_w, bg_h) = bg.image.dimensions();
        let mut rng = StdRng::seed_from_u64(plan.seed);

        let mut symbols: Vec<SymbolInstance> = Vec::with_capacity(plan.classes.len());
        for &class in &plan.classes {
            let class = self.symbols.get(class).ok_or_else(|| {
                SynthError::InvalidConfig(format!("class index {} out of range", class))
            })?;
            symbols.push(transform_symbol(class.instance(), bg_w, bg_h, &self.cfg, &mut rng));
        }

        let result = self.engine.place(&symbols, &bg.image, &mut rng);
        debug!(
            name = %plan.name,
            background = %bg.name,
            placed = result.placements.len(),
            skipped = result.skipped.len(),
            "batch composed"
        );
        Ok(Composed {
            example: Example {
                name: plan.name.clone(),
                canvas: result.canvas,
                annotations: result.annotations,
            },
            requested: plan.classes.len(),
            skipped: result.skipped,
        })
    }

    #[instrument(skip_all)]
    /// Generates the whole dataset into `sink` and returns run statistics.
    ///
    /// Notes:
    /// - The plan is drawn from `rng` before anything reaches the sink.
    /// - Each batch composes from its own seed, so output is identical with or
    ///   without parallel composition.
    /// - A sink error aborts the run; examples already written stay written.
    pub fn generate<R: Rng + ?Sized, S: ExampleSink + ?Sized>(
        &self,
        rng: &mut R,
        sink: &mut S,
    ) -> Result<GenerationStats> {
        let plans = self.plan(rng);
        info!(
            pool = self.pool_size(),
            batches = plans.len(),
            classes = self.symbols.len(),
            backgrounds = self.backgrounds.len(),
            "generation planned"
        );
        sink.begin(&self.symbols.names())?;

        let mut stats = GenerationStats::default();

        #[cfg(feature = "parallel")]
        {
            if self.cfg.parallel {
                for chunk in plans.chunks(PARALLEL_CHUNK) {
                    let composed: Vec<Result<Composed>> =
                        chunk.par_iter().map(|p| self.compose(p)).collect();
                    for c in composed {
                        emit(c?, sink, &mut stats)?;
                    }
                }
                info!(summary = %stats.summary(), "generation finished");
                return Ok(stats);
            }
        }

        for plan in &plans {
            emit(self.compose(plan)?, sink, &mut stats)?;
        }
        info!(summary = %stats.summary(), "generation finished");
        Ok(stats)
    }
}

fn emit<S: ExampleSink + ?Sized>(
    composed: Composed,
    sink: &mut S,
    stats: &mut GenerationStats,
) -> Result<()> {
    sink.write(&composed.example)?;
    stats.examples += 1;
    stats.requested += composed.requested;
    stats.placed += composed.example.annotations.len();
    for s in &composed.skipped {
        stats.record_skip(s.reason);
    }
    Ok(())
}
