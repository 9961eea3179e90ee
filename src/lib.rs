//! Profile-informed struct layout optimization over a small LLVM-shaped IR.
//!
//! The pass discovers named aggregate types, measures how often every
//! field is read and written and how deeply those accesses nest in loops,
//! scores the fields, and reorders each aggregate so its hottest fields
//! sit at the front. Everything layout-dependent is brought along:
//! field-access expressions are repointed, global initializers permuted,
//! struct-sized bulk copies resized, and alignment hints refreshed.
//!
//! [`optimize_module`] runs the whole pipeline over one module and
//! reports whether anything changed, so callers can invalidate whatever
//! they derived from the old layout.

pub mod apply;
pub mod catalog;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod facade;
pub mod plan;
pub mod scan;
pub mod weight;

pub use config::Options;
pub use error::PassError;

use repack_ir::Module;
use repack_utils::{PhaseTimings, Stopwatch};
use tracing::{debug, info, warn};

/// Counters for one run.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassStats {
    pub structs_considered: usize,
    pub structs_with_usage: usize,
    pub structs_reordered: usize,
    /// Aggregates abandoned because a tracked global failed validation.
    pub structs_failed: usize,
    pub functions_scanned: usize,
    pub uses_attributed: usize,
    pub globals_remapped: usize,
    pub bulk_ops_resized: usize,
}

/// What a run did to the module.
#[derive(Clone, Copy, Debug, Default)]
pub struct Outcome {
    /// Whether any IR changed. Analyses derived from the old layout are
    /// stale when this is set.
    pub modified: bool,
    pub stats: PassStats,
}

/// Runs the full pipeline over `module`: catalog candidate aggregates,
/// scan every defined function, attribute usage, weigh and plan each
/// aggregate, then apply the plans. An aggregate whose globals fail
/// validation is skipped with a warning; the rest still transform.
pub fn optimize_module(module: &mut Module, opts: &Options) -> Outcome {
    let watch = Stopwatch::start_new();
    let mut timings = PhaseTimings::new();
    let mut stats = PassStats::default();

    let mut descs = timings.record("catalog", || catalog::collect(module, opts));
    stats.structs_considered = descs.len();
    if descs.is_empty() {
        debug!("no candidate aggregates, nothing to do");
        return Outcome {
            modified: false,
            stats,
        };
    }

    let usages = timings.record("scan", || scan::scan_all(module));
    stats.functions_scanned = usages.len();

    let mut cache = facade::LoopCache::new();
    timings.record("attribute", || {
        for desc in &mut descs {
            for fu in &usages {
                stats.uses_attributed += scan::collect_field_uses(module, desc, fu, &mut cache);
            }
        }
    });

    let mut modified = false;
    timings.record("reorder", || {
        for desc in &mut descs {
            if !desc.has_usage() {
                debug!(name = %desc.name, "no usage information, skipped");
                continue;
            }
            stats.structs_with_usage += 1;
            weight::compute_weights(desc);
            plan::plan(desc);
            match apply::apply(module, desc) {
                Ok(true) => {
                    modified = true;
                    stats.structs_reordered += 1;
                    stats.globals_remapped += desc.globals.len();
                    stats.bulk_ops_resized += desc.bulk_ops.len();
                }
                Ok(false) => {}
                Err(err) => {
                    stats.structs_failed += 1;
                    warn!(name = %desc.name, error = %err, "aggregate left untouched");
                }
            }
        }
    });

    for (phase, took) in timings.phases() {
        debug!(phase, ?took, "phase finished");
    }
    info!(
        modified,
        considered = stats.structs_considered,
        reordered = stats.structs_reordered,
        failed = stats.structs_failed,
        uses = stats.uses_attributed,
        elapsed = ?watch.elapsed(),
        "layout pass finished"
    );

    Outcome { modified, stats }
}
