//! The weight model: raw usage counts into comparable per-field scores.
//!
//! Pure over descriptors; never touches the IR. Each axis is normalized
//! per aggregate by dividing by its maximum across the fields, so a field
//! at the observed maximum scores exactly 1. Loop weight takes the
//! maximum over uses, not the sum: one touch in a hot outer loop must
//! outrank a field touched many times outside any loop.

use tracing::trace;

use crate::descriptor::{AccessKind, StructDescriptor};

pub const LOOP_COEF: f64 = 0.6;
pub const LOAD_COEF: f64 = 0.3;
pub const STORE_COEF: f64 = 0.2;
pub const SIZE_COEF: f64 = 0.1;
/// Base score for a field with no reads and no writes.
pub const UNUSED_BASE: f64 = 0.1;
pub const UNUSED_SIZE_COEF: f64 = 0.05;
/// Loop weight of a field whose uses all sit outside loops.
const NEUTRAL_LOOP: f64 = 1.0;

/// Outer-loop iteration counts dominate total access volume more than
/// nesting depth alone, so the band multiplier shrinks as depth grows and
/// flattens out from depth 3 on.
fn depth_multiplier(depth: u32) -> f64 {
    match depth {
        1 => 16.0,
        2 => 8.0,
        _ => 4.0,
    }
}

pub fn compute_weights(desc: &mut StructDescriptor) {
    let n = desc.fields.len();
    let mut size = vec![0.0; n];
    let mut load = vec![0.0; n];
    let mut store = vec![0.0; n];
    let mut loops = vec![NEUTRAL_LOOP; n];

    for (i, field) in desc.fields.iter().enumerate() {
        size[i] = field.size as f64;
        load[i] = field.reads as f64;
        store[i] = field.writes as f64;
        for field_use in &field.uses {
            // Escaped addresses are tracked only for re-indexing; they
            // say nothing about how hot the field is.
            if field_use.kind == AccessKind::Escape {
                continue;
            }
            let depth = field_use.loop_depth;
            if depth > 0 {
                loops[i] = loops[i].max(depth_multiplier(depth) * f64::from(depth));
            }
        }
    }

    normalize(&mut size);
    normalize(&mut load);
    normalize(&mut store);
    normalize(&mut loops);

    for (i, field) in desc.fields.iter_mut().enumerate() {
        let used = field.is_used();
        let w = &mut field.weights;
        w.size = size[i];
        w.load = load[i];
        w.store = store[i];
        w.loops = loops[i];
        w.total = if used {
            LOOP_COEF * w.loops + LOAD_COEF * w.load + STORE_COEF * w.store + SIZE_COEF * w.size
        } else {
            UNUSED_BASE + UNUSED_SIZE_COEF * w.size
        };
        trace!(field = field.initial_index, total = w.total, "weighed field");
    }
}

fn normalize(values: &mut [f64]) {
    let max = values.iter().copied().fold(0.0_f64, f64::max);
    if max > 0.0 {
        for v in values.iter_mut() {
            *v /= max;
        }
    }
}
