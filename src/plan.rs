//! The layout planner: weight order in, remap table out.

use tracing::debug;

use crate::descriptor::StructDescriptor;

/// Stable-sorts fields by descending total weight, every used field ahead
/// of every unused one, assigns each field its planned position, and
/// records the inverse mapping in the remap table. Ties keep their
/// original relative order, so identical input always plans identically.
pub fn plan(desc: &mut StructDescriptor) {
    let mut order: Vec<usize> = (0..desc.fields.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = &desc.fields[a];
        let fb = &desc.fields[b];
        fb.is_used()
            .cmp(&fa.is_used())
            .then_with(|| fb.weights.total.total_cmp(&fa.weights.total))
            .then_with(|| a.cmp(&b))
    });

    for (new, &old) in order.iter().enumerate() {
        desc.fields[old].target_index = new;
        desc.remap.set(new, old);
    }
    debug_assert!(desc.remap.is_permutation());

    let moved = desc
        .fields
        .iter()
        .filter(|f| f.target_index != f.current_index)
        .count();
    debug!(name = %desc.name, moved, "planned layout");
}
