//! The layout applier: the one place a planned remap becomes IR mutation.
//!
//! Order matters here. Uses are repointed before the body is swapped, so
//! every rewrite sees the classification the scanner recorded. The body
//! swap then invalidates the old layout, and everything derived from
//! layout (size, per-field alignment, initializers, bulk lengths) is
//! recomputed from the new one rather than patched.

use tracing::{debug, trace};

use repack_ir::{Module, Ty};

use crate::descriptor::StructDescriptor;
use crate::error::PassError;
use crate::facade;

/// Applies a planned remap to the module. Returns whether any IR changed.
///
/// The global-initializer shape check runs before the first rewrite, so a
/// mis-identified aggregate aborts with the module untouched.
pub fn apply(module: &mut Module, desc: &mut StructDescriptor) -> Result<bool, PassError> {
    if desc.remap.is_identity() {
        trace!(name = %desc.name, "already at its planned layout");
        return Ok(false);
    }

    // Validate every tracked global up front; no partial rewrites.
    for global_ref in &desc.globals {
        facade::check_global_init(module, desc.id, global_ref.global)?;
    }

    // Point every recorded use at its field's new slot.
    for fi in 0..desc.fields.len() {
        let target = desc.fields[fi].target_index;
        if desc.fields[fi].current_index == target {
            continue;
        }
        for ui in 0..desc.fields[fi].uses.len() {
            let expr = desc.fields[fi].uses[ui].expr;
            facade::rewrite_field_index(module, expr, desc.id, target);
        }
        desc.fields[fi].current_index = target;
    }

    // Swap in the reordered body. Struct identity and the packed flag
    // survive the swap.
    let new_fields: Vec<Ty> = (0..desc.remap.len())
        .map(|new| desc.fields[desc.remap.old_of(new)].ty.clone())
        .collect();
    facade::install_struct_body(module, desc.id, new_fields);

    // Size comes back out of the live layout, never from arithmetic on
    // the old one.
    desc.current_size = facade::struct_size(module, desc.id);

    // Re-derive per-field alignment at the new offsets and push changed
    // hints out to every reachable access.
    for fi in 0..desc.fields.len() {
        let new_align = facade::field_alignment(module, desc.id, desc.fields[fi].current_index);
        if new_align == desc.fields[fi].align {
            continue;
        }
        desc.fields[fi].align = new_align;
        for ui in 0..desc.fields[fi].uses.len() {
            let expr = desc.fields[fi].uses[ui].expr;
            facade::propagate_alignment(module, expr, new_align);
        }
    }

    // Initializers permute through the finished table.
    for global_ref in &desc.globals {
        facade::remap_global_init(module, global_ref.global, desc.id, &desc.remap);
    }

    // Bulk ops sized to the whole aggregate track its new size.
    for bulk in &desc.bulk_ops {
        facade::rewrite_bulk_len(module, *bulk, desc.current_size);
    }

    debug!(
        name = %desc.name,
        size_before = desc.initial_size,
        size_after = desc.current_size,
        globals = desc.globals.len(),
        bulk_ops = desc.bulk_ops.len(),
        "applied new layout"
    );
    Ok(true)
}
