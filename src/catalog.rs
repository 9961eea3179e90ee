//! Candidate discovery: which aggregates are worth considering at all.

use ahash::AHashSet;
use once_cell::sync::Lazy;
use tracing::{debug, trace};

use repack_ir::Module;

use crate::config::Options;
use crate::descriptor::{FieldRecord, FieldWeights, RemapTable, StructDescriptor};
use crate::facade;

/// Aggregates whose layout is dictated by an external ABI. Reordering
/// these would break code the optimizer never sees.
static DENY_LIST: Lazy<AHashSet<&'static str>> = Lazy::new(|| {
    [
        "timespec",
        "timeval",
        "timezone",
        "tm",
        "itimerspec",
        "rusage",
        "stat",
        "FILE",
        "fpos_t",
        "div_t",
        "ldiv_t",
    ]
    .into_iter()
    .collect()
});

/// Builds one descriptor per surviving aggregate: named, enough fields,
/// not deny-listed. Per-field size and alignment come from the current
/// pre-remap layout and the remap table starts as the identity. An empty
/// result means "no work", not a failure.
pub fn collect(module: &Module, opts: &Options) -> Vec<StructDescriptor> {
    debug!("collecting aggregates");
    let min_fields = opts.effective_min_fields();
    let mut descs = Vec::new();
    for (id, def) in facade::aggregates(module) {
        let Some(name) = def.name.as_deref() else {
            trace!(id = ?id, "unnamed, skipped");
            continue;
        };
        if def.fields.len() < min_fields {
            trace!(name, fields = def.fields.len(), "too few fields, skipped");
            continue;
        }
        if DENY_LIST.contains(name) || opts.deny.iter().any(|d| d == name) {
            trace!(name, "deny-listed, skipped");
            continue;
        }

        let size = facade::struct_size(module, id);
        let fields: Vec<FieldRecord> = def
            .fields
            .iter()
            .enumerate()
            .map(|(i, ty)| FieldRecord {
                ty: ty.clone(),
                size: facade::type_size(module, ty),
                align: facade::field_alignment(module, id, i),
                initial_index: i,
                current_index: i,
                target_index: i,
                reads: 0,
                writes: 0,
                weights: FieldWeights::default(),
                uses: Vec::new(),
            })
            .collect();
        let globals = facade::struct_globals(module, id);
        trace!(
            name,
            fields = fields.len(),
            globals = globals.len(),
            size,
            "candidate aggregate"
        );
        descs.push(StructDescriptor {
            id,
            name: name.to_string(),
            packed: def.packed,
            initial_size: size,
            current_size: size,
            fields,
            remap: RemapTable::identity(def.fields.len()),
            globals,
            bulk_ops: Vec::new(),
        });
    }
    debug!(count = descs.len(), "collected aggregates");
    descs
}
