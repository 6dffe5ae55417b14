use rustc_hash::FxHashSet;

use crate::dispatcher::RegistryDispatcher;
use crate::graph::ResolutionGraph;
use crate::reference::ModuleReference;

/// The distinct non-local module references declared anywhere in `graph`.
///
/// Reads declarations as they are; nothing is re-parsed or re-resolved.
/// References that do not parse are skipped.
pub fn collect_external_references(
    graph: &ResolutionGraph,
    dispatcher: &RegistryDispatcher,
) -> FxHashSet<ModuleReference> {
    graph
        .declarations()
        .filter_map(|(_, decl)| dispatcher.parse_reference(&decl.reference.value).ok())
        .filter(|reference| !reference.is_local())
        .collect()
}
