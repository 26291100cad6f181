//! Leaf-kind transform decomposition and traversal (§4.4.3).
//!
//! Grounded on `examples/original_source/sapp/pipeline/model_generator.py`'s
//! `_generate_raw_trace_frame` (construction of the `LeafMapping` set) and
//! spec §4.4.3's explicit `compute_next_leaf_kinds` formula.

use sapp_core::types::collections::FxHashSet;
use sapp_core::types::entities::LeafMapping;
use sapp_core::types::placeholder::DbId;

/// The caller-side "view" of a transform kind text: the local transform
/// component stripped. `LocalT@GlobalT:Base` becomes `GlobalT:Base`; a kind
/// with no `@` has no local component to strip and is returned unchanged.
pub fn caller_side_view(kind_text: &str) -> &str {
    match kind_text.find('@') {
        Some(idx) => &kind_text[idx + 1..],
        None => kind_text,
    }
}

/// The callee-side "view" of a transform kind text: the full, untransformed
/// text.
pub fn callee_side_view(kind_text: &str) -> &str {
    kind_text
}

/// `{ lm.callee_leaf | lm ∈ mapping, lm.caller_leaf ∈ outgoing }` (§4.4.3).
pub fn compute_next_leaf_kinds(outgoing: &FxHashSet<DbId>, mapping: &FxHashSet<LeafMapping>) -> FxHashSet<DbId> {
    mapping
        .iter()
        .filter(|lm| outgoing.contains(&lm.caller_leaf))
        .map(|lm| lm.callee_leaf.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s5_transform_decomposition() {
        assert_eq!(caller_side_view("LocalT@GlobalT:Base"), "GlobalT:Base");
        assert_eq!(callee_side_view("LocalT@GlobalT:Base"), "LocalT@GlobalT:Base");
    }

    #[test]
    fn untransformed_kind_is_returned_as_is() {
        assert_eq!(caller_side_view("Base"), "Base");
    }

    #[test]
    fn s5_traversal_through_a_transform_frame() {
        let caller_leaf = DbId::from_int(1);
        let callee_leaf = DbId::from_int(2);
        let transform = DbId::from_int(3);
        let mut mapping = FxHashSet::default();
        mapping.insert(LeafMapping {
            caller_leaf: caller_leaf.clone(),
            callee_leaf: callee_leaf.clone(),
            transform,
        });

        let mut outgoing = FxHashSet::default();
        outgoing.insert(caller_leaf);

        let next = compute_next_leaf_kinds(&outgoing, &mapping);
        assert_eq!(next.len(), 1);
        assert!(next.contains(&callee_leaf));
    }

    #[test]
    fn p4_unmatched_leaves_do_not_appear() {
        let unrelated = DbId::from_int(99);
        let caller_leaf = DbId::from_int(1);
        let callee_leaf = DbId::from_int(2);
        let mut mapping = FxHashSet::default();
        mapping.insert(LeafMapping {
            caller_leaf,
            callee_leaf,
            transform: DbId::from_int(3),
        });

        let mut outgoing = FxHashSet::default();
        outgoing.insert(unrelated);

        assert!(compute_next_leaf_kinds(&outgoing, &mapping).is_empty());
    }
}
