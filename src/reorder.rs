//! Index math for drag-relocate gestures.
//!
//! Gestures arrive in display positions. Dropping the source on a target further down inserts
//! it right after the target; dropping it further up inserts it before the target. Either way
//! the source lands on the target's display position and everything in between shifts by one.
//!
//! Reported indices always follow insertion order. With reversed display a display position
//! `x` maps to `len - 1 - x` before it is reported or applied to storage.

/// Outcome of one relocation, in insertion-order indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReorderPlan {
    /// Source position in display order
    pub display_from: usize,
    /// Where the source ends up in display order
    pub display_to: usize,
    /// Source position in insertion order
    pub from_index: usize,
    /// Where the source ends up in insertion order
    pub to_index: usize,
}

/// Slot the source is inserted at, counted before it is lifted out of the sequence.
pub fn insertion_slot(current_index: usize, target_index: usize) -> usize {
    if target_index > current_index {
        target_index + 1
    } else {
        target_index
    }
}

/// Map a display position to its insertion-order index.
pub fn to_logical(display_index: usize, len: usize, reversed: bool) -> usize {
    if reversed {
        len - 1 - display_index
    } else {
        display_index
    }
}

/// Map an insertion-order index to its display position. Self-inverse with [`to_logical`].
pub fn to_display(logical_index: usize, len: usize, reversed: bool) -> usize {
    to_logical(logical_index, len, reversed)
}

/// Resolve a drop of the item at display position `current_index` onto `target_index`.
///
/// Returns `None` for a drop on itself or for positions outside a list of `len` items.
pub fn resolve(
    current_index: usize,
    target_index: usize,
    len: usize,
    reversed: bool,
) -> Option<ReorderPlan> {
    if current_index == target_index || current_index >= len || target_index >= len {
        return None;
    }

    // Lifting the source out shifts every later slot down by one.
    let slot = insertion_slot(current_index, target_index);
    let display_to = if slot > current_index { slot - 1 } else { slot };

    Some(ReorderPlan {
        display_from: current_index,
        display_to,
        from_index: to_logical(current_index, len, reversed),
        to_index: to_logical(display_to, len, reversed),
    })
}

/// Move the element at `from` so it ends at `to`, shifting the elements in between.
pub fn apply<T>(items: &mut Vec<T>, from: usize, to: usize) {
    if from == to || from >= items.len() || to >= items.len() {
        return;
    }
    let moved = items.remove(from);
    items.insert(to, moved);
}
