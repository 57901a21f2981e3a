use crate::item::ItemKind;
use serde::{Deserialize, Serialize};

/// Represents a stack of items
///
/// A stack read from disk or handed over by the host may temporarily exceed
/// the kind's stack limit; [`crate::inventory::StoredItems`] splits such
/// stacks when they are inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub kind: ItemKind,
    pub count: u32,
}

impl ItemStack {
    /// Create a new item stack
    pub fn new(kind: impl Into<ItemKind>, count: u32) -> Self {
        Self {
            kind: kind.into(),
            count,
        }
    }

    /// Same kind, with a different count
    pub fn with_count(&self, count: u32) -> Self {
        Self::new(self.kind.clone(), count)
    }

    /// Check if this stack can take more items of the other stack's kind
    pub fn can_merge_with(&self, other: &ItemStack) -> bool {
        self.kind == other.kind && self.count < self.max_stack_size()
    }

    /// Try to add items to this stack, returns remaining items
    pub fn try_add(&mut self, count: u32) -> u32 {
        let space = self.max_stack_size().saturating_sub(self.count);
        let to_add = count.min(space);
        self.count += to_add;
        count - to_add
    }

    /// Split the stack, taking up to the specified count
    pub fn split(&mut self, count: u32) -> Option<ItemStack> {
        if count == 0 || self.count == 0 {
            return None;
        }
        let taken = count.min(self.count);
        self.count -= taken;
        Some(self.with_count(taken))
    }

    /// Check if stack is empty
    pub fn is_empty(&self) -> bool {
        self.count == 0 || self.kind.is_air()
    }

    /// Check if stack is full
    pub fn is_full(&self) -> bool {
        self.count >= self.max_stack_size()
    }

    /// Get the maximum stack size for this item kind
    pub fn max_stack_size(&self) -> u32 {
        self.kind.max_stack_size()
    }
}

impl std::fmt::Display for ItemStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x {}", self.count, self.kind)
    }
}
