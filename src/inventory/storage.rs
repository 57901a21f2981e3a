//! Stacked item storage for a single generator

use serde::{Deserialize, Serialize};

use crate::inventory::ItemStack;

/// Ordered list of stacks, each capped at its kind's stack size
///
/// Order only matters for display. Capacity is not enforced here; callers
/// check the free space before building the stack they insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoredItems {
    stacks: Vec<ItemStack>,
}

impl StoredItems {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build storage from arbitrary stacks, re-stacking as they are inserted
    pub fn from_stacks(stacks: impl IntoIterator<Item = ItemStack>) -> Self {
        let mut storage = Self::new();
        for stack in stacks {
            storage.add(stack);
        }
        storage
    }

    /// Insert items, topping up existing stacks of the same kind first
    ///
    /// Returns false when the stack is empty and nothing was inserted.
    pub fn add(&mut self, stack: ItemStack) -> bool {
        if stack.is_empty() {
            return false;
        }

        let mut remaining = stack.count;
        for existing in self.stacks.iter_mut() {
            if remaining == 0 {
                break;
            }
            if existing.can_merge_with(&stack) {
                remaining = existing.try_add(remaining);
            }
        }

        let max = stack.max_stack_size().max(1);
        while remaining > 0 {
            let amount = remaining.min(max);
            self.stacks.push(stack.with_count(amount));
            remaining -= amount;
        }
        true
    }

    /// Total number of individual items across all stacks
    pub fn total_count(&self) -> u64 {
        self.stacks.iter().map(|s| s.count as u64).sum()
    }

    /// Number of stacks
    pub fn stack_count(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn stacks(&self) -> &[ItemStack] {
        &self.stacks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ItemStack> {
        self.stacks.iter()
    }

    /// Empty the storage, returning every stack
    pub fn take_all(&mut self) -> Vec<ItemStack> {
        std::mem::take(&mut self.stacks)
    }

    pub fn clear(&mut self) {
        self.stacks.clear();
    }
}

impl<'a> IntoIterator for &'a StoredItems {
    type Item = &'a ItemStack;
    type IntoIter = std::slice::Iter<'a, ItemStack>;

    fn into_iter(self) -> Self::IntoIter {
        self.stacks.iter()
    }
}
