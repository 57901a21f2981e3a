pub mod item;
pub mod storage;

pub use item::ItemStack;
pub use storage::StoredItems;
