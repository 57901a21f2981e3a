pub mod item_type;

pub use item_type::{ItemKind, DEFAULT_STACK_SIZE};
