use serde::{Deserialize, Serialize};

/// Default maximum items in a single stack
pub const DEFAULT_STACK_SIZE: u32 = 64;

/// Kinds that stack to 16
const SMALL_STACK_KINDS: &[&str] = &[
    "ender_pearl",
    "egg",
    "snowball",
    "bucket",
    "armor_stand",
    "honey_bottle",
];

/// Suffixes for kinds that stack to 16
const SMALL_STACK_SUFFIXES: &[&str] = &["_sign", "_banner", "_spawn_egg"];

/// Suffixes for kinds that never stack
const UNSTACKABLE_SUFFIXES: &[&str] = &[
    "_bucket",
    "_sword",
    "_pickaxe",
    "_axe",
    "_shovel",
    "_hoe",
    "_helmet",
    "_chestplate",
    "_leggings",
    "_boots",
    "_bed",
    "_boat",
    "_minecart",
    "_horse_armor",
];

/// Unique key for an item kind, e.g. `iron_ingot`
///
/// Keys are lower case; an optional `minecraft:` namespace prefix is
/// stripped so host identifiers and catalog files agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ItemKind(String);

impl ItemKind {
    pub fn new(key: impl AsRef<str>) -> Self {
        let key = key.as_ref().trim().to_ascii_lowercase();
        let key = key.strip_prefix("minecraft:").unwrap_or(&key).to_string();
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty kind, which can never be stored
    pub fn is_air(&self) -> bool {
        self.0.is_empty() || self.0 == "air"
    }

    /// Get the maximum stack size for this item kind
    pub fn max_stack_size(&self) -> u32 {
        let key = self.as_str();
        if SMALL_STACK_KINDS.contains(&key)
            || SMALL_STACK_SUFFIXES.iter().any(|s| key.ends_with(s))
        {
            return 16;
        }
        if UNSTACKABLE_SUFFIXES.iter().any(|s| key.ends_with(s)) {
            return 1;
        }
        DEFAULT_STACK_SIZE
    }

    /// Human readable name, `iron_ingot` becomes `Iron Ingot`
    pub fn display_name(&self) -> String {
        self.0
            .split('_')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<String> for ItemKind {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl From<&str> for ItemKind {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<ItemKind> for String {
    fn from(kind: ItemKind) -> Self {
        kind.0
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
