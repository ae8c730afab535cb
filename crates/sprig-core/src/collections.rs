#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub type HashMap<K, V> = hashbrown::HashMap<K, V, crate::hash::BuildHasher>;
    pub type HashSet<K> = hashbrown::HashSet<K, crate::hash::BuildHasher>;
}
