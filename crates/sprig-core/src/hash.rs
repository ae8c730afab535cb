#[cfg(feature = "std-hash")]
pub type BuildHasher = std::collections::hash_map::RandomState;

#[cfg(not(feature = "std-hash"))]
pub type BuildHasher = ahash::RandomState;
