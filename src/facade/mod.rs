pub mod persistent_map;

pub use persistent_map::PersistentMap;
