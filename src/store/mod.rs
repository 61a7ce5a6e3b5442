mod kv;
mod runs;

#[cfg(test)]
pub use kv::MemoryKv;
pub use kv::{FileKv, KvStore};
pub use runs::RunStore;
