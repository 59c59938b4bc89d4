/// Native module contains implementations of core traits
/// without using any external dependencies like Docker or Runc,
/// spawning processes directly instead.
pub mod runner;
