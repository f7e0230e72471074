pub mod coordinator;
pub mod lock;
pub mod mirror;
pub mod paths;
pub mod repository;
pub mod retention;
pub mod runner;

#[cfg(test)]
pub(crate) mod testing;
