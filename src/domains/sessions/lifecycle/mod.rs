pub mod bootstrapper;
pub mod finalizer;
pub mod recycler;
pub mod spawner;
pub mod teardown;
