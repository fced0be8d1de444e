pub mod executor;
pub mod scripts;
pub mod storage;
pub mod template;

pub use executor::{CommandExecutor, CommandOutput, OutputSinks, ProcessExecutor};
pub use scripts::ScriptSequence;
pub use storage::{AtomicJsonFile, FileLock, LockMode};
