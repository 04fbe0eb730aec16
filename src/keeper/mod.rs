pub mod scheduler;
pub mod shutdown;

pub use scheduler::PolicyScheduler;
pub use shutdown::{ShutdownController, ShutdownSignal};
