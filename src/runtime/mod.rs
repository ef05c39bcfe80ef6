pub mod chain;
pub mod condition;
pub mod context;
pub mod director;
pub mod executor;
pub mod syscall;
pub mod visual;
