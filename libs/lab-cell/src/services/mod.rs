pub mod allocator;
pub mod lab;

pub use allocator::allocate;
pub use lab::LabService;
