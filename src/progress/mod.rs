pub mod bar;
mod poller;

pub use poller::ProgressPoller;
