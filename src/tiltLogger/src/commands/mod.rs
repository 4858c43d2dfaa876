
pub mod watch;
pub mod dilate;
