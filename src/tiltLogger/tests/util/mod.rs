#![allow(unused)]

pub mod cmd;
pub mod projections;
pub mod watch_dir;
