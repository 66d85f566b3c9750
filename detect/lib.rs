#![deny(dead_code)]
#![deny(unused_imports)]

pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod input;
pub mod model;
pub mod variant;
pub mod verdict;
