#![allow(dead_code)]

pub mod backend;
pub mod cli;
pub mod error;
pub mod mnist;
pub mod model;
pub mod optim;
