//! Core building blocks: the shared object catalog and request classification.

pub mod catalog;
pub mod classifier;
