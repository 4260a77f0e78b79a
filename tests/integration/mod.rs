//! Integration tests for the tabletree file engine

mod common;
mod flush_failure;
mod node_tree;
mod persistence;
mod scenario;
