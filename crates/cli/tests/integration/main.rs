//! End-to-end tests running rrmake against stand-in tool scripts.

#![cfg(unix)]

mod build_tests;
mod common;
