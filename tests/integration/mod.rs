//! Integration tests driven through the resource manager against the
//! in-memory storage provider

mod cache_patching;
mod failure_modes;
mod scenario;
mod single_flight;
mod support;
mod votes;
