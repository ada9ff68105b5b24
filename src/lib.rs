//! Library exports for the URL shortener application
//!
//! This module exposes internal components for testing and potential library usage.

pub mod allocator;
pub mod analytics;
pub mod config;
pub mod database;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod repository;
pub mod route;
pub mod service;
