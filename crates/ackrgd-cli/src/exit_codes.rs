//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

#![allow(dead_code)]

/// Success - every service generated
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - invalid or incomplete graphs.yaml
pub const CONFIG_ERROR: i32 = 2;

/// Generation error - a service failed to render, parse or assemble
pub const GENERATION_ERROR: i32 = 3;

/// Timeout - the batch deadline expired
pub const TIMEOUT_ERROR: i32 = 4;

/// IO error - file not found, permission denied, unsafe output path
pub const IO_ERROR: i32 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
