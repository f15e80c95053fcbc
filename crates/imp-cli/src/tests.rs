//! Test suites for the `impctl` runtime.

mod support;
mod unit;
