//! Behavioural suites for the agent runtime.

mod support;
