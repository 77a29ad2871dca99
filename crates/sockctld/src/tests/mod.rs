//! Test suites for the control channel daemon.

mod support;
