//! Integration-test support for the scenemap workspace.

pub mod test_util;
