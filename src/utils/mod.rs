pub mod paths;
pub mod test_helpers;
