pub mod manifest_utils;
pub mod url_utils;
