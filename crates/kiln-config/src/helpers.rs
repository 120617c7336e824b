use std::path::PathBuf;

pub(crate) fn default_base() -> String {
    "/".to_string()
}

pub(crate) fn default_out_dir() -> PathBuf {
    PathBuf::from("dist")
}

pub(crate) fn default_true() -> bool {
    true
}
