//! Content types for uploaded files, guessed from the file name.

use std::path::Path;

/// Jupyter notebooks are JSON but get their own type so the service can
/// render them.
pub const NOTEBOOK_CONTENT_TYPE: &str = "application/x-ipynb+json";

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub fn guess_content_type(name: &str) -> &'static str {
    let path = Path::new(name);

    let is_notebook = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ipynb"));
    if is_notebook {
        return NOTEBOOK_CONTENT_TYPE;
    }

    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}
