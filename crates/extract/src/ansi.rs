//! Terminal escape sequence stripping.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// CSI sequences (`ESC [ params intermediates final`) and two-byte `ESC x` sequences.
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b(?:\[[0-?]*[ -/]*[@-~]|[@-Z\\-_])").expect("static escape pattern")
});

/// Remove terminal color and control escape sequences from a line.
///
/// Lines without an escape byte are returned borrowed.
pub fn strip_ansi(line: &str) -> Cow<'_, str> {
    if !line.contains('\x1b') {
        return Cow::Borrowed(line);
    }
    ANSI_ESCAPE.replace_all(line, "")
}
