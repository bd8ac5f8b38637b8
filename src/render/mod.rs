//! Output rendering: the default summary and digest lines, and stat(1)-style
//! templates.

pub mod format;
pub mod lines;
