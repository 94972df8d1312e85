//! Terminal output helpers for the `homescreen` binary

pub mod icons;
pub mod output;
pub mod theme;

pub use icons::Icons;
pub use output::{
    dim, error, header, human_bytes, info, key_value, muted, section, status, success, summary_row, warn,
};
pub use theme::{Stream, Theme, Tone, theme};
