/// Newline delimited framing.
pub(crate) mod lines;
