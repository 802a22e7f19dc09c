//! Resolution of stored styles into the descriptors a map renderer consumes.

mod color;
pub use color::Rgb;

mod error;
pub use error::{StyleError, StyleResult};

mod resolver;
pub use resolver::{ColormapMode, Popup, Presentation, StyleDescriptor, StyleResolver, popup};
