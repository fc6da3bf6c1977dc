pub mod config;
pub mod document;
pub mod error;
pub mod fonts;
pub mod graph;
pub mod logging;
pub mod theme;
pub mod xml;

pub use config::CanvasConfig;
pub use error::{CanvasError, Result};
pub use theme::CanvasTheme;
