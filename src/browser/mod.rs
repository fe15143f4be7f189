pub mod headless;

pub use headless::{PageRenderer, RenderSessionFactory, RenderedPage};
