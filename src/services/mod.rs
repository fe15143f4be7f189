pub mod artifact_store;

pub use artifact_store::{
    artifact_key, ArtifactSink, FsArtifactStore, HTML_COLLECTION, SCREENSHOT_COLLECTION,
};
