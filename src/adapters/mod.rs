pub mod metadata;
pub mod ping;

pub use metadata::{CurrentProcessMetaDataProvider, ProcessMetaDataProvider};
pub use ping::{NoopOwnerPinger, OwnerPinger};
