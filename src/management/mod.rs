mod store;

pub use store::TrackStore;
