use serde::de::DeserializeOwned;
use serde::Serialize;

/// Marker for every type that can be persisted as the payload of a [`crate::store::StoreEvent`].
pub trait Event: Serialize + DeserializeOwned {}

impl<T> Event for T where T: Serialize + DeserializeOwned {}
