//! OBS control protocol (obs-websocket 5.x).

mod client;
pub mod protocol;
mod requests;

pub use client::{ObsClient, ObsConnection};
pub use requests::{
    FilterEntry, InputEntry, ObsRequests, PropertyItem, SceneCollectionList, SceneEntry,
    SceneItemEntry, VersionInfo,
};

use crate::error::SceneResult;
use serde_json::Value;

/// One request/response exchange with OBS.
///
/// Returns `responseData` on success (`null` when OBS sends none) and
/// [`SceneError::Request`](crate::error::SceneError::Request) when OBS
/// reports a failed status.
pub trait Transport {
    fn request(&mut self, request_type: &str, data: Option<Value>) -> SceneResult<Value>;
}
