//! The built-in policy plugins.

mod event_delegate;
mod query_processor;

pub use event_delegate::{DispatchFailureMode, EventDelegate, MatchBlock, PolicyDescriptor};
pub use query_processor::QueryProcessor;

use lazy_static::lazy_static;
use serde_json::{json, Value};

lazy_static! {
    /// The usage document shared by both plugins: the upstream event
    /// interfaces that may invoke a policy plugin. Published for rule-base
    /// authors; never enforced at runtime.
    pub(crate) static ref EVENT_INTERFACE_USAGE: Value = json!({
        "input_interfaces": [
            { "name": "event_handler-collection_modified" },
            { "name": "event_handler-data_object_modified" },
            { "name": "event_handler-metadata_modified" },
            { "name": "event_handler-user_modified" },
            { "name": "event_handler-resource_modified" },
            { "name": "direct_invocation" },
            { "name": "query_results" }
        ],
        "output_json_for_validation": ""
    });
}
