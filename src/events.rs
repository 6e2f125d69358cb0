use std::collections::HashMap;

use serde::Serialize;

use crate::SubjectAttributes;

/// Represents an event capturing the assignment of a feature flag to a subject. Assignment events
/// need to be submitted to user's analytics storage for further analysis.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentEvent {
    /// The key of the feature flag being assigned.
    pub feature_flag: String,
    /// The key of the allocation that the subject was assigned to.
    pub allocation: String,
    /// The key of the experiment associated with the assignment.
    pub experiment: String,
    /// The specific variation assigned to the subject.
    pub variation: String,
    /// The key identifying the subject receiving the assignment.
    pub subject: String,
    /// Custom attributes of the subject relevant to the assignment.
    pub subject_attributes: SubjectAttributes,
    /// The timestamp indicating when the assignment event occurred.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Additional metadata such as SDK language and version.
    pub meta_data: EventMetaData,
    /// Additional user-defined logging fields for capturing extra information related to the
    /// assignment.
    #[serde(flatten)]
    pub extra_logging: HashMap<String, String>,
}

/// SDK metadata attached to every assignment event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetaData {
    /// SDK name. Usually, language name.
    pub sdk_name: &'static str,
    /// Version of SDK.
    pub sdk_version: &'static str,
}

impl Default for EventMetaData {
    fn default() -> EventMetaData {
        EventMetaData {
            sdk_name: "rust-client",
            sdk_version: env!("CARGO_PKG_VERSION"),
        }
    }
}
