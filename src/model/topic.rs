//! Topic records and canonical `projects/{project}/topics/{topic}` names.

// self
use crate::_prelude::*;

const PROJECTS: &str = "projects";
const TOPICS: &str = "topics";

/// Errors raised while composing or validating canonical topic names.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TopicNameError {
	/// A name component was empty.
	#[error("The {component} name is empty.")]
	Empty {
		/// Which component failed (`project` or `topic`).
		component: &'static str,
	},
	/// A name component contained `/`, whitespace, or control characters.
	#[error("The {component} name `{value}` contains illegal characters.")]
	IllegalCharacters {
		/// Which component failed (`project` or `topic`).
		component: &'static str,
		/// Offending value.
		value: String,
	},
	/// The canonical name does not follow `projects/{project}/topics/{topic}`.
	#[error("Illegal canonical topic `{0}`.")]
	Malformed(String),
}

/// Composes the canonical name for `topic` in `project`.
pub fn canonical_topic(project: &str, topic: &str) -> Result<String, TopicNameError> {
	validate_component("project", project)?;
	validate_component("topic", topic)?;

	Ok(format!("{PROJECTS}/{project}/{TOPICS}/{topic}"))
}

/// Composes the `projects/{project}/topics` collection path.
pub(crate) fn topics_collection(project: &str) -> Result<String, TopicNameError> {
	validate_component("project", project)?;

	Ok(format!("{PROJECTS}/{project}/{TOPICS}"))
}

/// Checks that `canonical` is a well-formed `projects/{project}/topics/{topic}` name.
pub fn validate_canonical_topic(canonical: &str) -> Result<(), TopicNameError> {
	let malformed = || TopicNameError::Malformed(canonical.to_owned());
	let mut parts = canonical.split('/');

	match (parts.next(), parts.next(), parts.next(), parts.next(), parts.next()) {
		(Some(PROJECTS), Some(project), Some(TOPICS), Some(topic), None) => {
			validate_component("project", project).map_err(|_| malformed())?;
			validate_component("topic", topic).map_err(|_| malformed())?;

			Ok(())
		},
		_ => Err(malformed()),
	}
}

fn validate_component(component: &'static str, value: &str) -> Result<(), TopicNameError> {
	if value.is_empty() {
		return Err(TopicNameError::Empty { component });
	}
	if value.chars().any(|c| c == '/' || c.is_whitespace() || c.is_control()) {
		return Err(TopicNameError::IllegalCharacters { component, value: value.to_owned() });
	}

	Ok(())
}

/// A Pub/Sub topic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
	/// Canonical topic name.
	pub name: String,
}
impl Topic {
	/// Creates a topic record for a canonical name.
	pub fn of(canonical: impl Into<String>) -> Self {
		Self { name: canonical.into() }
	}
}

/// One page of topics returned by `topics.list`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicList {
	/// Topics on this page.
	#[serde(default)]
	pub topics: Vec<Topic>,
	/// Token for the next page, absent on the last page.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub next_page_token: Option<String>,
}
