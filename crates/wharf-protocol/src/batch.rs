//! Requests grouped by topic for a single destination node

use serde::{Deserialize, Serialize};

use crate::messages::{TopicData, TopicRequest};

/// A batch of requests for one node, grouped by topic
///
/// Topics keep the order in which they were first seen and requests keep
/// their submission order within a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchByTopic<T> {
    groups: Vec<TopicData<T>>,
}

impl<T: TopicRequest> BatchByTopic<T> {
    pub fn new() -> Self {
        Self { groups: Vec::new() }
    }

    /// Append a request to its topic group
    pub fn push(&mut self, request: T) {
        match self
            .groups
            .iter_mut()
            .find(|g| g.topic == request.topic())
        {
            Some(group) => group.partitions.push(request),
            None => {
                let topic = request.topic().to_string();
                self.groups.push(TopicData::new(topic, vec![request]));
            }
        }
    }
}

impl<T> BatchByTopic<T> {
    pub fn groups(&self) -> &[TopicData<T>] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<TopicData<T>> {
        self.groups
    }

    /// Total number of requests
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.partitions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn topic_count(&self) -> usize {
        self.groups.len()
    }

    /// Iterate requests, topic by topic
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.groups.iter().flat_map(|g| g.partitions.iter())
    }

    pub fn into_requests(self) -> impl Iterator<Item = T> {
        self.groups.into_iter().flat_map(|g| g.partitions)
    }
}

impl<T: TopicRequest> Default for BatchByTopic<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TopicRequest> FromIterator<T> for BatchByTopic<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut batch = Self::new();
        for request in iter {
            batch.push(request);
        }
        batch
    }
}
