//! Topic name validation for the retained now-playing topic
//!
//! The bridge publishes to and subscribes to one fixed topic, so the topic
//! has to be a valid MQTT topic *name*: no wildcards, no reserved `$` prefix.

use thiserror::Error;

/// Longest topic name the MQTT wire format can carry
pub const MAX_TOPIC_BYTES: usize = 65_535;

pub fn validate_publish_topic(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        return Err(TopicError::Empty);
    }

    if topic.len() > MAX_TOPIC_BYTES {
        return Err(TopicError::TooLong(topic.len()));
    }

    if topic.starts_with('$') {
        return Err(TopicError::Reserved);
    }

    for ch in topic.chars() {
        if ch == '+' || ch == '#' {
            return Err(TopicError::Wildcard(ch));
        }
        if ch == '\0' {
            return Err(TopicError::NulCharacter);
        }
    }

    Ok(())
}

/// Topic validation errors
#[derive(Debug, Error, PartialEq)]
pub enum TopicError {
    #[error("Topic cannot be empty")]
    Empty,
    #[error("Topic is {0} bytes, longer than the MQTT limit")]
    TooLong(usize),
    #[error("Topics starting with '$' are reserved for the broker")]
    Reserved,
    #[error("Topic contains wildcard character '{0}'")]
    Wildcard(char),
    #[error("Topic contains a NUL character")]
    NulCharacter,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn plain_topics_are_accepted(topic in "[a-zA-Z0-9_/ .-]{1,128}") {
            prop_assert!(validate_publish_topic(&topic).is_ok(), "Should accept: {}", topic);
        }

        #[test]
        fn topics_with_wildcards_are_rejected(
            prefix in "[a-z/]{0,16}",
            wildcard in "[+#]",
            suffix in "[a-z/]{0,16}",
        ) {
            let topic = format!("{prefix}{wildcard}{suffix}");
            prop_assert!(validate_publish_topic(&topic).is_err(), "Should reject: {}", topic);
        }
    }

    #[test]
    fn test_topic_examples() {
        assert!(validate_publish_topic("spotify/now-playing").is_ok());
        assert!(validate_publish_topic("/home/living-room/spotify").is_ok());
        assert!(validate_publish_topic("spotify").is_ok());

        assert_eq!(validate_publish_topic(""), Err(TopicError::Empty));
        assert_eq!(
            validate_publish_topic("$SYS/broker"),
            Err(TopicError::Reserved)
        );
        assert_eq!(
            validate_publish_topic("spotify/+/state"),
            Err(TopicError::Wildcard('+'))
        );
        assert_eq!(
            validate_publish_topic("spotify/#"),
            Err(TopicError::Wildcard('#'))
        );
        assert_eq!(
            validate_publish_topic("spot\0ify"),
            Err(TopicError::NulCharacter)
        );
    }

    #[test]
    fn test_topic_length_limit() {
        let topic = "a".repeat(MAX_TOPIC_BYTES);
        assert!(validate_publish_topic(&topic).is_ok());

        let topic = "a".repeat(MAX_TOPIC_BYTES + 1);
        assert_eq!(
            validate_publish_topic(&topic),
            Err(TopicError::TooLong(MAX_TOPIC_BYTES + 1))
        );
    }
}
