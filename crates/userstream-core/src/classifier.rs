//! Structural classification of stream records.
//!
//! Upstream records carry no explicit type tag. Each record is matched
//! against an ordered rule table of sentinel keys, most specific first; the
//! first rule that matches decides the kind. Records no rule matches are
//! [`EventKind::Unknown`], which is an expected outcome, not an error.

use crate::kind::EventKind;
use serde_json::value::RawValue;
use std::collections::HashMap;

/// One record, parsed into its top-level keys.
///
/// Values are borrowed slices of the original line, so the exact source text
/// of every field stays available to the decoder.
#[derive(Debug)]
pub struct Record<'a> {
    text: &'a str,
    whole: &'a RawValue,
    fields: HashMap<String, &'a RawValue>,
}

impl<'a> Record<'a> {
    /// Parse a line. Valid JSON that is not an object yields a record with no
    /// fields, which classifies as `Unknown`.
    pub fn parse(text: &'a str) -> Result<Self, serde_json::Error> {
        let whole: &'a RawValue = serde_json::from_str(text)?;
        let fields = if whole.get().starts_with('{') {
            serde_json::from_str(whole.get())?
        } else {
            HashMap::new()
        };
        Ok(Self {
            text: whole.get(),
            whole,
            fields,
        })
    }

    /// The record text, without surrounding whitespace.
    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn whole(&self) -> &'a RawValue {
        self.whole
    }

    pub fn field(&self, key: &str) -> Option<&'a RawValue> {
        self.fields.get(key).copied()
    }

    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Classification result: the kind plus the sub-tree the decoder needs.
#[derive(Debug)]
pub struct Classified<'a> {
    pub kind: EventKind,
    /// Raw slice relevant to `kind` (for example `delete.status` or `limit`);
    /// the whole record for statuses, social-graph events and `Unknown`.
    pub subtree: &'a RawValue,
    pub record: Record<'a>,
}

/// Sentinel rules, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Deletion,
    Limit,
    FriendList,
    DirectMessage,
    SocialEvent,
    Status,
}

const RULES: [Rule; 6] = [
    Rule::Deletion,
    Rule::Limit,
    Rule::FriendList,
    Rule::DirectMessage,
    Rule::SocialEvent,
    Rule::Status,
];

impl Rule {
    fn apply<'a>(self, record: &Record<'a>) -> Option<(EventKind, &'a RawValue)> {
        match self {
            Rule::Deletion => {
                let delete = record.field("delete")?;
                let inner: HashMap<String, &'a RawValue> =
                    serde_json::from_str(delete.get()).ok()?;
                if let Some(status) = inner.get("status") {
                    Some((EventKind::DeletionNoticeStatus, *status))
                } else if let Some(message) = inner.get("direct_message") {
                    Some((EventKind::DeletionNoticeDirectMessage, *message))
                } else {
                    Some((EventKind::Unknown, record.whole()))
                }
            }
            Rule::Limit => record
                .field("limit")
                .map(|limit| (EventKind::TrackLimitationNotice, limit)),
            Rule::FriendList => record
                .field("friends")
                .map(|friends| (EventKind::FriendList, friends)),
            Rule::DirectMessage => record
                .field("direct_message")
                .map(|message| (EventKind::DirectMessage, message)),
            Rule::SocialEvent => {
                let name: String = serde_json::from_str(record.field("event")?.get()).ok()?;
                Some((EventKind::from_event_name(&name), record.whole()))
            }
            Rule::Status => (record.has("text") && record.has("user"))
                .then(|| (EventKind::Status, record.whole())),
        }
    }
}

/// Stateless record classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventClassifier;

impl EventClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify<'a>(&self, record: Record<'a>) -> Classified<'a> {
        let (kind, subtree) = RULES
            .iter()
            .find_map(|rule| rule.apply(&record))
            .unwrap_or((EventKind::Unknown, record.whole()));
        Classified {
            kind,
            subtree,
            record,
        }
    }

    /// Parse and classify one line.
    pub fn classify_line<'a>(&self, line: &'a str) -> Result<Classified<'a>, serde_json::Error> {
        Ok(self.classify(Record::parse(line)?))
    }
}
