//! Event types - the lifecycle moments listeners subscribe to.

use std::fmt;

/// What happened, semantically.
///
/// These are lifecycle moments of the form tree, not raw input events. A key
/// press raises `Key`; moving focus raises the ordered `Post*`/`Pre*` sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    OnNewForm,
    PostViewInit,
    OnCloseForm,

    PreForm,
    PostForm,

    PreBlock,
    PostBlock,

    PreRecord,
    PostRecord,

    PreField,
    PostField,

    PostChange,
    WhenValidateField,
    PostValidateField,
    WhenValidateRecord,
    PostValidateRecord,

    Key,
}

impl EventType {
    /// All event types, in declaration order.
    pub const ALL: [EventType; 17] = [
        EventType::OnNewForm,
        EventType::PostViewInit,
        EventType::OnCloseForm,
        EventType::PreForm,
        EventType::PostForm,
        EventType::PreBlock,
        EventType::PostBlock,
        EventType::PreRecord,
        EventType::PostRecord,
        EventType::PreField,
        EventType::PostField,
        EventType::PostChange,
        EventType::WhenValidateField,
        EventType::PostValidateField,
        EventType::WhenValidateRecord,
        EventType::PostValidateRecord,
        EventType::Key,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EventType::OnNewForm => "OnNewForm",
            EventType::PostViewInit => "PostViewInit",
            EventType::OnCloseForm => "OnCloseForm",
            EventType::PreForm => "PreForm",
            EventType::PostForm => "PostForm",
            EventType::PreBlock => "PreBlock",
            EventType::PostBlock => "PostBlock",
            EventType::PreRecord => "PreRecord",
            EventType::PostRecord => "PostRecord",
            EventType::PreField => "PreField",
            EventType::PostField => "PostField",
            EventType::PostChange => "PostChange",
            EventType::WhenValidateField => "WhenValidateField",
            EventType::PostValidateField => "PostValidateField",
            EventType::WhenValidateRecord => "WhenValidateRecord",
            EventType::PostValidateRecord => "PostValidateRecord",
            EventType::Key => "Key",
        }
    }

    /// Check if this is one of the form-level lifecycle events.
    pub fn is_form_level(self) -> bool {
        matches!(
            self,
            EventType::OnNewForm
                | EventType::PostViewInit
                | EventType::OnCloseForm
                | EventType::PreForm
                | EventType::PostForm
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
