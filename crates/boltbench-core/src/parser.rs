//! Streaming parser for `<boltArtifact>`/`<boltAction>` markup.
//!
//! The parser is fed the *cumulative* text of a message each time a chunk
//! arrives and returns only the newly producible output. Artifact markup is
//! removed from that output: the artifact open tag becomes a placeholder
//! element, everything up to the matching close tag is consumed, and the
//! parsed artifacts and actions are reported through [`ParserCallbacks`].
//!
//! ```
//! use boltbench_core::parser::{EventLog, ParserOptions, StreamingMessageParser};
//!
//! let events = EventLog::new();
//! let mut parser = StreamingMessageParser::with_callbacks(
//!     ParserOptions::default().with_artifact_element(|_| String::new()),
//!     events.clone(),
//! );
//!
//! let mut output = String::new();
//! let mut text = String::new();
//! for chunk in ["Hi <boltArti", "fact id=\"a\" title=\"A\">", "</boltArtifact>!"] {
//!     text.push_str(chunk);
//!     output.push_str(&parser.parse("msg_1", &text));
//! }
//! assert_eq!(output, "Hi !");
//! assert_eq!(events.events().len(), 2);
//! ```

use crate::scanner::{
    extract_attribute, find_open_tag, partial_suffix_len, scan_open_tag, OpenTag, ACTION_CLOSE,
    ACTION_OPEN, ARTIFACT_CLOSE, ARTIFACT_OPEN,
};
use boltbench_protocol::{Action, ActionDescriptor, ActionType, ArtifactDescriptor};
use boltbench_util::Identifier;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace, warn};

/// Default bound on per-message parser state.
pub const DEFAULT_MAX_TRACKED_MESSAGES: usize = 256;

/// Receives parse events in document order.
///
/// Callbacks run inline with [`StreamingMessageParser::parse`] and must not
/// block. Anything asynchronous has to be handed off, e.g. over a channel.
pub trait ParserCallbacks: Send {
    fn on_artifact_open(&mut self, _artifact: &ArtifactDescriptor) {}

    fn on_artifact_close(&mut self, _artifact: &ArtifactDescriptor) {}

    fn on_action_open(&mut self, _action: &ActionDescriptor) {}

    /// A `file` action grew. `action.action` holds the raw content so far.
    fn on_action_stream(&mut self, _action: &ActionDescriptor) {}

    /// The action is complete; its content is finalized.
    fn on_action_close(&mut self, _action: &ActionDescriptor) {}
}

impl ParserCallbacks for () {}

/// A parse event, for callback consumers that queue or record events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserEvent {
    ArtifactOpen(ArtifactDescriptor),
    ArtifactClose(ArtifactDescriptor),
    ActionOpen(ActionDescriptor),
    ActionStream(ActionDescriptor),
    ActionClose(ActionDescriptor),
}

/// Shared, cloneable record of parse events.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<ParserEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<ParserEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn push(&self, event: ParserEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl ParserCallbacks for EventLog {
    fn on_artifact_open(&mut self, artifact: &ArtifactDescriptor) {
        self.push(ParserEvent::ArtifactOpen(artifact.clone()));
    }

    fn on_artifact_close(&mut self, artifact: &ArtifactDescriptor) {
        self.push(ParserEvent::ArtifactClose(artifact.clone()));
    }

    fn on_action_open(&mut self, action: &ActionDescriptor) {
        self.push(ParserEvent::ActionOpen(action.clone()));
    }

    fn on_action_stream(&mut self, action: &ActionDescriptor) {
        self.push(ParserEvent::ActionStream(action.clone()));
    }

    fn on_action_close(&mut self, action: &ActionDescriptor) {
        self.push(ParserEvent::ActionClose(action.clone()));
    }
}

/// Builds the element that replaces an artifact in the output.
pub type ArtifactElementFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// The placeholder used when no artifact element factory is configured.
pub fn default_artifact_element(message_id: &str) -> String {
    format!(r#"<div class="__boltArtifact__" data-message-id="{message_id}"></div>"#)
}

/// Parser options.
#[derive(Clone)]
pub struct ParserOptions {
    /// Placeholder factory, called with the message id.
    pub artifact_element: Option<ArtifactElementFn>,
    /// Maximum number of messages with retained state; `0` means unbounded.
    pub max_tracked_messages: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            artifact_element: None,
            max_tracked_messages: DEFAULT_MAX_TRACKED_MESSAGES,
        }
    }
}

impl fmt::Debug for ParserOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserOptions")
            .field("artifact_element", &self.artifact_element.is_some())
            .field("max_tracked_messages", &self.max_tracked_messages)
            .finish()
    }
}

impl ParserOptions {
    pub fn with_artifact_element<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.artifact_element = Some(Arc::new(factory));
        self
    }

    pub fn with_max_tracked_messages(mut self, max: usize) -> Self {
        self.max_tracked_messages = max;
        self
    }

    fn artifact_element(&self, message_id: &str) -> String {
        match &self.artifact_element {
            Some(factory) => factory(message_id),
            None => default_artifact_element(message_id),
        }
    }
}

#[derive(Debug)]
enum OpenAction {
    Valid(ActionDescriptor),
    /// An action with unusable attributes; its content is consumed silently.
    Skipped,
}

/// Per-message scan state.
#[derive(Debug, Default)]
struct MessageState {
    /// Offset into the cumulative text that has been fully consumed.
    position: usize,
    artifact: Option<ArtifactDescriptor>,
    action: Option<OpenAction>,
    /// Actions opened so far; the next action id suffix.
    action_count: usize,
    last_used: u64,
}

/// Incremental parser over cumulative message text.
pub struct StreamingMessageParser {
    options: ParserOptions,
    callbacks: Box<dyn ParserCallbacks>,
    messages: HashMap<String, MessageState>,
    clock: u64,
}

impl fmt::Debug for StreamingMessageParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingMessageParser")
            .field("options", &self.options)
            .field("tracked_messages", &self.messages.len())
            .finish_non_exhaustive()
    }
}

impl Default for StreamingMessageParser {
    fn default() -> Self {
        Self::new(ParserOptions::default())
    }
}

impl StreamingMessageParser {
    /// Create a parser without callbacks.
    pub fn new(options: ParserOptions) -> Self {
        Self::with_callbacks(options, ())
    }

    pub fn with_callbacks(
        options: ParserOptions,
        callbacks: impl ParserCallbacks + 'static,
    ) -> Self {
        Self {
            options,
            callbacks: Box::new(callbacks),
            messages: HashMap::new(),
            clock: 0,
        }
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Parse the cumulative text of `message_id`, returning the output that
    /// became producible since the previous call for that id.
    ///
    /// `input` must extend the text passed previously. A shorter input is
    /// logged and yields no output.
    pub fn parse(&mut self, message_id: &str, input: &str) -> String {
        self.clock += 1;
        if !self.messages.contains_key(message_id) {
            self.evict_for_insert();
            trace!(message_id, "Tracking message");
        }

        let state = self.messages.entry(message_id.to_string()).or_default();
        state.last_used = self.clock;

        if state.position > input.len() || !input.is_char_boundary(state.position) {
            warn!(
                message_id,
                position = state.position,
                len = input.len(),
                "Message text no longer extends the parsed prefix"
            );
            return String::new();
        }

        advance(
            state,
            message_id,
            input,
            &self.options,
            self.callbacks.as_mut(),
        )
    }

    /// Drop all per-message state.
    pub fn reset(&mut self) {
        debug!(tracked = self.messages.len(), "Parser reset");
        self.messages.clear();
    }

    /// Drop the state of one message. Returns whether it was tracked.
    pub fn forget(&mut self, message_id: &str) -> bool {
        self.messages.remove(message_id).is_some()
    }

    pub fn is_tracked(&self, message_id: &str) -> bool {
        self.messages.contains_key(message_id)
    }

    pub fn tracked_messages(&self) -> usize {
        self.messages.len()
    }

    /// Consumed offset for a message.
    pub fn position(&self, message_id: &str) -> Option<usize> {
        self.messages.get(message_id).map(|s| s.position)
    }

    fn evict_for_insert(&mut self) {
        let max = self.options.max_tracked_messages;
        if max == 0 {
            return;
        }
        while self.messages.len() >= max {
            let Some(oldest) = self
                .messages
                .iter()
                .min_by_key(|(_, state)| state.last_used)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            debug!(message_id = %oldest, "Evicting least recently parsed message");
            self.messages.remove(&oldest);
        }
    }
}

fn advance(
    state: &mut MessageState,
    message_id: &str,
    input: &str,
    options: &ParserOptions,
    callbacks: &mut dyn ParserCallbacks,
) -> String {
    let mut output = String::new();
    let mut i = state.position;

    while i < input.len() {
        if state.artifact.is_none() {
            let Some(offset) = input[i..].find('<') else {
                output.push_str(&input[i..]);
                i = input.len();
                break;
            };
            let start = i + offset;
            output.push_str(&input[i..start]);
            i = start;

            match scan_open_tag(input, start, ARTIFACT_OPEN) {
                OpenTag::Text { end } => {
                    output.push_str(&input[start..end]);
                    i = end;
                }
                OpenTag::Incomplete => break,
                OpenTag::Complete { end } => {
                    open_artifact(state, message_id, &input[start..end], callbacks);
                    output.push_str(&options.artifact_element(message_id));
                    i = end;
                }
            }
        } else if state.action.is_some() {
            match input[i..].find(ACTION_CLOSE) {
                Some(offset) => {
                    let close = i + offset;
                    close_action(state, &input[i..close], callbacks);
                    i = close + ACTION_CLOSE.len();
                }
                None => {
                    let end = input.len() - partial_suffix_len(&input[i..], ACTION_CLOSE);
                    if end > i {
                        stream_action(state, &input[i..end], callbacks);
                    }
                    i = end;
                    break;
                }
            }
        } else {
            let action_at = find_open_tag(input, i, ACTION_OPEN);
            let close_at = input[i..].find(ARTIFACT_CLOSE).map(|offset| i + offset);

            match (action_at, close_at) {
                (Some(start), close) if close.map_or(true, |close| start < close) => {
                    match scan_open_tag(input, start, ACTION_OPEN) {
                        OpenTag::Complete { end } => {
                            open_action(state, message_id, &input[start..end], callbacks);
                            i = end;
                        }
                        OpenTag::Incomplete => {
                            i = start;
                            break;
                        }
                        OpenTag::Text { end } => i = end,
                    }
                }
                (_, Some(close)) => {
                    close_artifact(state, callbacks);
                    i = close + ARTIFACT_CLOSE.len();
                }
                _ => {
                    // Text between actions is discarded; only a trailing '<'
                    // can still start a tag.
                    i = input[i..].rfind('<').map_or(input.len(), |offset| i + offset);
                    break;
                }
            }
        }
    }

    state.position = i;
    output
}

fn open_artifact(
    state: &mut MessageState,
    message_id: &str,
    tag: &str,
    callbacks: &mut dyn ParserCallbacks,
) {
    let id = extract_attribute(tag, "id");
    let title = extract_attribute(tag, "title");
    if id.is_none() || title.is_none() {
        debug!(message_id, tag, "Artifact tag is missing id or title");
    }

    let artifact = ArtifactDescriptor::new(
        message_id,
        id.unwrap_or_default(),
        title.unwrap_or_default(),
    );
    debug!(message_id, artifact_id = %artifact.id, title = %artifact.title, "Artifact opened");
    callbacks.on_artifact_open(&artifact);
    state.artifact = Some(artifact);
}

fn close_artifact(state: &mut MessageState, callbacks: &mut dyn ParserCallbacks) {
    if let Some(artifact) = state.artifact.take() {
        debug!(message_id = %artifact.message_id, artifact_id = %artifact.id, "Artifact closed");
        callbacks.on_artifact_close(&artifact);
    }
}

fn open_action(
    state: &mut MessageState,
    message_id: &str,
    tag: &str,
    callbacks: &mut dyn ParserCallbacks,
) {
    let Some(artifact) = state.artifact.as_ref() else {
        return;
    };

    let action = ActionType::parse(extract_attribute(tag, "type").unwrap_or_default())
        .and_then(|action_type| Action::empty(action_type, extract_attribute(tag, "filePath")));

    match action {
        Ok(action) => {
            let action_id = Identifier::action(message_id, state.action_count);
            state.action_count += 1;
            let descriptor = ActionDescriptor::new(message_id, &artifact.id, action_id, action);
            debug!(
                message_id,
                artifact_id = %descriptor.artifact_id,
                action_id = %descriptor.action_id,
                action_type = %descriptor.action.action_type(),
                "Action opened"
            );
            callbacks.on_action_open(&descriptor);
            state.action = Some(OpenAction::Valid(descriptor));
        }
        Err(e) => {
            warn!(
                message_id,
                artifact_id = %artifact.id,
                tag,
                error = %e,
                "Dropping invalid action"
            );
            state.action = Some(OpenAction::Skipped);
        }
    }
}

fn stream_action(state: &mut MessageState, text: &str, callbacks: &mut dyn ParserCallbacks) {
    if let Some(OpenAction::Valid(descriptor)) = state.action.as_mut() {
        descriptor.action.push_content(text);
        if descriptor.action.action_type() == ActionType::File {
            callbacks.on_action_stream(descriptor);
        }
    }
}

fn close_action(state: &mut MessageState, text: &str, callbacks: &mut dyn ParserCallbacks) {
    let Some(OpenAction::Valid(mut descriptor)) = state.action.take() else {
        return;
    };

    descriptor.action.push_content(text);
    let finalized = match &descriptor.action {
        Action::Shell { content } => Action::shell(content),
        Action::File { file_path, content } => Action::file(file_path, content),
    };

    match finalized {
        Ok(action) => {
            descriptor.action = action;
            debug!(action_id = %descriptor.action_id, "Action closed");
            callbacks.on_action_close(&descriptor);
        }
        Err(e) => {
            warn!(action_id = %descriptor.action_id, error = %e, "Dropping action at close");
        }
    }
}

/// Keeps the rendered output of each message alongside a parser.
#[derive(Debug, Default)]
pub struct ParsedMessages {
    parser: StreamingMessageParser,
    outputs: HashMap<String, String>,
}

impl ParsedMessages {
    pub fn new(parser: StreamingMessageParser) -> Self {
        Self {
            parser,
            outputs: HashMap::new(),
        }
    }

    /// Parse and return the full output of the message so far.
    pub fn parse(&mut self, message_id: &str, input: &str) -> &str {
        // An untracked message starts over from offset zero.
        if !self.parser.is_tracked(message_id) {
            self.outputs.remove(message_id);
        }
        let fragment = self.parser.parse(message_id, input);
        let output = self.outputs.entry(message_id.to_string()).or_default();
        output.push_str(&fragment);
        output
    }

    pub fn output(&self, message_id: &str) -> Option<&str> {
        self.outputs.get(message_id).map(String::as_str)
    }

    pub fn forget(&mut self, message_id: &str) {
        self.parser.forget(message_id);
        self.outputs.remove(message_id);
    }

    pub fn reset(&mut self) {
        self.parser.reset();
        self.outputs.clear();
    }

    pub fn parser(&self) -> &StreamingMessageParser {
        &self.parser
    }
}
