use evdevil::event::{EventKind, InputEvent, KeyEvent, KeyState};

/// Key transition on a mapped line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Down,
    Up,
}

/// Key code and edge of a key event. Autorepeat and every other event
/// type yield `None`.
pub fn key_edge(ev: &InputEvent) -> Option<(u16, Edge)> {
    let EventKind::Key(key) = ev.kind() else {
        return None;
    };
    let edge = match key.state() {
        KeyState::PRESSED => Edge::Down,
        KeyState::RELEASED => Edge::Up,
        _ => return None,
    };
    Some((key.key().raw(), edge))
}

fn describe_key(key: &KeyEvent) -> String {
    let state = match key.state() {
        KeyState::PRESSED => "down",
        KeyState::RELEASED => "up",
        KeyState::REPEAT => "repeat",
        _ => "?",
    };
    format!("{:?} ({}) {}", key.key(), key.key().raw(), state)
}

/// Human-readable line for the dump command.
pub fn describe(ev: &InputEvent) -> String {
    match ev.kind() {
        EventKind::Syn(_) => "SYN_REPORT".to_string(),
        EventKind::Key(key) => describe_key(&key),
        _ => format!(
            "type{} code{} value={}",
            ev.event_type().raw(),
            ev.raw_code(),
            ev.raw_value()
        ),
    }
}

#[cfg(test)]
pub(crate) fn key_event(code: u16, state: KeyState) -> InputEvent {
    KeyEvent::new(evdevil::event::Key::from_raw(code), state).into()
}
