use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use crate::model::ViewKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ForceQuit,
    OpenFeedback,
    Up,
    Down,
    PageUp,
    PageDown,
    Top,
    Bottom,
    PrevPage,
    NextPage,
    Select,
    Back,
    ToggleHelp,
    Refresh,
    ToggleAutoRefresh,
    QuickSelect(u8),
    ShowDescribe,
    ShowTags,
    ShowYaml,
    ShowEvents,
    ShowLogs,
    ShowDiagram,
    ShowMemory,
    OpenContexts,
    OpenNamespaceSwitch,
    CopyContent,
    CopySelection,
    MousePress(u16, u16),
    MouseDrag(u16, u16),
    MouseRelease(u16, u16),
    WheelUp,
    WheelDown,
    InputChar(char),
    InputBackspace,
    SubmitFeedback,
}

/// Key handling class of the current view. Derived fresh from the view
/// on every event so bindings always match what is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputContext {
    /// Cursor-driven pick lists (scope, namespaces, types, contexts).
    List,
    /// The resource table with its detail shortcuts.
    Table,
    /// Long-form text panes (logs, describe, yaml, ...).
    Pane,
    Help,
    Feedback,
}

impl InputContext {
    pub fn for_view(view: ViewKind) -> Self {
        match view {
            ViewKind::ScopeSelect
            | ViewKind::NamespaceSelect
            | ViewKind::ResourceTypeSelect
            | ViewKind::ContextSelect
            | ViewKind::NamespaceSwitch => Self::List,
            ViewKind::ResourceDetail => Self::Table,
            ViewKind::Logs
            | ViewKind::Events
            | ViewKind::Describe
            | ViewKind::Tags
            | ViewKind::Yaml
            | ViewKind::Diagram
            | ViewKind::Memory => Self::Pane,
            ViewKind::Help => Self::Help,
            ViewKind::Feedback => Self::Feedback,
        }
    }
}

pub fn map_key(context: InputContext, key: KeyEvent) -> Option<Action> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Action::ForceQuit);
    }

    match context {
        InputContext::List => map_list_key(key),
        InputContext::Table => map_table_key(key),
        InputContext::Pane => map_pane_key(key),
        InputContext::Help => map_help_key(key),
        InputContext::Feedback => map_feedback_key(key),
    }
}

fn map_common_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('q') => Some(Action::OpenFeedback),
        KeyCode::Char('?') => Some(Action::ToggleHelp),
        KeyCode::Esc | KeyCode::Backspace => Some(Action::Back),
        _ => None,
    }
}

fn map_list_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => Some(Action::Down),
        KeyCode::Char('k') | KeyCode::Up => Some(Action::Up),
        KeyCode::Enter | KeyCode::Char(' ') => Some(Action::Select),
        KeyCode::Char('r') => Some(Action::Refresh),
        _ => map_common_key(key),
    }
}

fn map_table_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => Some(Action::Down),
        KeyCode::Char('k') | KeyCode::Up => Some(Action::Up),
        KeyCode::Char('h') | KeyCode::Left => Some(Action::PrevPage),
        KeyCode::Char('l') | KeyCode::Right => Some(Action::NextPage),
        KeyCode::Char(c) if c.is_ascii_digit() && c != '0' => {
            Some(Action::QuickSelect(c.to_digit(10).unwrap_or(0) as u8))
        }
        KeyCode::Char('r') => Some(Action::Refresh),
        KeyCode::Char('a') => Some(Action::ToggleAutoRefresh),
        KeyCode::Char('i') => Some(Action::ShowDescribe),
        KeyCode::Char('t') => Some(Action::ShowTags),
        KeyCode::Char('y') => Some(Action::ShowYaml),
        KeyCode::Char('e') => Some(Action::ShowEvents),
        KeyCode::Char('L') => Some(Action::ShowLogs),
        KeyCode::Char('d') => Some(Action::ShowDiagram),
        KeyCode::Char('m') => Some(Action::ShowMemory),
        KeyCode::Char('c') | KeyCode::Tab => Some(Action::OpenContexts),
        KeyCode::Char('n') => Some(Action::OpenNamespaceSwitch),
        KeyCode::Char('x') => Some(Action::CopyContent),
        KeyCode::Enter => Some(Action::Select),
        _ => map_common_key(key),
    }
}

fn map_pane_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => Some(Action::Down),
        KeyCode::Char('k') | KeyCode::Up => Some(Action::Up),
        KeyCode::Char('d') | KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::Char('u') | KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::Char('g') => Some(Action::Top),
        KeyCode::Char('G') => Some(Action::Bottom),
        KeyCode::Char('x') => Some(Action::CopyContent),
        KeyCode::Char('L') => Some(Action::ShowLogs),
        KeyCode::Char('r') => Some(Action::Refresh),
        KeyCode::Char('a') => Some(Action::ToggleAutoRefresh),
        _ => map_common_key(key),
    }
}

fn map_help_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('?') | KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('q') => {
            Some(Action::Back)
        }
        _ => None,
    }
}

fn map_feedback_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Enter => Some(Action::SubmitFeedback),
        KeyCode::Esc => Some(Action::Back),
        KeyCode::Backspace => Some(Action::InputBackspace),
        KeyCode::Char(c) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
            Some(Action::InputChar(c))
        }
        _ => None,
    }
}

pub fn map_mouse(event: MouseEvent) -> Option<Action> {
    match event.kind {
        MouseEventKind::ScrollUp => Some(Action::WheelUp),
        MouseEventKind::ScrollDown => Some(Action::WheelDown),
        MouseEventKind::Down(MouseButton::Left) => {
            Some(Action::MousePress(event.column, event.row))
        }
        MouseEventKind::Drag(MouseButton::Left) => Some(Action::MouseDrag(event.column, event.row)),
        MouseEventKind::Up(MouseButton::Left) => {
            Some(Action::MouseRelease(event.column, event.row))
        }
        MouseEventKind::Down(MouseButton::Right) => Some(Action::CopySelection),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, InputContext, map_key, map_mouse};
    use crate::model::ViewKind;
    use crossterm::event::{
        KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    };

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn every_view_resolves_to_a_context() {
        assert_eq!(
            InputContext::for_view(ViewKind::ScopeSelect),
            InputContext::List
        );
        assert_eq!(
            InputContext::for_view(ViewKind::ResourceDetail),
            InputContext::Table
        );
        assert_eq!(InputContext::for_view(ViewKind::Yaml), InputContext::Pane);
        assert_eq!(
            InputContext::for_view(ViewKind::Feedback),
            InputContext::Feedback
        );
    }

    #[test]
    fn ctrl_c_force_quits_in_every_context() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        for context in [
            InputContext::List,
            InputContext::Table,
            InputContext::Pane,
            InputContext::Help,
            InputContext::Feedback,
        ] {
            assert_eq!(map_key(context, ctrl_c), Some(Action::ForceQuit));
        }
    }

    #[test]
    fn q_routes_to_feedback_not_quit() {
        assert_eq!(
            map_key(InputContext::Table, key(KeyCode::Char('q'))),
            Some(Action::OpenFeedback)
        );
        assert_eq!(
            map_key(InputContext::Pane, key(KeyCode::Char('q'))),
            Some(Action::OpenFeedback)
        );
    }

    #[test]
    fn table_context_maps_detail_shortcuts() {
        assert_eq!(
            map_key(InputContext::Table, key(KeyCode::Char('i'))),
            Some(Action::ShowDescribe)
        );
        assert_eq!(
            map_key(InputContext::Table, key(KeyCode::Char('y'))),
            Some(Action::ShowYaml)
        );
        assert_eq!(
            map_key(InputContext::Table, key(KeyCode::Char('L'))),
            Some(Action::ShowLogs)
        );
        assert_eq!(
            map_key(InputContext::Table, key(KeyCode::Char('d'))),
            Some(Action::ShowDiagram)
        );
        assert_eq!(
            map_key(InputContext::Table, key(KeyCode::Char('5'))),
            Some(Action::QuickSelect(5))
        );
        assert_eq!(map_key(InputContext::Table, key(KeyCode::Char('0'))), None);
    }

    #[test]
    fn pane_context_maps_scroll_keys() {
        assert_eq!(
            map_key(InputContext::Pane, key(KeyCode::Char('d'))),
            Some(Action::PageDown)
        );
        assert_eq!(
            map_key(InputContext::Pane, key(KeyCode::Char('g'))),
            Some(Action::Top)
        );
        assert_eq!(
            map_key(InputContext::Pane, key(KeyCode::Char('G'))),
            Some(Action::Bottom)
        );
        assert_eq!(
            map_key(InputContext::Pane, key(KeyCode::Char('x'))),
            Some(Action::CopyContent)
        );
    }

    #[test]
    fn feedback_context_captures_typed_characters() {
        assert_eq!(
            map_key(InputContext::Feedback, key(KeyCode::Char('j'))),
            Some(Action::InputChar('j'))
        );
        assert_eq!(
            map_key(InputContext::Feedback, key(KeyCode::Enter)),
            Some(Action::SubmitFeedback)
        );
        assert_eq!(
            map_key(InputContext::Feedback, key(KeyCode::Backspace)),
            Some(Action::InputBackspace)
        );
    }

    #[test]
    fn mouse_events_map_to_drag_lifecycle() {
        let press = MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 5,
            row: 3,
            modifiers: KeyModifiers::NONE,
        };
        assert_eq!(map_mouse(press), Some(Action::MousePress(5, 3)));

        let drag = MouseEvent {
            kind: MouseEventKind::Drag(MouseButton::Left),
            column: 20,
            row: 3,
            modifiers: KeyModifiers::NONE,
        };
        assert_eq!(map_mouse(drag), Some(Action::MouseDrag(20, 3)));

        let release = MouseEvent {
            kind: MouseEventKind::Up(MouseButton::Left),
            column: 20,
            row: 3,
            modifiers: KeyModifiers::NONE,
        };
        assert_eq!(map_mouse(release), Some(Action::MouseRelease(20, 3)));

        let right = MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Right),
            column: 1,
            row: 1,
            modifiers: KeyModifiers::NONE,
        };
        assert_eq!(map_mouse(right), Some(Action::CopySelection));
    }

    #[test]
    fn wheel_maps_to_scroll_actions() {
        let wheel = MouseEvent {
            kind: MouseEventKind::ScrollUp,
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        };
        assert_eq!(map_mouse(wheel), Some(Action::WheelUp));
    }
}
