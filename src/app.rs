use chrono::{DateTime, Local};
use std::collections::HashMap;
use tracing::debug;

use crate::health::{self, HealthAnnotation};
use crate::input::Action;
use crate::model::{PaneId, ResourceKind, ResourceRecord, Scope, ViewKind, format_age};
use crate::pane::{PageWindow, ScrollPane};
use crate::sched::{FetchOutcome, FetchPayload, FetchRequest, FetchSpec, FetchTarget, TargetSlot};
use crate::select::SelectionState;

const DEFAULT_PAGE_SIZE: usize = 50;

/// Deferred side effect returned by the state machine. The shell layer
/// executes it; the state machine itself never touches the provider or
/// the terminal.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    None,
    Fetch(FetchRequest),
    Copy(String),
}

/// One entry of the navigation stack: the view that was left plus
/// enough side-state to restore it faithfully.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NavFrame {
    view: ViewKind,
    kind: Option<ResourceKind>,
    namespace: Option<String>,
    cursor: usize,
    page: usize,
}

pub struct App {
    running: bool,
    view: ViewKind,
    nav_stack: Vec<NavFrame>,

    scope: Scope,
    scope_cursor: usize,
    namespace: Option<String>,
    active_kind: Option<ResourceKind>,

    namespaces: Vec<String>,
    namespace_cursor: usize,
    contexts: Vec<String>,
    context_cursor: usize,
    current_context: String,

    records: Vec<ResourceRecord>,
    record_health: Vec<HealthAnnotation>,
    cursor: usize,
    window: PageWindow,
    selected_record: Option<ResourceRecord>,

    panes: HashMap<PaneId, ScrollPane>,
    pane_text: HashMap<PaneId, String>,
    selection: SelectionState,

    status: String,
    loading: bool,
    auto_refresh: bool,
    openshift: bool,
    last_update: Option<DateTime<Local>>,

    feedback_text: String,
    feedback_submitting: bool,

    term_width: u16,
    term_height: u16,
}

impl App {
    pub fn new(current_context: String) -> Self {
        let panes = PaneId::ALL
            .into_iter()
            .map(|pane| (pane, ScrollPane::default()))
            .collect::<HashMap<_, _>>();

        Self {
            running: true,
            view: ViewKind::ScopeSelect,
            nav_stack: Vec::new(),
            scope: Scope::Namespaced,
            scope_cursor: 0,
            namespace: None,
            active_kind: None,
            namespaces: Vec::new(),
            namespace_cursor: 0,
            contexts: Vec::new(),
            context_cursor: 0,
            current_context,
            records: Vec::new(),
            record_health: Vec::new(),
            cursor: 0,
            window: PageWindow::new(DEFAULT_PAGE_SIZE),
            selected_record: None,
            panes,
            pane_text: HashMap::new(),
            selection: SelectionState::default(),
            status: "Ready".to_string(),
            loading: false,
            auto_refresh: false,
            openshift: false,
            last_update: None,
            feedback_text: String::new(),
            feedback_submitting: false,
            term_width: 80,
            term_height: 24,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn view(&self) -> ViewKind {
        self.view
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn scope_cursor(&self) -> usize {
        self.scope_cursor
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn active_kind(&self) -> Option<ResourceKind> {
        self.active_kind
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    pub fn namespace_cursor(&self) -> usize {
        self.namespace_cursor
    }

    pub fn contexts(&self) -> &[String] {
        &self.contexts
    }

    pub fn context_cursor(&self) -> usize {
        self.context_cursor
    }

    pub fn current_context(&self) -> &str {
        &self.current_context
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn auto_refresh(&self) -> bool {
        self.auto_refresh
    }

    pub fn set_openshift(&mut self, openshift: bool) {
        self.openshift = openshift;
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// Seeds the namespace used once the user picks the namespaced
    /// scope; set from the CLI flag or the kubeconfig default.
    pub fn set_initial_namespace(&mut self, namespace: Option<String>) {
        self.namespace = namespace;
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.window = PageWindow::new(page_size);
        self.window.set_total(self.records.len());
    }

    pub fn set_terminal_size(&mut self, width: u16, height: u16) {
        self.term_width = width;
        self.term_height = height;
    }

    pub fn last_update(&self) -> Option<DateTime<Local>> {
        self.last_update
    }

    pub fn feedback_text(&self) -> &str {
        &self.feedback_text
    }

    pub fn feedback_submitting(&self) -> bool {
        self.feedback_submitting
    }

    pub fn nav_depth(&self) -> usize {
        self.nav_stack.len()
    }

    pub fn records(&self) -> &[ResourceRecord] {
        &self.records
    }

    pub fn visible_records(&self) -> &[ResourceRecord] {
        self.window.slice(&self.records)
    }

    pub fn health_for(&self, index: usize) -> Option<&HealthAnnotation> {
        self.record_health.get(index)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn window(&self) -> &PageWindow {
        &self.window
    }

    pub fn selected_record(&self) -> Option<&ResourceRecord> {
        self.records.get(self.cursor)
    }

    /// Record the open pane views were entered for.
    pub fn pinned_record(&self) -> Option<&ResourceRecord> {
        self.selected_record.as_ref()
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn pane_offset(&self, pane: PaneId) -> usize {
        self.panes.get(&pane).map(ScrollPane::offset).unwrap_or(0)
    }

    /// Viewport height for text panes: terminal minus title, borders
    /// and the key/status lines.
    pub fn pane_viewport_height(&self) -> usize {
        (self.term_height.saturating_sub(8) as usize).max(1)
    }

    /// The logical (unwrapped, unscrolled) text backing a pane. For the
    /// resource table this is the current page rendered as plain rows,
    /// which is what a drag selection maps onto.
    pub fn pane_backing_text(&self, pane: PaneId) -> String {
        match pane {
            PaneId::Resources => self
                .visible_records()
                .iter()
                .map(record_line)
                .collect::<Vec<_>>()
                .join("\n"),
            _ => self.pane_text.get(&pane).cloned().unwrap_or_default(),
        }
    }

    /// The valid quick-select kinds right now. Recomputed on every call:
    /// the set shifts with scope and detected capabilities.
    pub fn quick_select_kinds(&self) -> Vec<ResourceKind> {
        ResourceKind::valid_for(self.scope, self.openshift)
    }

    pub fn apply_action(&mut self, action: Action) -> EngineCommand {
        match action {
            Action::ForceQuit => {
                self.running = false;
                self.status = "Exit requested".to_string();
                return EngineCommand::None;
            }
            Action::MousePress(x, y) => return self.mouse_press(x, y),
            Action::MouseDrag(x, y) => return self.mouse_drag(x, y),
            Action::MouseRelease(x, y) => return self.mouse_release(x, y),
            Action::CopySelection => return self.copy_selection_or_content(),
            _ => {}
        }

        match self.view {
            ViewKind::ScopeSelect => self.apply_scope_select(action),
            ViewKind::NamespaceSelect | ViewKind::NamespaceSwitch => {
                self.apply_namespace_list(action)
            }
            ViewKind::ResourceTypeSelect => self.apply_type_select(action),
            ViewKind::ResourceDetail => self.apply_resource_detail(action),
            ViewKind::Logs
            | ViewKind::Events
            | ViewKind::Describe
            | ViewKind::Tags
            | ViewKind::Yaml
            | ViewKind::Diagram
            | ViewKind::Memory => self.apply_pane_view(action),
            ViewKind::ContextSelect => self.apply_context_select(action),
            ViewKind::Help => self.apply_help(action),
            ViewKind::Feedback => self.apply_feedback(action),
        }
    }

    /// Periodic timer entry point. Only live views are re-fetched so a
    /// background tick never yanks a cursor or scroll position in views
    /// the user expects to stay put.
    pub fn tick(&mut self) -> EngineCommand {
        if !self.auto_refresh || !self.view.is_live() {
            return EngineCommand::None;
        }
        self.refresh_current()
    }

    fn apply_scope_select(&mut self, action: Action) -> EngineCommand {
        match action {
            Action::Down => {
                self.scope_cursor = (self.scope_cursor + 1).min(1);
                EngineCommand::None
            }
            Action::Up => {
                self.scope_cursor = self.scope_cursor.saturating_sub(1);
                EngineCommand::None
            }
            Action::Select => {
                if self.scope_cursor == 0 {
                    self.scope = Scope::Namespaced;
                    self.push_and_switch(ViewKind::NamespaceSelect);
                    self.loading = true;
                    EngineCommand::Fetch(self.namespaces_request())
                } else {
                    self.scope = Scope::Cluster;
                    self.push_and_switch(ViewKind::ResourceTypeSelect);
                    EngineCommand::None
                }
            }
            Action::ToggleHelp => self.open_help(),
            Action::OpenFeedback => self.open_feedback(),
            Action::Back => self.go_back(),
            _ => EngineCommand::None,
        }
    }

    fn apply_namespace_list(&mut self, action: Action) -> EngineCommand {
        match action {
            Action::Down => {
                if self.namespace_cursor + 1 < self.namespaces.len() {
                    self.namespace_cursor += 1;
                }
                EngineCommand::None
            }
            Action::Up => {
                self.namespace_cursor = self.namespace_cursor.saturating_sub(1);
                EngineCommand::None
            }
            Action::Select => {
                let Some(name) = self.namespaces.get(self.namespace_cursor).cloned() else {
                    return EngineCommand::None;
                };
                if self.view == ViewKind::NamespaceSwitch {
                    self.loading = true;
                    self.status = format!("Switching to namespace '{name}'");
                    EngineCommand::Fetch(FetchRequest {
                        spec: FetchSpec::SwitchNamespace { name },
                        target: self.session_target(),
                    })
                } else {
                    self.namespace = Some(name);
                    self.push_and_switch(ViewKind::ResourceTypeSelect);
                    EngineCommand::None
                }
            }
            Action::Refresh => {
                self.loading = true;
                EngineCommand::Fetch(self.namespaces_request())
            }
            Action::ToggleHelp => self.open_help(),
            Action::OpenFeedback => self.open_feedback(),
            Action::Back => self.go_back(),
            _ => EngineCommand::None,
        }
    }

    fn apply_type_select(&mut self, action: Action) -> EngineCommand {
        let kinds = self.quick_select_kinds();
        match action {
            Action::Down => {
                if self.cursor + 1 < kinds.len() {
                    self.cursor += 1;
                }
                EngineCommand::None
            }
            Action::Up => {
                self.cursor = self.cursor.saturating_sub(1);
                EngineCommand::None
            }
            Action::Select => {
                let Some(kind) = kinds.get(self.cursor).copied() else {
                    return EngineCommand::None;
                };
                self.active_kind = Some(kind);
                self.push_and_switch(ViewKind::ResourceDetail);
                self.records.clear();
                self.record_health.clear();
                self.cursor = 0;
                self.window.reset();
                self.loading = true;
                self.status = format!("Loading {}", kind.title());
                EngineCommand::Fetch(self.list_request(kind))
            }
            Action::ToggleHelp => self.open_help(),
            Action::OpenFeedback => self.open_feedback(),
            Action::Back => self.go_back(),
            _ => EngineCommand::None,
        }
    }

    fn apply_resource_detail(&mut self, action: Action) -> EngineCommand {
        match action {
            Action::Down | Action::WheelDown => {
                if self.cursor + 1 < self.records.len() {
                    self.cursor += 1;
                    self.window.follow_index(self.cursor);
                }
                EngineCommand::None
            }
            Action::Up | Action::WheelUp => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.window.follow_index(self.cursor);
                }
                EngineCommand::None
            }
            Action::NextPage => {
                self.window.next_page();
                self.cursor = self.window.page_start().min(self.records.len().saturating_sub(1));
                EngineCommand::None
            }
            Action::PrevPage => {
                self.window.prev_page();
                self.cursor = self.window.page_start().min(self.records.len().saturating_sub(1));
                EngineCommand::None
            }
            Action::QuickSelect(index) => self.quick_select(index),
            Action::Refresh => self.refresh_current(),
            Action::ToggleAutoRefresh => {
                self.auto_refresh = !self.auto_refresh;
                self.status = if self.auto_refresh {
                    "Auto-refresh on".to_string()
                } else {
                    "Auto-refresh off".to_string()
                };
                EngineCommand::None
            }
            Action::ShowDescribe => self.open_pane_view(ViewKind::Describe),
            Action::ShowTags => self.open_pane_view(ViewKind::Tags),
            Action::ShowYaml => self.open_pane_view(ViewKind::Yaml),
            Action::ShowEvents => self.open_pane_view(ViewKind::Events),
            Action::ShowLogs => self.open_pane_view(ViewKind::Logs),
            Action::ShowDiagram => self.open_pane_view(ViewKind::Diagram),
            Action::ShowMemory => self.open_pane_view(ViewKind::Memory),
            Action::OpenContexts => {
                self.push_and_switch(ViewKind::ContextSelect);
                self.loading = true;
                EngineCommand::Fetch(FetchRequest {
                    spec: FetchSpec::Contexts,
                    target: FetchTarget {
                        view: ViewKind::ContextSelect,
                        kind: None,
                        namespace: None,
                        name: None,
                    },
                })
            }
            Action::OpenNamespaceSwitch => {
                self.push_and_switch(ViewKind::NamespaceSwitch);
                self.loading = true;
                EngineCommand::Fetch(self.namespaces_request())
            }
            Action::CopyContent => self.copy_selection_or_content(),
            Action::ToggleHelp => self.open_help(),
            Action::OpenFeedback => self.open_feedback(),
            Action::Back => self.go_back(),
            _ => EngineCommand::None,
        }
    }

    fn apply_pane_view(&mut self, action: Action) -> EngineCommand {
        let Some(pane) = self.view.pane() else {
            return EngineCommand::None;
        };
        let line_count = self.pane_line_count(pane);
        let viewport = self.pane_viewport_height();

        match action {
            Action::Down | Action::WheelDown => {
                self.pane_mut(pane).scroll_by(1, line_count, viewport);
                EngineCommand::None
            }
            Action::Up | Action::WheelUp => {
                self.pane_mut(pane).scroll_by(-1, line_count, viewport);
                EngineCommand::None
            }
            Action::PageDown => {
                self.pane_mut(pane).page_by(1, line_count, viewport);
                EngineCommand::None
            }
            Action::PageUp => {
                self.pane_mut(pane).page_by(-1, line_count, viewport);
                EngineCommand::None
            }
            Action::Top => {
                self.pane_mut(pane).to_top();
                EngineCommand::None
            }
            Action::Bottom => {
                self.pane_mut(pane).to_bottom(line_count, viewport);
                EngineCommand::None
            }
            Action::Refresh => self.refresh_current(),
            Action::ToggleAutoRefresh => {
                self.auto_refresh = !self.auto_refresh;
                EngineCommand::None
            }
            Action::CopyContent => self.copy_selection_or_content(),
            Action::ShowLogs => {
                if self.view == ViewKind::Logs {
                    return EngineCommand::None;
                }
                self.open_pane_view(ViewKind::Logs)
            }
            Action::ToggleHelp => self.open_help(),
            Action::OpenFeedback => self.open_feedback(),
            Action::Back => self.go_back(),
            _ => EngineCommand::None,
        }
    }

    fn apply_context_select(&mut self, action: Action) -> EngineCommand {
        match action {
            Action::Down => {
                if self.context_cursor + 1 < self.contexts.len() {
                    self.context_cursor += 1;
                }
                EngineCommand::None
            }
            Action::Up => {
                self.context_cursor = self.context_cursor.saturating_sub(1);
                EngineCommand::None
            }
            Action::Select => {
                let Some(name) = self.contexts.get(self.context_cursor).cloned() else {
                    return EngineCommand::None;
                };
                self.loading = true;
                self.status = format!("Switching to context '{name}'");
                EngineCommand::Fetch(FetchRequest {
                    spec: FetchSpec::SwitchContext { name },
                    target: self.session_target(),
                })
            }
            Action::ToggleHelp => self.open_help(),
            Action::OpenFeedback => self.open_feedback(),
            Action::Back => self.go_back(),
            _ => EngineCommand::None,
        }
    }

    fn apply_help(&mut self, action: Action) -> EngineCommand {
        match action {
            Action::Back | Action::ToggleHelp => self.go_back(),
            _ => EngineCommand::None,
        }
    }

    fn apply_feedback(&mut self, action: Action) -> EngineCommand {
        match action {
            Action::InputChar(c) => {
                self.feedback_text.push(c);
                EngineCommand::None
            }
            Action::InputBackspace => {
                self.feedback_text.pop();
                EngineCommand::None
            }
            Action::SubmitFeedback => {
                let body = self.feedback_text.trim().to_string();
                if body.is_empty() {
                    self.running = false;
                    return EngineCommand::None;
                }
                self.feedback_submitting = true;
                self.status = "Submitting feedback".to_string();
                EngineCommand::Fetch(FetchRequest {
                    spec: FetchSpec::SubmitFeedback { body },
                    target: FetchTarget {
                        view: ViewKind::Feedback,
                        kind: None,
                        namespace: None,
                        name: None,
                    },
                })
            }
            // Skip & exit.
            Action::Back => {
                self.running = false;
                EngineCommand::None
            }
            _ => EngineCommand::None,
        }
    }

    fn quick_select(&mut self, index: u8) -> EngineCommand {
        let kinds = self.quick_select_kinds();
        let Some(kind) = kinds.get(index.saturating_sub(1) as usize).copied() else {
            return EngineCommand::None;
        };
        if Some(kind) == self.active_kind {
            return EngineCommand::None;
        }
        self.active_kind = Some(kind);
        self.cursor = 0;
        self.window.reset();
        self.selection.reset();
        self.loading = true;
        self.status = format!("Loading {}", kind.title());
        EngineCommand::Fetch(self.list_request(kind))
    }

    /// Re-issues the fetch for the exact target implied by the current
    /// view. Stack and cursor stay untouched.
    fn refresh_current(&mut self) -> EngineCommand {
        match self.view {
            ViewKind::ResourceDetail => {
                let Some(kind) = self.active_kind else {
                    return EngineCommand::None;
                };
                self.loading = true;
                EngineCommand::Fetch(self.list_request(kind))
            }
            ViewKind::Logs
            | ViewKind::Events
            | ViewKind::Describe
            | ViewKind::Tags
            | ViewKind::Yaml
            | ViewKind::Diagram
            | ViewKind::Memory => {
                let Some(pane) = self.view.pane() else {
                    return EngineCommand::None;
                };
                let Some(record) = self.selected_record.clone() else {
                    return EngineCommand::None;
                };
                self.loading = true;
                EngineCommand::Fetch(self.pane_request(pane, &record))
            }
            _ => EngineCommand::None,
        }
    }

    fn open_pane_view(&mut self, view: ViewKind) -> EngineCommand {
        let Some(pane) = view.pane() else {
            return EngineCommand::None;
        };
        let Some(record) = self.selected_record().filter(|r| !r.synthetic).cloned() else {
            return EngineCommand::None;
        };
        // Capability gate: unsupported requests are ignored outright.
        let supported = match view {
            ViewKind::Logs => record.kind.supports_logs(),
            ViewKind::Events => record.kind.supports_events(),
            ViewKind::Diagram => record.kind.supports_diagram(),
            ViewKind::Memory => record.kind.supports_memory(),
            _ => true,
        };
        if !supported {
            return EngineCommand::None;
        }

        self.selected_record = Some(record.clone());
        self.push_and_switch(view);
        self.pane_mut(pane).to_top();
        self.pane_text.remove(&pane);
        self.loading = true;
        self.status = format!("Loading {} for {}", view.title(), record.name);
        EngineCommand::Fetch(self.pane_request(pane, &record))
    }

    fn open_help(&mut self) -> EngineCommand {
        self.push_and_switch(ViewKind::Help);
        EngineCommand::None
    }

    fn open_feedback(&mut self) -> EngineCommand {
        self.push_and_switch(ViewKind::Feedback);
        self.feedback_text.clear();
        self.feedback_submitting = false;
        EngineCommand::None
    }

    fn push_and_switch(&mut self, next: ViewKind) {
        self.nav_stack.push(NavFrame {
            view: self.view,
            kind: self.active_kind,
            namespace: self.namespace.clone(),
            cursor: self.cursor_for(self.view),
            page: self.window.current_page,
        });
        self.view = next;
        if !matches!(next, ViewKind::ResourceDetail) {
            self.cursor_reset_for(next);
        }
        self.selection.reset();
    }

    fn cursor_for(&self, view: ViewKind) -> usize {
        match view {
            ViewKind::ScopeSelect => self.scope_cursor,
            ViewKind::NamespaceSelect | ViewKind::NamespaceSwitch => self.namespace_cursor,
            ViewKind::ContextSelect => self.context_cursor,
            _ => self.cursor,
        }
    }

    fn cursor_reset_for(&mut self, view: ViewKind) {
        match view {
            ViewKind::NamespaceSelect | ViewKind::NamespaceSwitch => self.namespace_cursor = 0,
            ViewKind::ContextSelect => self.context_cursor = 0,
            ViewKind::ResourceTypeSelect => self.cursor = 0,
            _ => {}
        }
    }

    /// Pops the navigation stack. On an empty stack this is a no-op.
    /// Restoring the resource-type-selection view re-fetches when the
    /// resource kind being restored differs from the one active now
    /// (quick-select mutates the kind in place, so the frame can be
    /// stale).
    fn go_back(&mut self) -> EngineCommand {
        let Some(frame) = self.nav_stack.pop() else {
            self.status = "At top level".to_string();
            return EngineCommand::None;
        };

        let kind_at_pop = self.active_kind;
        self.view = frame.view;
        self.namespace = frame.namespace.clone();
        self.window.current_page = frame.page.min(self.window.total_pages() - 1);
        match frame.view {
            ViewKind::ScopeSelect => self.scope_cursor = frame.cursor.min(1),
            ViewKind::NamespaceSelect | ViewKind::NamespaceSwitch => {
                self.namespace_cursor = frame.cursor
            }
            ViewKind::ContextSelect => self.context_cursor = frame.cursor,
            ViewKind::ResourceTypeSelect => {
                let kinds = self.quick_select_kinds().len();
                self.cursor = frame.cursor.min(kinds.saturating_sub(1));
            }
            _ => self.cursor = frame.cursor.min(self.records.len().saturating_sub(1)),
        }
        self.selection.reset();

        if frame.view == ViewKind::ResourceTypeSelect && frame.kind != kind_at_pop {
            self.active_kind = frame.kind;
            if let Some(kind) = frame.kind {
                self.loading = true;
                return EngineCommand::Fetch(self.list_request(kind));
            }
        } else {
            self.active_kind = frame.kind;
        }
        EngineCommand::None
    }

    fn mouse_press(&mut self, x: u16, y: u16) -> EngineCommand {
        if self.view.pane().is_none() {
            return EngineCommand::None;
        }
        self.selection.begin(x, y, self.term_width, self.term_height);
        EngineCommand::None
    }

    fn mouse_drag(&mut self, x: u16, y: u16) -> EngineCommand {
        if !self.selection.is_active() {
            return EngineCommand::None;
        }
        let Some(pane) = self.view.pane() else {
            return EngineCommand::None;
        };
        self.selection.drag_to(x, y);
        let text = self.pane_backing_text(pane);
        let offset = self.scroll_offset_for(pane);
        self.selection
            .update_extraction(&text, offset, pane.origin_y());
        EngineCommand::None
    }

    fn mouse_release(&mut self, x: u16, y: u16) -> EngineCommand {
        let Some(pane) = self.view.pane() else {
            return EngineCommand::None;
        };
        let text = self.pane_backing_text(pane);
        let offset = self.scroll_offset_for(pane);
        self.selection
            .release(x, y, &text, offset, pane.origin_y());
        if self.selection.is_active() {
            self.status = format!(
                "Selected {} chars; right-click or x to copy",
                self.selection.extracted_text().chars().count()
            );
        }
        EngineCommand::None
    }

    /// The resource table pages instead of scrolling, so its selection
    /// mapping always uses a zero offset.
    fn scroll_offset_for(&self, pane: PaneId) -> usize {
        match pane {
            PaneId::Resources => 0,
            _ => self.pane_offset(pane),
        }
    }

    fn copy_selection_or_content(&mut self) -> EngineCommand {
        if let Some(text) = self.selection.take_extracted() {
            self.status = format!("Copied {} chars", text.chars().count());
            return EngineCommand::Copy(text);
        }
        self.copy_whole_pane()
    }

    fn copy_whole_pane(&mut self) -> EngineCommand {
        let Some(pane) = self.view.pane() else {
            return EngineCommand::None;
        };
        let text = self.pane_backing_text(pane);
        if text.is_empty() {
            self.status = "Nothing to copy".to_string();
            return EngineCommand::None;
        }
        self.selection.reset();
        self.status = format!("Copied {} ({} chars)", self.view.title(), text.chars().count());
        EngineCommand::Copy(text)
    }

    /// Folds one delivered fetch result into state. Results whose
    /// target no longer matches the live one are dropped here; slot
    /// supersession was already checked at the scheduler boundary.
    pub fn apply_fetch(&mut self, outcome: FetchOutcome) -> EngineCommand {
        if !self.target_is_live(&outcome) {
            debug!(slot = ?outcome.slot, "dropping fetch result for stale target");
            return EngineCommand::None;
        }

        let payload = match outcome.result {
            Ok(payload) => payload,
            Err(error) => {
                self.loading = false;
                self.feedback_submitting = false;
                self.status = compact_error(&error);
                return EngineCommand::None;
            }
        };

        match payload {
            FetchPayload::Records(mut records) => {
                if records.is_empty()
                    && let Some(kind) = self.active_kind
                {
                    records.push(ResourceRecord::placeholder(kind));
                }
                self.record_health = records.iter().map(health::classify).collect();
                self.records = records;
                self.window.set_total(self.records.len());
                self.cursor = self.cursor.min(self.records.len().saturating_sub(1));
                self.window.follow_index(self.cursor);
                self.selection.reset();
                self.loading = false;
                self.last_update = Some(Local::now());
                let real = self.records.iter().filter(|r| !r.synthetic).count();
                if let Some(kind) = self.active_kind {
                    self.status = format!("Loaded {} {}", real, kind.title());
                }
                EngineCommand::None
            }
            FetchPayload::PaneText { pane, text } => {
                let viewport = self.pane_viewport_height();
                let line_count = text.lines().count();
                self.pane_text.insert(pane, text);
                self.pane_mut(pane).clamp(line_count, viewport);
                self.selection.reset();
                self.loading = false;
                self.last_update = Some(Local::now());
                EngineCommand::None
            }
            FetchPayload::Namespaces(names) => {
                self.namespace_cursor = current_index(&names, self.namespace.as_deref());
                self.namespaces = names;
                self.loading = false;
                EngineCommand::None
            }
            FetchPayload::Contexts { names, current } => {
                self.context_cursor = current_index(&names, Some(&current));
                self.contexts = names;
                self.current_context = current;
                self.loading = false;
                EngineCommand::None
            }
            FetchPayload::ContextSwitched(name) => {
                self.loading = false;
                self.status = format!("Switched to context '{name}'");
                if self.view == ViewKind::ContextSelect {
                    let follow_up = self.go_back();
                    if !matches!(follow_up, EngineCommand::None) {
                        return follow_up;
                    }
                }
                self.current_context = name;
                self.namespaces.clear();
                self.refresh_current()
            }
            FetchPayload::NamespaceSwitched(name) => {
                self.loading = false;
                self.status = format!("Switched to namespace '{name}'");
                if self.view == ViewKind::NamespaceSwitch {
                    // Pop first: the frame would otherwise restore the
                    // namespace that was just switched away from.
                    let _ = self.go_back();
                }
                self.namespace = Some(name);
                self.window.reset();
                self.cursor = 0;
                self.refresh_current()
            }
            FetchPayload::FeedbackSent => {
                self.feedback_submitting = false;
                self.running = false;
                EngineCommand::None
            }
        }
    }

    /// A result is applied only while its target still matches what the
    /// current view is showing.
    fn target_is_live(&self, outcome: &FetchOutcome) -> bool {
        match outcome.slot {
            TargetSlot::ResourceList => {
                self.view == ViewKind::ResourceDetail
                    && outcome.target.kind == self.active_kind
                    && outcome.target.namespace == self.list_namespace()
            }
            TargetSlot::Pane(pane) => {
                self.view.pane() == Some(pane)
                    && self
                        .selected_record
                        .as_ref()
                        .is_some_and(|record| {
                            outcome.target.name.as_deref() == Some(record.name.as_str())
                                && outcome.target.namespace == record.namespace
                        })
            }
            TargetSlot::Namespaces => {
                matches!(
                    self.view,
                    ViewKind::NamespaceSelect | ViewKind::NamespaceSwitch
                )
            }
            TargetSlot::Contexts => self.view == ViewKind::ContextSelect,
            TargetSlot::Session | TargetSlot::Feedback => true,
        }
    }

    fn list_namespace(&self) -> Option<String> {
        match self.scope {
            Scope::Cluster => None,
            Scope::Namespaced => self.namespace.clone(),
        }
    }

    fn list_request(&self, kind: ResourceKind) -> FetchRequest {
        FetchRequest {
            spec: FetchSpec::List {
                scope: self.scope,
                namespace: self.list_namespace(),
                kind,
            },
            target: FetchTarget {
                view: ViewKind::ResourceDetail,
                kind: Some(kind),
                namespace: self.list_namespace(),
                name: None,
            },
        }
    }

    fn pane_request(&self, pane: PaneId, record: &ResourceRecord) -> FetchRequest {
        FetchRequest {
            spec: FetchSpec::PaneText {
                pane,
                kind: record.kind,
                namespace: record.namespace.clone(),
                name: record.name.clone(),
            },
            target: FetchTarget {
                view: self.view,
                kind: Some(record.kind),
                namespace: record.namespace.clone(),
                name: Some(record.name.clone()),
            },
        }
    }

    fn namespaces_request(&self) -> FetchRequest {
        FetchRequest {
            spec: FetchSpec::Namespaces,
            target: FetchTarget {
                view: self.view,
                kind: None,
                namespace: None,
                name: None,
            },
        }
    }

    fn session_target(&self) -> FetchTarget {
        FetchTarget {
            view: self.view,
            kind: None,
            namespace: None,
            name: None,
        }
    }

    fn pane_mut(&mut self, pane: PaneId) -> &mut ScrollPane {
        self.panes.entry(pane).or_default()
    }

    fn pane_line_count(&self, pane: PaneId) -> usize {
        self.pane_backing_text(pane).lines().count()
    }
}

/// Plain-text rendering of one table row, used as the logical backing
/// for drag selection over the resource table.
fn record_line(record: &ResourceRecord) -> String {
    format!(
        "{} {} {} {} {}",
        record.name,
        record.ready_ratio,
        record.status,
        record.restart_count,
        format_age(record.age_seconds),
    )
}

fn current_index(names: &[String], current: Option<&str>) -> usize {
    current
        .and_then(|current| names.iter().position(|name| name == current))
        .unwrap_or(0)
}

fn compact_error(error: &anyhow::Error) -> String {
    let mut out = Vec::new();
    for (index, cause) in error.chain().enumerate() {
        if index == 0 {
            out.push(cause.to_string());
        } else if index <= 2 {
            out.push(format!("caused by: {cause}"));
        } else {
            break;
        }
    }
    out.join("; ")
}

#[cfg(test)]
mod tests {
    use super::{App, EngineCommand};
    use crate::input::Action;
    use crate::model::{PaneId, ResourceKind, ResourceRecord, Scope, ViewKind};
    use crate::sched::{FetchOutcome, FetchPayload, FetchSpec, FetchTarget, TargetSlot};

    fn app() -> App {
        App::new("test-context".to_string())
    }

    fn records(kind: ResourceKind, names: &[&str]) -> Vec<ResourceRecord> {
        names
            .iter()
            .map(|name| {
                let mut record = ResourceRecord::new(kind, *name);
                record.namespace = Some("default".to_string());
                record.status = "Running".to_string();
                record
            })
            .collect()
    }

    fn list_outcome(app: &App, kind: ResourceKind, names: &[&str]) -> FetchOutcome {
        FetchOutcome {
            seq: 1,
            target: FetchTarget {
                view: ViewKind::ResourceDetail,
                kind: Some(kind),
                namespace: match app.scope() {
                    Scope::Cluster => None,
                    Scope::Namespaced => app.namespace().map(str::to_string),
                },
                name: None,
            },
            slot: TargetSlot::ResourceList,
            result: Ok(FetchPayload::Records(records(kind, names))),
        }
    }

    /// Drives the app from the scope screen into the pod table.
    fn enter_pod_table(app: &mut App) {
        app.apply_action(Action::Select); // namespace scope
        let _ = app.apply_fetch(FetchOutcome {
            seq: 1,
            target: FetchTarget {
                view: ViewKind::NamespaceSelect,
                kind: None,
                namespace: None,
                name: None,
            },
            slot: TargetSlot::Namespaces,
            result: Ok(FetchPayload::Namespaces(vec![
                "default".to_string(),
                "kube-system".to_string(),
            ])),
        });
        app.apply_action(Action::Select); // pick "default"
        app.apply_action(Action::Select); // pick Pods (first kind)
        let _ = app.apply_fetch(list_outcome(app, ResourceKind::Pods, &["web-0", "web-1"]));
    }

    #[test]
    fn stack_depth_tracks_forward_and_back_transitions() {
        let mut app = app();
        assert_eq!(app.nav_depth(), 0);

        enter_pod_table(&mut app);
        assert_eq!(app.view(), ViewKind::ResourceDetail);
        assert_eq!(app.nav_depth(), 3);

        app.apply_action(Action::ShowDescribe);
        assert_eq!(app.nav_depth(), 4);

        for _ in 0..4 {
            app.apply_action(Action::Back);
        }
        assert_eq!(app.nav_depth(), 0);
        assert_eq!(app.view(), ViewKind::ScopeSelect);

        // Popping an empty stack never changes the view.
        app.apply_action(Action::Back);
        assert_eq!(app.nav_depth(), 0);
        assert_eq!(app.view(), ViewKind::ScopeSelect);
    }

    #[test]
    fn cluster_scope_skips_namespace_selection() {
        let mut app = app();
        app.apply_action(Action::Down);
        let cmd = app.apply_action(Action::Select);
        assert!(matches!(cmd, EngineCommand::None));
        assert_eq!(app.view(), ViewKind::ResourceTypeSelect);
        assert_eq!(app.scope(), Scope::Cluster);
        assert_eq!(app.quick_select_kinds(), ResourceKind::CLUSTER.to_vec());
    }

    #[test]
    fn entering_a_kind_issues_a_list_fetch() {
        let mut app = app();
        app.apply_action(Action::Select);
        let _ = app.apply_fetch(FetchOutcome {
            seq: 1,
            target: FetchTarget {
                view: ViewKind::NamespaceSelect,
                kind: None,
                namespace: None,
                name: None,
            },
            slot: TargetSlot::Namespaces,
            result: Ok(FetchPayload::Namespaces(vec!["default".to_string()])),
        });
        app.apply_action(Action::Select);

        let cmd = app.apply_action(Action::Select);
        let EngineCommand::Fetch(request) = cmd else {
            panic!("expected a fetch command");
        };
        assert!(matches!(
            request.spec,
            FetchSpec::List {
                kind: ResourceKind::Pods,
                ..
            }
        ));
        assert!(app.loading());
    }

    #[test]
    fn quick_select_switches_kind_and_refetches() {
        let mut app = app();
        enter_pod_table(&mut app);

        // Kind 2 in the namespaced list is Services.
        let cmd = app.apply_action(Action::QuickSelect(2));
        let EngineCommand::Fetch(request) = cmd else {
            panic!("expected a fetch command");
        };
        assert!(matches!(
            request.spec,
            FetchSpec::List {
                kind: ResourceKind::Services,
                ..
            }
        ));
        assert_eq!(app.active_kind(), Some(ResourceKind::Services));

        // Re-selecting the active kind is a no-op.
        let cmd = app.apply_action(Action::QuickSelect(2));
        assert!(matches!(cmd, EngineCommand::None));

        // Out-of-range indexes are ignored.
        let cmd = app.apply_action(Action::QuickSelect(15));
        assert!(matches!(cmd, EngineCommand::None));
    }

    #[test]
    fn back_to_type_select_refetches_restored_kind() {
        let mut app = app();
        enter_pod_table(&mut app);
        app.apply_action(Action::QuickSelect(2)); // now Services
        let _ = app.apply_fetch(list_outcome(&app, ResourceKind::Services, &["svc-a"]));

        let cmd = app.apply_action(Action::Back);
        assert_eq!(app.view(), ViewKind::ResourceTypeSelect);
        let EngineCommand::Fetch(request) = cmd else {
            panic!("expected a re-fetch for the restored kind");
        };
        assert!(matches!(
            request.spec,
            FetchSpec::List {
                kind: ResourceKind::Pods,
                ..
            }
        ));
        assert_eq!(app.active_kind(), Some(ResourceKind::Pods));
    }

    #[test]
    fn back_without_kind_change_does_not_refetch() {
        let mut app = app();
        enter_pod_table(&mut app);
        let cmd = app.apply_action(Action::Back);
        assert!(matches!(cmd, EngineCommand::None));
        assert_eq!(app.view(), ViewKind::ResourceTypeSelect);
    }

    #[test]
    fn stale_list_result_is_discarded_after_navigating_away() {
        let mut app = app();
        enter_pod_table(&mut app);

        // Command A: refresh pods. The user then quick-selects services
        // before A resolves.
        let _ = app.apply_action(Action::Refresh);
        let stale_target = FetchTarget {
            view: ViewKind::ResourceDetail,
            kind: Some(ResourceKind::Pods),
            namespace: Some("default".to_string()),
            name: None,
        };
        app.apply_action(Action::QuickSelect(2));

        // Command B resolves first.
        let _ = app.apply_fetch(list_outcome(&app, ResourceKind::Services, &["svc-a"]));
        // Command A arrives late, for the old target.
        let _ = app.apply_fetch(FetchOutcome {
            seq: 99,
            target: stale_target,
            slot: TargetSlot::ResourceList,
            result: Ok(FetchPayload::Records(records(
                ResourceKind::Pods,
                &["web-0"],
            ))),
        });

        assert_eq!(app.records().len(), 1);
        assert_eq!(app.records()[0].name, "svc-a");
        assert_eq!(app.records()[0].kind, ResourceKind::Services);
    }

    #[test]
    fn pane_result_for_another_record_is_discarded() {
        let mut app = app();
        enter_pod_table(&mut app);
        app.apply_action(Action::ShowDescribe);

        let _ = app.apply_fetch(FetchOutcome {
            seq: 5,
            target: FetchTarget {
                view: ViewKind::Describe,
                kind: Some(ResourceKind::Pods),
                namespace: Some("default".to_string()),
                name: Some("other-pod".to_string()),
            },
            slot: TargetSlot::Pane(PaneId::Describe),
            result: Ok(FetchPayload::PaneText {
                pane: PaneId::Describe,
                text: "should not land".to_string(),
            }),
        });
        assert_eq!(app.pane_backing_text(PaneId::Describe), "");
    }

    #[test]
    fn fetch_failure_keeps_previous_records() {
        let mut app = app();
        enter_pod_table(&mut app);
        assert_eq!(app.records().len(), 2);

        let _ = app.apply_action(Action::Refresh);
        let mut outcome = list_outcome(&app, ResourceKind::Pods, &[]);
        outcome.result = Err(anyhow::anyhow!("connection refused"));
        let _ = app.apply_fetch(outcome);

        assert!(!app.loading());
        assert_eq!(app.records().len(), 2);
        assert!(app.status().contains("connection refused"));
    }

    #[test]
    fn empty_list_renders_a_synthetic_row() {
        let mut app = app();
        enter_pod_table(&mut app);
        let _ = app.apply_fetch(list_outcome(&app, ResourceKind::Pods, &[]));

        assert_eq!(app.records().len(), 1);
        assert!(app.records()[0].synthetic);
        assert_eq!(app.records()[0].name, "No Pods found");
    }

    #[test]
    fn cursor_clamps_when_list_shrinks() {
        let mut app = app();
        enter_pod_table(&mut app);
        app.apply_action(Action::Down);
        assert_eq!(app.cursor(), 1);

        let _ = app.apply_fetch(list_outcome(&app, ResourceKind::Pods, &["only-one"]));
        assert_eq!(app.cursor(), 0);
    }

    #[test]
    fn logs_on_non_loggable_kind_is_ignored() {
        let mut app = app();
        enter_pod_table(&mut app);
        app.apply_action(Action::QuickSelect(2)); // Services
        let _ = app.apply_fetch(list_outcome(&app, ResourceKind::Services, &["svc-a"]));

        let cmd = app.apply_action(Action::ShowLogs);
        assert!(matches!(cmd, EngineCommand::None));
        assert_eq!(app.view(), ViewKind::ResourceDetail);

        // Diagram is deployment-only, memory is pod-only.
        assert!(matches!(
            app.apply_action(Action::ShowDiagram),
            EngineCommand::None
        ));
        assert!(matches!(
            app.apply_action(Action::ShowMemory),
            EngineCommand::None
        ));
        assert_eq!(app.view(), ViewKind::ResourceDetail);
    }

    #[test]
    fn synthetic_rows_open_no_detail_views() {
        let mut app = app();
        enter_pod_table(&mut app);
        let _ = app.apply_fetch(list_outcome(&app, ResourceKind::Pods, &[]));

        let cmd = app.apply_action(Action::ShowDescribe);
        assert!(matches!(cmd, EngineCommand::None));
        assert_eq!(app.view(), ViewKind::ResourceDetail);
    }

    #[test]
    fn auto_refresh_ticks_only_live_views() {
        let mut app = app();
        enter_pod_table(&mut app);

        // Off by default.
        assert!(matches!(app.tick(), EngineCommand::None));

        app.apply_action(Action::ToggleAutoRefresh);
        assert!(matches!(app.tick(), EngineCommand::Fetch(_)));

        // Describe is not a live view; the tick must not touch it.
        app.apply_action(Action::ShowDescribe);
        assert!(matches!(app.tick(), EngineCommand::None));
    }

    #[test]
    fn selection_resets_on_view_transition_and_reload() {
        let mut app = app();
        enter_pod_table(&mut app);
        app.set_terminal_size(120, 40);

        app.apply_action(Action::MousePress(0, 9));
        app.apply_action(Action::MouseDrag(10, 9));
        assert!(app.selection().is_active());

        app.apply_action(Action::ShowDescribe);
        assert!(!app.selection().is_active());

        // Reload of pane content clears a fresh selection too.
        let _ = app.apply_fetch(FetchOutcome {
            seq: 8,
            target: FetchTarget {
                view: ViewKind::Describe,
                kind: Some(ResourceKind::Pods),
                namespace: Some("default".to_string()),
                name: Some("web-0".to_string()),
            },
            slot: TargetSlot::Pane(PaneId::Describe),
            result: Ok(FetchPayload::PaneText {
                pane: PaneId::Describe,
                text: "Name: web-0\nStatus: Running".to_string(),
            }),
        });
        app.apply_action(Action::MousePress(0, 3));
        app.apply_action(Action::MouseDrag(11, 3));
        assert!(app.selection().is_active());
        assert_eq!(app.selection().extracted_text(), "Name: web-0");
    }

    #[test]
    fn copy_falls_back_to_whole_pane_without_selection() {
        let mut app = app();
        enter_pod_table(&mut app);

        let cmd = app.apply_action(Action::CopySelection);
        let EngineCommand::Copy(text) = cmd else {
            panic!("expected whole-pane copy");
        };
        assert!(text.contains("web-0"));
        assert!(text.contains("web-1"));
    }

    #[test]
    fn pane_scrolling_respects_bounds() {
        let mut app = app();
        enter_pod_table(&mut app);
        app.set_terminal_size(80, 20);
        app.apply_action(Action::ShowDescribe);

        let text = (0..100)
            .map(|i| format!("line-{i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let _ = app.apply_fetch(FetchOutcome {
            seq: 3,
            target: FetchTarget {
                view: ViewKind::Describe,
                kind: Some(ResourceKind::Pods),
                namespace: Some("default".to_string()),
                name: Some("web-0".to_string()),
            },
            slot: TargetSlot::Pane(PaneId::Describe),
            result: Ok(FetchPayload::PaneText {
                pane: PaneId::Describe,
                text,
            }),
        });

        app.apply_action(Action::Bottom);
        let max = app.pane_offset(PaneId::Describe);
        assert!(max > 0);
        app.apply_action(Action::Down);
        assert_eq!(app.pane_offset(PaneId::Describe), max);
        app.apply_action(Action::Top);
        assert_eq!(app.pane_offset(PaneId::Describe), 0);
    }

    #[test]
    fn feedback_flow_submits_or_skips() {
        let mut app = app();
        app.apply_action(Action::OpenFeedback);
        assert_eq!(app.view(), ViewKind::Feedback);

        for c in "great tool".chars() {
            app.apply_action(Action::InputChar(c));
        }
        let cmd = app.apply_action(Action::SubmitFeedback);
        let EngineCommand::Fetch(request) = cmd else {
            panic!("expected feedback submission");
        };
        assert!(matches!(request.spec, FetchSpec::SubmitFeedback { .. }));
        assert!(app.running());

        let _ = app.apply_fetch(FetchOutcome {
            seq: 1,
            target: request.target,
            slot: TargetSlot::Feedback,
            result: Ok(FetchPayload::FeedbackSent),
        });
        assert!(!app.running());
    }

    #[test]
    fn empty_feedback_submission_quits_immediately() {
        let mut app = app();
        app.apply_action(Action::OpenFeedback);
        let cmd = app.apply_action(Action::SubmitFeedback);
        assert!(matches!(cmd, EngineCommand::None));
        assert!(!app.running());
    }

    #[test]
    fn namespace_switch_returns_and_refetches() {
        let mut app = app();
        enter_pod_table(&mut app);
        app.apply_action(Action::OpenNamespaceSwitch);
        assert_eq!(app.view(), ViewKind::NamespaceSwitch);

        let _ = app.apply_fetch(FetchOutcome {
            seq: 2,
            target: FetchTarget {
                view: ViewKind::NamespaceSwitch,
                kind: None,
                namespace: None,
                name: None,
            },
            slot: TargetSlot::Namespaces,
            result: Ok(FetchPayload::Namespaces(vec![
                "default".to_string(),
                "kube-system".to_string(),
            ])),
        });
        app.apply_action(Action::Down);
        let cmd = app.apply_action(Action::Select);
        let EngineCommand::Fetch(request) = cmd else {
            panic!("expected a namespace switch");
        };
        assert!(matches!(request.spec, FetchSpec::SwitchNamespace { .. }));

        let cmd = app.apply_fetch(FetchOutcome {
            seq: 3,
            target: request.target,
            slot: TargetSlot::Session,
            result: Ok(FetchPayload::NamespaceSwitched("kube-system".to_string())),
        });
        assert_eq!(app.view(), ViewKind::ResourceDetail);
        assert_eq!(app.namespace(), Some("kube-system"));
        let EngineCommand::Fetch(request) = cmd else {
            panic!("expected a follow-up list fetch");
        };
        assert!(matches!(
            request.spec,
            FetchSpec::List {
                kind: ResourceKind::Pods,
                ..
            }
        ));
    }

    #[test]
    fn quick_select_respects_openshift_capability() {
        let mut app = app();
        enter_pod_table(&mut app);

        // Without the capability, slot 14 is out of range.
        let cmd = app.apply_action(Action::QuickSelect(14));
        assert!(matches!(cmd, EngineCommand::None));

        app.set_openshift(true);
        let cmd = app.apply_action(Action::QuickSelect(14));
        let EngineCommand::Fetch(request) = cmd else {
            panic!("expected an imagestream fetch");
        };
        assert!(matches!(
            request.spec,
            FetchSpec::List {
                kind: ResourceKind::ImageStreams,
                ..
            }
        ));
    }

    #[test]
    fn help_opens_and_closes_via_stack() {
        let mut app = app();
        enter_pod_table(&mut app);
        app.apply_action(Action::ToggleHelp);
        assert_eq!(app.view(), ViewKind::Help);
        app.apply_action(Action::ToggleHelp);
        assert_eq!(app.view(), ViewKind::ResourceDetail);
    }
}
