use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap};

use crate::app::App;
use crate::model::{PaneId, ResourceKind, ViewKind, format_age};
use crate::pane::ScrollPane;

const BG: Color = Color::Rgb(10, 14, 23);
const PANEL: Color = Color::Rgb(17, 25, 40);
const ACCENT: Color = Color::Rgb(94, 234, 212);
const MUTED: Color = Color::Rgb(134, 150, 170);
const WARN: Color = Color::Rgb(250, 204, 21);
const ERROR: Color = Color::Rgb(248, 113, 113);
const SELECT_BG: Color = Color::Rgb(51, 65, 85);

pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    app.set_terminal_size(area.width, area.height);

    match app.view() {
        ViewKind::ScopeSelect => render_scope_select(frame, area, app),
        ViewKind::NamespaceSelect | ViewKind::NamespaceSwitch => {
            render_pick_list(
                frame,
                area,
                app,
                app.view().title(),
                app.namespaces(),
                app.namespace_cursor(),
            );
        }
        ViewKind::ResourceTypeSelect => render_type_select(frame, area, app),
        ViewKind::ResourceDetail => render_resource_table(frame, area, app),
        ViewKind::Logs
        | ViewKind::Events
        | ViewKind::Describe
        | ViewKind::Tags
        | ViewKind::Yaml
        | ViewKind::Diagram
        | ViewKind::Memory => render_text_pane(frame, area, app),
        ViewKind::ContextSelect => {
            render_pick_list(
                frame,
                area,
                app,
                "Select Context",
                app.contexts(),
                app.context_cursor(),
            );
        }
        ViewKind::Help => render_help(frame, area, app),
        ViewKind::Feedback => render_feedback(frame, area, app),
    }
}

fn header_lines(app: &App) -> Vec<Line<'static>> {
    let namespace = app.namespace().unwrap_or("-").to_string();
    let kind = app
        .active_kind()
        .map(|kind| kind.title().to_string())
        .unwrap_or_else(|| "-".to_string());
    let first = Line::from(vec![
        Span::styled(" manta ", Style::default().fg(Color::Black).bg(ACCENT)),
        Span::styled(
            format!(" ctx:{} ", app.current_context()),
            Style::default().fg(Color::White).bg(PANEL),
        ),
        Span::styled(
            format!(" ns:{namespace} "),
            Style::default().fg(Color::White).bg(PANEL),
        ),
        Span::styled(
            format!(" {kind} "),
            Style::default().fg(ACCENT).bg(PANEL),
        ),
    ]);

    let mut second_spans = vec![Span::styled(
        format!(" {} ", app.view().title()),
        Style::default().fg(MUTED),
    )];
    if app.loading() {
        second_spans.push(Span::styled(" loading… ", Style::default().fg(WARN)));
    }
    if app.auto_refresh() {
        second_spans.push(Span::styled(" auto ", Style::default().fg(ACCENT)));
    }
    if let Some(updated) = app.last_update() {
        second_spans.push(Span::styled(
            format!(" updated {} ", updated.format("%H:%M:%S")),
            Style::default().fg(MUTED),
        ));
    }
    vec![first, Line::from(second_spans)]
}

fn render_chrome(frame: &mut Frame, area: Rect, app: &App, keys: &str) -> Rect {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(area);

    frame.render_widget(
        Paragraph::new(Text::from(header_lines(app))).style(Style::default().bg(BG)),
        chunks[0],
    );

    let footer = vec![
        Line::from(Span::styled(keys.to_string(), Style::default().fg(MUTED))),
        Line::from(Span::styled(
            format!(" {}", app.status()),
            Style::default().fg(Color::White),
        )),
    ];
    frame.render_widget(
        Paragraph::new(Text::from(footer)).style(Style::default().bg(BG)),
        chunks[2],
    );

    chunks[1]
}

fn render_scope_select(frame: &mut Frame, area: Rect, app: &App) {
    let body = render_chrome(frame, area, app, " enter select │ j/k move │ ? help │ q quit");
    let mut lines = vec![
        Line::default(),
        Line::from(Span::styled(
            "  Select resource scope",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
    ];
    for (index, label) in ["Namespace resources", "Cluster resources"]
        .iter()
        .enumerate()
    {
        lines.push(cursor_line(label, index == app.scope_cursor()));
    }
    frame.render_widget(
        Paragraph::new(Text::from(lines)).style(Style::default().bg(BG).fg(Color::White)),
        body,
    );
}

fn render_pick_list(
    frame: &mut Frame,
    area: Rect,
    app: &App,
    title: &str,
    items: &[String],
    cursor: usize,
) {
    let body = render_chrome(frame, area, app, " enter select │ j/k move │ esc back │ q quit");
    let mut lines = vec![
        Line::default(),
        Line::from(Span::styled(
            format!("  {title}"),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
    ];
    if items.is_empty() {
        lines.push(Line::from(Span::styled(
            "  (loading…)",
            Style::default().fg(MUTED),
        )));
    }
    let visible = body.height.saturating_sub(3) as usize;
    let first = cursor.saturating_sub(visible.saturating_sub(1));
    for (index, item) in items.iter().enumerate().skip(first).take(visible.max(1)) {
        lines.push(cursor_line(item, index == cursor));
    }
    frame.render_widget(
        Paragraph::new(Text::from(lines)).style(Style::default().bg(BG).fg(Color::White)),
        body,
    );
}

fn render_type_select(frame: &mut Frame, area: Rect, app: &App) {
    let body = render_chrome(frame, area, app, " enter select │ j/k move │ esc back │ q quit");
    let kinds = app.quick_select_kinds();
    let mut lines = vec![
        Line::default(),
        Line::from(Span::styled(
            format!(
                "  Resources in {} scope",
                app.scope()
            ),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
    ];
    for (index, kind) in kinds.iter().enumerate() {
        let badge = kind_badge(*kind);
        let label = if badge.is_empty() {
            format!("[{}] {}", index + 1, kind.title())
        } else {
            format!("[{}] {} {}", index + 1, kind.title(), badge)
        };
        lines.push(cursor_line(&label, index == app.cursor()));
    }
    frame.render_widget(
        Paragraph::new(Text::from(lines)).style(Style::default().bg(BG).fg(Color::White)),
        body,
    );
}

fn cursor_line(label: &str, selected: bool) -> Line<'static> {
    if selected {
        Line::from(Span::styled(
            format!("  ▶ {label}"),
            Style::default()
                .fg(Color::White)
                .bg(SELECT_BG)
                .add_modifier(Modifier::BOLD),
        ))
    } else {
        Line::from(Span::styled(
            format!("    {label}"),
            Style::default().fg(Color::White),
        ))
    }
}

/// The resource table view. The layout is fixed so the first data row
/// always lands on the row the selection engine maps the table pane to.
fn render_resource_table(frame: &mut Frame, area: Rect, app: &App) {
    let keys = " 1-9 kind │ i describe │ y yaml │ t labels │ e events │ L logs │ d diagram │ m memory │ n ns │ c ctx │ r refresh │ a auto";
    let body = render_chrome(frame, area, app, keys);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(body);

    render_quick_select_bar(frame, chunks[0], app);
    render_list_summary(frame, chunks[1], app);
    render_table_rows(frame, chunks[2], app);
    render_pagination_line(frame, chunks[3], app);
}

fn render_quick_select_bar(frame: &mut Frame, area: Rect, app: &App) {
    let kinds = app.quick_select_kinds();
    let mut spans = vec![Span::styled(" kinds: ", Style::default().fg(MUTED))];
    for (index, kind) in kinds.iter().enumerate() {
        let label = format!("[{}]{} ", index + 1, kind.title());
        if Some(*kind) == app.active_kind() {
            spans.push(Span::styled(
                label,
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
            ));
        } else {
            spans.push(Span::styled(label, Style::default().fg(MUTED)));
        }
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans))
            .wrap(Wrap { trim: false })
            .style(Style::default().bg(BG)),
        area,
    );
}

fn render_list_summary(frame: &mut Frame, area: Rect, app: &App) {
    let real = app.records().iter().filter(|r| !r.synthetic).count();
    let flagged = (0..app.records().len())
        .filter_map(|index| app.health_for(index))
        .filter(|health| !health.is_clean())
        .count();
    let line = Line::from(vec![
        Span::styled(
            format!(" {real} items"),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!(" │ {flagged} flagged"),
            Style::default().fg(if flagged > 0 { WARN } else { MUTED }),
        ),
    ]);
    frame.render_widget(
        Paragraph::new(line).style(Style::default().bg(BG)),
        area,
    );
}

fn render_table_rows(frame: &mut Frame, area: Rect, app: &App) {
    let page_start = app.window().page_start();
    let cluster_scoped = app
        .active_kind()
        .map(|kind| kind.scope() == crate::model::Scope::Cluster)
        .unwrap_or(false);

    let header = Row::new(
        ["NAME", "NAMESPACE", "READY", "STATUS", "RESTARTS", "AGE", "HEALTH"]
            .into_iter()
            .map(|title| Cell::from(title).style(Style::default().fg(ACCENT))),
    );

    let rows = app
        .visible_records()
        .iter()
        .enumerate()
        .map(|(offset, record)| {
            let index = page_start + offset;
            let health = app.health_for(index);
            let row_style = if index == app.cursor() {
                Style::default().bg(SELECT_BG).add_modifier(Modifier::BOLD)
            } else if health.is_some_and(|h| !h.errors.is_empty()) {
                Style::default().fg(ERROR)
            } else if health.is_some_and(|h| !h.warnings.is_empty()) {
                Style::default().fg(WARN)
            } else {
                Style::default().fg(Color::White)
            };

            let health_cell = match health {
                Some(h) if !h.errors.is_empty() => format!("✖ {}", h.errors[0]),
                Some(h) if !h.warnings.is_empty() => format!("● {}", h.warnings[0]),
                _ => String::new(),
            };

            Row::new([
                Cell::from(record.name.clone()),
                Cell::from(if cluster_scoped {
                    "-".to_string()
                } else {
                    record.namespace.clone().unwrap_or_else(|| "-".to_string())
                }),
                Cell::from(record.ready_ratio.clone()),
                Cell::from(record.status.clone()),
                Cell::from(record.restart_count.to_string()),
                Cell::from(format_age(record.age_seconds)),
                Cell::from(health_cell),
            ])
            .style(row_style)
        })
        .collect::<Vec<_>>();

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(28),
            Constraint::Percentage(14),
            Constraint::Length(7),
            Constraint::Percentage(12),
            Constraint::Length(8),
            Constraint::Length(6),
            Constraint::Percentage(24),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(MUTED))
            .style(Style::default().bg(BG)),
    );
    frame.render_widget(table, area);
}

fn render_pagination_line(frame: &mut Frame, area: Rect, app: &App) {
    let window = app.window();
    let prev = if window.has_prev() {
        Span::styled("◄ prev", Style::default().fg(ACCENT))
    } else {
        Span::styled("◄ prev", Style::default().fg(MUTED))
    };
    let next = if window.has_next() {
        Span::styled("next ►", Style::default().fg(ACCENT))
    } else {
        Span::styled("next ►", Style::default().fg(MUTED))
    };
    let info = Span::styled(
        format!(
            " page {}/{} ({} items) ",
            window.current_page + 1,
            window.total_pages(),
            window.total_items,
        ),
        Style::default().fg(MUTED),
    );
    frame.render_widget(
        Paragraph::new(Line::from(vec![Span::raw(" "), prev, info, next]))
            .style(Style::default().bg(BG)),
        area,
    );
}

/// Long-form text panes. Content always starts on the pane's origin
/// row so drag selection maps back onto the right logical lines.
fn render_text_pane(frame: &mut Frame, area: Rect, app: &App) {
    let Some(pane) = app.view().pane() else {
        return;
    };
    let keys = " j/k scroll │ d/u page │ g/G top/bottom │ x copy │ drag to select │ esc back";
    let body = render_chrome(frame, area, app, keys);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(body);

    let target = app
        .pinned_record()
        .map(|record| match &record.namespace {
            Some(namespace) => format!("{}/{}", namespace, record.name),
            None => record.name.clone(),
        })
        .unwrap_or_default();
    let text = app.pane_backing_text(pane);
    let offset = app.pane_offset(pane);
    let viewport = app.pane_viewport_height();
    let line_count = text.lines().count();
    let max = ScrollPane::max_scroll(line_count, viewport);

    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(
                format!(" {} {target} ", app.view().title()),
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" [{}/{}] ", offset.min(max), max),
                Style::default().fg(MUTED),
            ),
        ]))
        .style(Style::default().bg(BG)),
        chunks[0],
    );

    let content = if text.is_empty() {
        Text::from(Line::from(Span::styled(
            "Loading…",
            Style::default().fg(MUTED),
        )))
    } else {
        pane_text_with_selection(app, pane, &text, offset, chunks[1].height as usize)
    };
    frame.render_widget(
        Paragraph::new(content).style(Style::default().bg(BG).fg(Color::White)),
        chunks[1],
    );
}

/// Slices the visible window out of the backing text and paints the
/// active drag selection over it.
fn pane_text_with_selection(
    app: &App,
    pane: PaneId,
    text: &str,
    offset: usize,
    height: usize,
) -> Text<'static> {
    let selection = app.selection().normalized();
    let origin = pane.origin_y() as i64;

    let lines = text
        .lines()
        .enumerate()
        .skip(offset)
        .take(height)
        .map(|(index, line)| {
            let row = origin + index as i64 - offset as i64;
            match selection {
                Some((sx, sy, ex, ey)) if row >= sy as i64 && row <= ey as i64 => {
                    let (from, to) = if sy == ey {
                        (sx as usize, ex as usize)
                    } else if row == sy as i64 {
                        (sx as usize, usize::MAX)
                    } else if row == ey as i64 {
                        (0, ex as usize)
                    } else {
                        (0, usize::MAX)
                    };
                    highlighted_line(line, from, to)
                }
                _ => Line::from(Span::raw(line.to_string())),
            }
        })
        .collect::<Vec<_>>();

    Text::from(lines)
}

fn highlighted_line(line: &str, from: usize, to: usize) -> Line<'static> {
    let chars = line.chars().collect::<Vec<_>>();
    let from = from.min(chars.len());
    let to = to.min(chars.len());
    if from >= to {
        return Line::from(Span::raw(line.to_string()));
    }
    let head = chars[..from].iter().collect::<String>();
    let selected = chars[from..to].iter().collect::<String>();
    let tail = chars[to..].iter().collect::<String>();
    Line::from(vec![
        Span::raw(head),
        Span::styled(
            selected,
            Style::default().bg(SELECT_BG).add_modifier(Modifier::BOLD),
        ),
        Span::raw(tail),
    ])
}

fn render_help(frame: &mut Frame, area: Rect, app: &App) {
    let body = render_chrome(frame, area, app, " esc/? close");
    let entries: &[(&str, &str)] = &[
        ("enter", "select / drill down"),
        ("esc, backspace", "back to the previous view"),
        ("j/k, arrows", "move cursor / scroll"),
        ("h/l, arrows", "previous / next page"),
        ("1-9", "quick-select a resource kind"),
        ("i", "describe the selected resource"),
        ("y", "manifest YAML"),
        ("t", "labels & annotations"),
        ("e", "events"),
        ("L", "pod logs"),
        ("d", "deployment diagram"),
        ("m", "pod memory usage"),
        ("n", "switch namespace"),
        ("c, tab", "switch context"),
        ("r", "refresh"),
        ("a", "toggle auto-refresh"),
        ("x", "copy pane content"),
        ("mouse drag", "select text; right-click copies"),
        ("q", "feedback & quit"),
        ("ctrl+c", "quit immediately"),
    ];
    let mut lines = vec![
        Line::default(),
        Line::from(Span::styled(
            "  Key bindings",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
    ];
    for (key, action) in entries {
        lines.push(Line::from(vec![
            Span::styled(format!("  {key:<16}"), Style::default().fg(ACCENT)),
            Span::styled((*action).to_string(), Style::default().fg(Color::White)),
        ]));
    }
    frame.render_widget(
        Paragraph::new(Text::from(lines)).style(Style::default().bg(BG)),
        body,
    );
}

fn render_feedback(frame: &mut Frame, area: Rect, app: &App) {
    let body = render_chrome(frame, area, app, " enter submit & exit │ esc skip & exit");
    let popup = centered_rect(60, 12, body);
    frame.render_widget(Clear, popup);

    let buttons = if app.feedback_submitting() {
        Line::from(Span::styled(
            " submitting… ",
            Style::default().fg(WARN),
        ))
    } else {
        Line::from(vec![
            Span::styled(" [enter] submit & exit ", Style::default().fg(ACCENT)),
            Span::styled(" [esc] skip & exit ", Style::default().fg(MUTED)),
        ])
    };

    let mut text_lines = app
        .feedback_text()
        .split('\n')
        .map(|line| Line::from(Span::raw(line.to_string())))
        .collect::<Vec<_>>();
    if let Some(last) = text_lines.last_mut() {
        last.spans.push(Span::styled(
            "│",
            Style::default().fg(ACCENT),
        ));
    }
    let mut lines = vec![Line::from(Span::styled(
        "Anything we should improve? (optional)",
        Style::default().fg(Color::White),
    ))];
    lines.push(Line::default());
    lines.extend(text_lines);
    lines.push(Line::default());
    lines.push(buttons);

    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title(" Feedback ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(ACCENT))
                    .style(Style::default().bg(PANEL)),
            ),
        popup,
    );
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Marker glyph shown next to kinds that carry extra capabilities in
/// the type list; kept here so the list and the help stay consistent.
pub fn kind_badge(kind: ResourceKind) -> &'static str {
    if kind.supports_logs() {
        "≋"
    } else if kind.supports_diagram() {
        "◇"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::{centered_rect, highlighted_line, kind_badge};
    use crate::model::ResourceKind;
    use ratatui::layout::Rect;

    #[test]
    fn centered_rect_never_exceeds_parent() {
        let parent = Rect::new(0, 0, 40, 10);
        let popup = centered_rect(60, 12, parent);
        assert!(popup.width <= parent.width);
        assert!(popup.height <= parent.height);
    }

    #[test]
    fn highlight_splits_line_into_three_spans() {
        let line = highlighted_line("hello world", 2, 7);
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[0].content, "he");
        assert_eq!(line.spans[1].content, "llo w");
        assert_eq!(line.spans[2].content, "orld");
    }

    #[test]
    fn highlight_degenerates_to_plain_line() {
        let line = highlighted_line("short", 10, 20);
        assert_eq!(line.spans.len(), 1);
    }

    #[test]
    fn badges_follow_capabilities() {
        assert_eq!(kind_badge(ResourceKind::Pods), "≋");
        assert_eq!(kind_badge(ResourceKind::Deployments), "◇");
        assert_eq!(kind_badge(ResourceKind::Secrets), "");
    }
}
