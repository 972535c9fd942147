use crate::application::{App, AppMode};
use crate::domain::{View, ROUTES};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Cell, Clear, Gauge, List, ListItem, ListState, Paragraph, Row, Table, Tabs},
    Frame,
};

pub fn render_ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_tabs(f, app, chunks[0]);

    let body = if app.state.sidebar_collapsed() {
        chunks[1]
    } else {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(22), Constraint::Min(0)])
            .split(chunks[1]);
        render_sidebar(f, app, columns[0]);
        columns[1]
    };

    // Only the active route's view is built.
    match app.route.view {
        View::Dashboard => render_dashboard(f, app, body),
        View::Viewer => render_viewer(f, app, body),
        View::Segmentation => render_segmentation(f, app, body),
        View::Settings => render_settings(f, app, body),
    }

    render_status_bar(f, app, chunks[2]);

    if app.mode == AppMode::Help {
        render_help_popup(f, app.help_scroll);
    }
}

fn render_tabs(f: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = ROUTES
        .iter()
        .enumerate()
        .map(|(i, route)| Line::from(format!("{} {}", i + 1, route.name)))
        .collect();
    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL).title("V3Di Slicer"))
        .select(app.route.index())
        .style(Style::default().fg(Color::Cyan))
        .highlight_style(Style::default().fg(Color::Black).bg(Color::LightBlue));
    f.render_widget(tabs, area);
}

fn render_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = ROUTES
        .iter()
        .map(|route| {
            let style = if route == app.route {
                Style::default().fg(Color::Black).bg(Color::LightBlue)
            } else {
                Style::default()
            };
            ListItem::new(format!("{:<14}{}", route.name, route.path)).style(style)
        })
        .collect();

    let mut lines = vec![ListItem::new("")];
    lines.push(ListItem::new(match app.state.current_study() {
        Some(study) => format!("Study: {study}"),
        None => "No study".to_string(),
    }));
    if app.state.is_processing() {
        lines.push(ListItem::new(format!("Processing {}%", app.state.processing_progress())).style(Style::default().fg(Color::Yellow)));
    }

    let list = List::new(items.into_iter().chain(lines)).block(Block::default().borders(Borders::ALL).title("Navigate"));
    f.render_widget(list, area);
}

fn render_dashboard(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(0)])
        .split(area);

    let health_text = match &app.health {
        Some(health) => format!(
            "Status: {}\nSlicer available: {}\nActive jobs: {}",
            health.status,
            if health.slicer_available { "yes" } else { "no (demo mode)" },
            health.active_jobs
        ),
        None => "Press h to check the backend".to_string(),
    };
    let health = Paragraph::new(health_text).block(Block::default().borders(Borders::ALL).title("Backend"));
    f.render_widget(health, chunks[0]);

    let header = Row::new(vec!["Job", "Status", "Progress", "Created"]).style(Style::default().fg(Color::Yellow));
    let rows: Vec<Row> = app
        .jobs
        .iter()
        .map(|job| {
            Row::new(vec![
                Cell::from(job.job_id.clone()),
                Cell::from(job.status.to_string()),
                Cell::from(format!("{}%", job.progress)),
                Cell::from(job.created_at.clone().unwrap_or_default()),
            ])
        })
        .collect();
    let widths = [
        Constraint::Length(12),
        Constraint::Length(12),
        Constraint::Length(10),
        Constraint::Min(10),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Jobs (r to refresh)"));
    f.render_widget(table, chunks[1]);
}

fn render_viewer(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(area);

    let study = format!(
        "Study: {}\nSeries: {}",
        app.state.current_study().unwrap_or("-"),
        app.state.current_series().unwrap_or("-")
    );
    f.render_widget(
        Paragraph::new(study).block(Block::default().borders(Borders::ALL).title(format!("Panel: {}", app.state.active_panel()))),
        chunks[0],
    );

    let items: Vec<ListItem> = app
        .state
        .stl_files()
        .iter()
        .map(|file| ListItem::new(format!("{:<16}{:>10} B  {}", file.name, file.size, file.absolute_url(app.state.backend_url()))))
        .collect();
    let title = if app.state.has_stl_files() {
        "STL files (j/k select, y copy URL, d download)"
    } else {
        "No STL files yet"
    };
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::Blue).fg(Color::White).add_modifier(Modifier::BOLD));
    let mut state = ListState::default();
    if app.state.has_stl_files() {
        state.select(Some(app.selected_stl));
    }
    f.render_stateful_widget(list, chunks[1], &mut state);
}

fn render_segmentation(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let info = format!(
        "Study: {}\nModel: {} (m to change)\nJob: {}\nMessage: {}",
        app.state.current_study().unwrap_or("none, press u to upload"),
        app.model_type,
        app.state.processing_job().unwrap_or("-"),
        app.state.processing_message()
    );
    f.render_widget(Paragraph::new(info).block(Block::default().borders(Borders::ALL).title("Segmentation")), chunks[0]);

    let (label, percent) = match app.upload_progress {
        Some(p) => ("Upload", p),
        None => ("Progress", app.state.processing_progress()),
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(label))
        .gauge_style(Style::default().fg(if app.state.is_processing() { Color::Green } else { Color::DarkGray }))
        .percent(u16::from(percent.min(100)));
    f.render_widget(gauge, chunks[1]);

    let hint = if app.state.is_processing() {
        "x: stop tracking the running job"
    } else {
        "g: start segmentation of the current study"
    };
    f.render_widget(Paragraph::new(hint), chunks[2]);
}

fn render_settings(f: &mut Frame, app: &App, area: Rect) {
    let rows = vec![
        Row::new(vec!["Backend URL".to_string(), app.config.base_str().to_string()]),
        Row::new(vec!["Request timeout".to_string(), format!("{} ms", app.config.timeout.as_millis())]),
        Row::new(vec!["Poll interval".to_string(), format!("{} ms", app.config.poll_interval.as_millis())]),
        Row::new(vec!["Log file".to_string(), app.config.log_file.display().to_string()]),
        Row::new(vec!["User".to_string(), app.state.user().unwrap_or("-").to_string()]),
    ];
    let table = Table::new(rows, [Constraint::Length(18), Constraint::Min(10)])
        .block(Block::default().borders(Borders::ALL).title("Settings"));
    f.render_widget(table, area);
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let text = match app.mode {
        AppMode::Normal => match &app.status_message {
            Some(status) => status.clone(),
            None => "1-4/Tab: views | u: upload | g: segment | h: health | r: jobs | b: sidebar | ?: help | q: quit".to_string(),
        },
        AppMode::UploadPath => format!("Upload file: {} (Enter to upload, Esc to cancel)", app.input),
        AppMode::Help => "↑↓/jk: scroll | Home: top | Esc/q: close help".to_string(),
    };

    let status = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(match app.mode {
            AppMode::Normal => Style::default(),
            AppMode::UploadPath => Style::default().fg(Color::Yellow),
            AppMode::Help => Style::default().fg(Color::Cyan),
        });
    f.render_widget(status, area);
}

fn render_help_popup(f: &mut Frame, scroll: usize) {
    let area = f.area();
    let popup_area = Rect {
        x: area.width / 10,
        y: area.height / 10,
        width: area.width * 4 / 5,
        height: area.height * 4 / 5,
    };

    f.render_widget(Clear, popup_area);

    let help_lines: Vec<&str> = HELP_TEXT.lines().collect();
    let visible_height = popup_area.height.saturating_sub(2) as usize;
    let start_line = scroll.min(help_lines.len().saturating_sub(visible_height));
    let end_line = (start_line + visible_height).min(help_lines.len());

    let help_widget = Paragraph::new(help_lines[start_line..end_line].join("\n"))
        .block(Block::default().borders(Borders::ALL).title("Help").style(Style::default().fg(Color::Cyan)))
        .style(Style::default().fg(Color::White));

    f.render_widget(help_widget, popup_area);
}

const HELP_TEXT: &str = "V3DI SLICER

=== VIEWS ===
1 / Tab         Dashboard: backend health and job list
2               Viewer: current study and its STL meshes
3               Segmentation: job submission and progress
4               Settings: backend address and timings
Shift+Tab       Previous view
b               Collapse or expand the sidebar

=== WORKFLOW ===
u               Upload a DICOM file or zip archive
g               Start segmentation of the current study
m               Cycle the model (teeth, anatomy, implant)
x               Stop tracking the running job
c               Clear the current study and its meshes

=== RESULTS ===
j / k           Select an STL file in the viewer
y               Copy its download URL to the clipboard
d               Download it into the working directory

=== BACKEND ===
h               Check backend health
r               Refresh the job list

=== HELP ===
↑↓ or j/k       Scroll this text
Esc/F1/?/q      Close help
q               Quit";
