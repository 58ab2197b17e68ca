//! TUI rendering for the locus TUI
//!
//! Draws the provider picker, acquisition status, provider settings and the
//! map canvas, plus the failure panel, transient notification and input
//! modal on top.

use crate::app::{App, InputField, InputMode};
use crate::models::ProviderId;
use ratatui::{
    prelude::*,
    widgets::{canvas::*, *},
};

use ratatui::text::Line;

/// Renders one frame of the TUI based on current application state.
pub fn render(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(f.size());

    let sidebar = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8),
            Constraint::Length(7),
            Constraint::Min(10),
            Constraint::Length(4),
        ])
        .split(chunks[0]);

    render_providers(f, app, sidebar[0]);
    render_status(f, app, sidebar[1]);
    render_settings(f, app, sidebar[2]);
    render_help(f, sidebar[3]);

    if app.session.state().failure.is_some() {
        let main = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(9)])
            .split(chunks[1]);
        render_map(f, app, main[0]);
        render_failure(f, app, main[1]);
    } else {
        render_map(f, app, chunks[1]);
    }

    render_notification(f, app, chunks[1]);

    match &app.mode {
        InputMode::Normal => {}
        InputMode::Editing { field, buffer } => {
            render_input(f, field.label(), buffer, matches!(field, InputField::ApiKey))
        }
        InputMode::Prompt { reason, buffer } => render_input(f, reason.message(), buffer, true),
    }
}

fn render_providers(f: &mut Frame, app: &App, area: Rect) {
    let active = app.session.active();
    let items: Vec<ListItem> = app
        .session
        .descriptors()
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let style = if d.id == active {
                Style::default()
                    .fg(Color::Cyan)
                    .bg(Color::Rgb(30, 30, 60))
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(vec![
                Line::from(Span::styled(format!(" {} {}", i + 1, d.display_name), style)),
                Line::from(Span::styled(
                    format!("   {}", d.description),
                    Style::default().fg(Color::DarkGray),
                )),
            ])
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(" Providers ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded),
    );
    f.render_widget(list, area);
}

fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let state = app.session.state();
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let (status, color) = if state.loading {
        ("LOCATING…", Color::Yellow)
    } else if state.failure.is_some() {
        ("FAILED", Color::Red)
    } else if app.session.is_live_active() {
        ("LIVE", Color::Green)
    } else if state.result.is_some() {
        ("FIXED", Color::Green)
    } else {
        ("IDLE", Color::DarkGray)
    };

    let mut lines = vec![Line::from(vec![
        Span::styled("  STATUS: ", bold),
        Span::styled(status, Style::default().fg(color)),
    ])];

    if let Some(r) = &state.result {
        lines.push(Line::from(vec![
            Span::styled("  LAT/LON: ", bold),
            Span::styled(
                format!("{:.5}, {:.5}", r.latitude, r.longitude),
                Style::default().fg(Color::Yellow),
            ),
        ]));
        lines.push(Line::from(vec![
            Span::styled("  ACCURACY: ", bold),
            Span::raw(format!("±{:.0} m", r.accuracy_meters)),
        ]));
        lines.push(Line::from(vec![
            Span::styled("  UPDATED: ", bold),
            Span::raw(r.acquired_at.format("%H:%M:%S UTC").to_string()),
        ]));
    }

    let block = Paragraph::new(lines).block(
        Block::default()
            .title(" Location ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(block, area);
}

fn render_settings(f: &mut Frame, app: &App, area: Rect) {
    let device = app.session.device_settings();
    let remote = app.session.remote_options();
    let active = app.session.active();
    let on_off = |b: bool| if b { "on" } else { "off" };
    let heading = |id: ProviderId, title: &'static str| {
        let style = if id == active {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        Line::from(Span::styled(title, style))
    };
    let key_state = if app.has_key {
        "stored"
    } else {
        "missing"
    };

    let lines = vec![
        heading(ProviderId::Device, " Device"),
        Line::from(format!("  [l] Live tracking     {}", on_off(device.live_tracking))),
        Line::from(format!("  [+/-] Timeout         {}s", device.timeout_seconds)),
        Line::from(""),
        heading(ProviderId::Remote, " Network"),
        Line::from(format!("  [w] Wi-Fi             {}", on_off(remote.use_wifi))),
        Line::from(format!("  [c] Cellular          {}", on_off(remote.use_cell))),
        Line::from(format!("  [i] Consider IP       {}", on_off(remote.consider_ip))),
        Line::from(format!("  [t] Radio type        {}", remote.radio_type)),
        Line::from(format!("  [m] MCC               {}", remote.mcc.as_deref().unwrap_or("-"))),
        Line::from(format!("  [n] MNC               {}", remote.mnc.as_deref().unwrap_or("-"))),
        Line::from(format!("  [a] Carrier           {}", remote.carrier.as_deref().unwrap_or("-"))),
        Line::from(format!("  [k] API key           {}", key_state)),
    ];

    let mut frame_block = Block::default()
        .title(" Settings ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);
    if let Some(msg) = &app.settings_message {
        frame_block = frame_block.title(
            block::Title::from(Span::styled(format!(" {msg} "), Style::default().fg(Color::Yellow)))
                .position(block::Position::Bottom),
        );
    }
    f.render_widget(Paragraph::new(lines).block(frame_block), area);
}

fn render_help(f: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from(" 1/2/3 provider   r refresh   s save"),
        Line::from(" Esc dismiss   q quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default().borders(Borders::TOP));
    f.render_widget(help, area);
}

fn render_map(f: &mut Frame, app: &App, area: Rect) {
    let view = app.map;
    let (lat, lon) = view.center;
    let title = if view.has_fix {
        format!(" Map ({:.3}, {:.3}) ", lat, lon)
    } else {
        " Map ".to_string()
    };

    let canvas = Canvas::default()
        .block(Block::bordered().title(title))
        .marker(symbols::Marker::Braille)
        .x_bounds(view.x_bounds())
        .y_bounds(view.y_bounds())
        .paint(move |ctx| {
            // Landmass Outlines
            ctx.draw(&Map {
                color: Color::Rgb(50, 50, 50),
                resolution: MapResolution::High,
            });
            if !view.has_fix {
                return;
            }
            ctx.layer();
            ctx.draw(&Circle {
                x: lon,
                y: lat,
                radius: view.accuracy_degrees(),
                color: Color::Cyan,
            });
            ctx.print(
                lon,
                lat,
                Line::from(Span::styled(" ⌖ ", Style::default().fg(Color::Yellow))),
            );
        });

    f.render_widget(canvas, area);
}

fn render_failure(f: &mut Frame, app: &App, area: Rect) {
    let Some(failure) = &app.session.state().failure else {
        return;
    };
    let mut lines = vec![
        Line::from(Span::styled(
            failure.summary.as_str(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    lines.extend(failure.detail.lines().map(Line::from));

    let p = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .title(" Error ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .padding(Padding::horizontal(1)),
    );
    f.render_widget(p, area);
}

fn render_notification(f: &mut Frame, app: &App, area: Rect) {
    let Some(note) = &app.session.state().notification else {
        return;
    };
    let width = (note.message.chars().count() as u16 + 4).min(area.width);
    let toast = Rect {
        x: area.x + area.width.saturating_sub(width + 1),
        y: area.y + 1,
        width,
        height: 3.min(area.height),
    };
    f.render_widget(Clear, toast);
    f.render_widget(
        Paragraph::new(note.message.as_str())
            .style(Style::default().fg(Color::White).bg(Color::Rgb(120, 20, 30)))
            .block(Block::bordered()),
        toast,
    );
}

fn render_input(f: &mut Frame, title: &str, buffer: &str, secret: bool) {
    let area = centered(f.size(), 60, 5);
    let shown = if secret {
        "•".repeat(buffer.chars().count())
    } else {
        buffer.to_string()
    };
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(vec![
            Line::from(format!(" {shown}▏")),
            Line::from(Span::styled(
                " Enter confirm   Esc cancel",
                Style::default().fg(Color::DarkGray),
            )),
        ])
        .block(
            Block::bordered()
                .title(format!(" {title} "))
                .border_style(Style::default().fg(Color::Cyan)),
        ),
        area,
    );
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
