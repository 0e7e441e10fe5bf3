use std::io::stdout;

use crate::gui::error::MonitorError;
use crate::index::UserList;
use crate::roster::Roster;

use crossterm::{
    event::{self, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{
        block::{Position, Title},
        *,
    },
    Terminal,
};

/// One line per known user, in index order.
fn entries(roster: &Roster) -> Vec<(UserList, String)> {
    [UserList::New, UserList::Incomplete, UserList::Complete]
        .into_iter()
        .flat_map(|which| {
            roster
                .list(which)
                .iter()
                .map(move |r| (which, r.user_id().to_owned()))
        })
        .collect()
}

/// Let the operator pick a user from the roster. Returns `None` if the
/// roster is empty or the operator quit.
pub fn user_selector(roster: &Roster) -> Result<Option<String>, MonitorError> {
    let mut users = entries(roster);
    let n_users = users.len();
    if n_users == 0 {
        return Ok(None);
    }

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let mut cursor = 0;
    let mut list_state = ListState::default().with_selected(Some(cursor));
    let mut selected_user = None;
    loop {
        let title = Title::from(" User Selector ".magenta().bold());
        let instructions = Title::from(Line::from(vec![
            " Navigate ".into(),
            "<Up>/<Down>".magenta().bold(),
            " Select ".into(),
            "<Enter>".magenta().bold(),
            " Skip ".into(),
            "<Q> ".magenta().bold(),
        ]));
        let block = Block::default()
            .title(title.alignment(Alignment::Center))
            .title(
                instructions
                    .alignment(Alignment::Center)
                    .position(Position::Bottom),
            )
            .borders(Borders::ALL);
        let names = users
            .iter()
            .map(|(which, id)| format!("User {:<8} {}", id, which));
        let list = List::new(names)
            .style(Style::default().fg(Color::White))
            .highlight_symbol(">>")
            .highlight_style(Style::default().fg(Color::Magenta))
            .block(block);
        list_state.select(Some(cursor));
        terminal.draw(|frame| {
            let area = frame.size();
            frame.render_stateful_widget(list, area, &mut list_state);
        })?;
        if event::poll(std::time::Duration::from_millis(16))? {
            if let event::Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Down => {
                            cursor = (cursor + 1) % n_users;
                        }
                        KeyCode::Up => {
                            cursor = (cursor + n_users - 1) % n_users;
                        }
                        KeyCode::Enter => {
                            selected_user = Some(cursor);
                            break;
                        }
                        KeyCode::Char('q') => break,
                        _ => {}
                    }
                }
            }
        }
    }

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(selected_user.map(|i| users.swap_remove(i).1))
}
