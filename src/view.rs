//! Text rendering of a board for chat replies.

use crate::keno::{BoardSettings, BoardState, Notification, Number, Severity, MAX_SELECTIONS};

const COLUMNS: usize = 10;

/// Eight rows of ten cells inside a code block, marked cells in brackets,
/// followed by the counter and stake lines.
pub fn render_board(state: &BoardState, settings: &BoardSettings) -> String {
    let selections = state.selections();
    let cells: Vec<String> = Number::all()
        .map(|n| {
            if selections.contains(n) {
                format!("[{:>2}]", n.get())
            } else {
                format!(" {:>2} ", n.get())
            }
        })
        .collect();

    let grid = cells
        .chunks(COLUMNS)
        .map(|row| row.concat())
        .collect::<Vec<_>>()
        .join("\n");

    let bet = match state.bet() {
        Some(amount) => amount.to_string(),
        None if settings.require_bet_before_selection => {
            "not chosen (required before picking)".to_string()
        }
        None => "not chosen".to_string(),
    };

    format!(
        "**KENO**\n```\n{}\n```\nSelected: {}/{}\nBet: {}",
        grid,
        selections.len(),
        MAX_SELECTIONS,
        bet
    )
}

pub fn render_notification(notification: &Notification) -> String {
    let icon = match notification.severity {
        Severity::Success => "✅",
        Severity::Error => "⛔",
    };
    format!("{} {}", icon, notification.text)
}

/// Notifications first, then the board.
pub fn render_reply(
    notifications: &[Notification],
    state: &BoardState,
    settings: &BoardSettings,
) -> String {
    let mut lines: Vec<String> = notifications.iter().map(render_notification).collect();
    lines.push(render_board(state, settings));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keno::{BetAmount, SelectionController};

    fn ungated() -> SelectionController {
        let settings = BoardSettings {
            require_bet_before_selection: false,
            opening_bet: None,
        };
        SelectionController::new(settings, |_: Notification| {})
    }

    #[test]
    fn empty_board_has_eighty_cells_and_counter() {
        let controller = ungated();
        let text = render_board(controller.state(), controller.settings());
        assert_eq!(text.matches('\n').count(), 12);
        assert!(text.contains("  1   2 "));
        assert!(text.contains(" 80 "));
        assert!(text.contains("Selected: 0/20"));
        assert!(text.contains("Bet: not chosen"));
    }

    #[test]
    fn marked_cells_and_bet_show() {
        let mut controller = ungated();
        controller.select_or_deselect(Number::new(7));
        controller.select_or_deselect(Number::new(80));
        controller.set_bet(BetAmount::Hundred);

        let text = render_board(controller.state(), controller.settings());
        assert!(text.contains("[ 7]"));
        assert!(text.contains("[80]"));
        assert!(!text.contains("[ 8]"));
        assert!(text.contains("Selected: 2/20"));
        assert!(text.contains("Bet: 100"));
    }

    #[test]
    fn reply_leads_with_notifications() {
        let controller = ungated();
        let reply = render_reply(
            &[Notification::error("Maximum 20 numbers allowed")],
            controller.state(),
            controller.settings(),
        );
        assert!(reply.starts_with("⛔ Maximum 20 numbers allowed\n**KENO**"));
    }

    #[test]
    fn gated_board_says_bet_is_required() {
        let controller = SelectionController::new(BoardSettings::default(), |_: Notification| {});
        let text = render_board(controller.state(), controller.settings());
        assert!(text.contains("Bet: not chosen (required before picking)"));
    }
}
