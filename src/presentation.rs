//! Text status screen
//!
//! Renders the status board and verdict the way the device's display lays
//! them out. Owns no puzzle logic: everything shown comes from
//! [`PhaseStatus::text`](crate::phase::PhaseStatus) and the verdict
//! snapshot.

use std::fmt::Write as _;

use crate::phase::{Outcome, PhaseId, PhaseStatus};
use crate::verdict::{Overall, VerdictSnapshot};

/// Display label of a phase.
#[must_use]
pub const fn label(id: PhaseId) -> &'static str {
    match id {
        PhaseId::Countdown => "Time left",
        PhaseId::Combination => "Keypad phase",
        PhaseId::WirePair => "Wires phase",
        PhaseId::HoldButton => "Button phase",
        PhaseId::ToggleBank => "Toggles phase",
    }
}

/// Renders one screen.
#[must_use]
pub fn render(statuses: &[PhaseStatus], verdict: &VerdictSnapshot) -> String {
    let mut out = String::new();
    for status in statuses {
        let _ = write!(out, "{}: {}", label(status.id), status.text);
        if status.outcome == Outcome::Failed && status.id != PhaseId::Countdown {
            out.push_str(" [failed]");
        }
        out.push('\n');
    }
    let _ = writeln!(out, "Strikes left: {}", verdict.strikes_remaining);

    match verdict.overall {
        Overall::Pending if verdict.paused => out.push_str("PAUSED\n"),
        Overall::Pending => {}
        Overall::Defused => out.push_str("Device DEFUSED\n"),
        Overall::Exploded => {
            let _ = match verdict.cause {
                Some(cause) => writeln!(out, "Device EXPLODED ({cause})"),
                None => writeln!(out, "Device EXPLODED"),
            };
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::EndCause;
    use std::collections::BTreeSet;

    fn status(id: PhaseId, outcome: Outcome, text: &str) -> PhaseStatus {
        PhaseStatus {
            id,
            outcome,
            text: text.to_string(),
        }
    }

    fn verdict(overall: Overall, cause: Option<EndCause>, paused: bool) -> VerdictSnapshot {
        VerdictSnapshot {
            strikes_remaining: 2,
            paused,
            overall,
            cause,
            solved: BTreeSet::new(),
        }
    }

    #[test]
    fn test_render_pending_screen() {
        let statuses = vec![
            status(PhaseId::Countdown, Outcome::Running, "04:59"),
            status(PhaseId::Combination, Outcome::Running, "12"),
            status(PhaseId::WirePair, Outcome::Failed, "amber"),
            status(PhaseId::HoldButton, Outcome::Running, "Pressed"),
            status(PhaseId::ToggleBank, Outcome::Solved, "DEFUSED"),
        ];
        let screen = render(&statuses, &verdict(Overall::Pending, None, false));
        assert_eq!(
            screen,
            "Time left: 04:59\n\
             Keypad phase: 12\n\
             Wires phase: amber [failed]\n\
             Button phase: Pressed\n\
             Toggles phase: DEFUSED\n\
             Strikes left: 2\n"
        );
    }

    #[test]
    fn test_render_banners() {
        let paused = render(&[], &verdict(Overall::Pending, None, true));
        assert!(paused.ends_with("PAUSED\n"));

        let exploded = render(
            &[status(PhaseId::Countdown, Outcome::Failed, "00:00")],
            &verdict(Overall::Exploded, Some(EndCause::TimeExpired), false),
        );
        assert_eq!(
            exploded,
            "Time left: 00:00\nStrikes left: 2\nDevice EXPLODED (time expired)\n"
        );

        let defused = render(&[], &verdict(Overall::Defused, Some(EndCause::AllSolved), false));
        assert!(defused.ends_with("Device DEFUSED\n"));
    }
}
