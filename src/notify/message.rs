use std::fmt::Write;

use super::NotificationEvent;
use crate::domain::{Reservation, ReservationStatus};

/// One line subject for e-mail
pub fn headline(event: &NotificationEvent) -> String {
    let r = event.reservation();
    match event {
        NotificationEvent::ReservationCreated { .. } => {
            format!("New reservation {} from {}", r.code, r.school.name)
        }
        NotificationEvent::StatusChanged { .. } => {
            format!("Reservation {} is now {}", r.code, status_label(r.status))
        }
    }
}

/// Plain text body shared by LINE and e-mail
pub fn render_text(event: &NotificationEvent) -> String {
    let r = event.reservation();
    let mut out = String::new();

    let _ = writeln!(out, "{}", headline(event));
    if let NotificationEvent::StatusChanged { from, .. } = event {
        let _ = writeln!(out, "Status: {} -> {}", status_label(*from), status_label(r.status));
        if let Some(reason) = r.history.last().and_then(|h| h.reason.as_deref()) {
            let _ = writeln!(out, "Reason: {}", reason);
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Code: {}", r.code);
    let _ = writeln!(out, "School: {} ({})", r.school.name, r.school.province);
    let _ = writeln!(out, "Students: {}", r.school.student_count);
    let _ = writeln!(out, "Contact: {} / {} / {}", r.contact.name, r.contact.phone, r.contact.email);
    let _ = writeln!(out);
    for day in &r.training_days {
        let _ = writeln!(out, "{}", day.date.format("%a %d %b %Y"));
        for s in &day.sessions {
            let _ = writeln!(
                out,
                "  - {} | {} | {} classroom(s)",
                event.subject_name(s.subject_id),
                s.slot.label(),
                s.classrooms
            );
        }
    }
    if let Some(note) = r.note.as_deref().filter(|n| !n.is_empty()) {
        let _ = writeln!(out);
        let _ = writeln!(out, "Note: {}", note);
    }
    out.trim_end().to_string()
}

/// Spreadsheet row for a newly created reservation
pub fn sheet_row(event: &NotificationEvent) -> Vec<String> {
    let r = event.reservation();
    vec![
        r.created_at.to_rfc3339(),
        r.code.clone(),
        r.status.to_string(),
        r.school.name.clone(),
        r.school.province.clone(),
        r.school.level.to_string(),
        r.school.student_count.to_string(),
        r.contact.name.clone(),
        r.contact.phone.clone(),
        r.contact.email.clone(),
        sessions_cell(r, event),
        r.note.clone().unwrap_or_default(),
    ]
}

fn sessions_cell(r: &Reservation, event: &NotificationEvent) -> String {
    r.sessions()
        .map(|(date, s)| {
            format!(
                "{} {} {} x{}",
                date,
                s.slot,
                event.subject_name(s.subject_id),
                s.classrooms
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn status_label(status: ReservationStatus) -> &'static str {
    match status {
        ReservationStatus::Pending => "pending review",
        ReservationStatus::Confirmed => "confirmed",
        ReservationStatus::Completed => "completed",
        ReservationStatus::Cancelled => "cancelled",
        ReservationStatus::Rejected => "rejected",
    }
}
