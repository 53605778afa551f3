use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;

use crate::models::Todo;

/// Reminder and deadline state of a todo relative to the current UTC day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DueFlags {
    pub is_reminder_today: bool,
    pub is_reminder_overdue: bool,
    pub is_deadline_today: bool,
    pub is_deadline_overdue: bool,
    /// Deadline falls after today but within two days of today's start.
    pub is_deadline_soon: bool,
}

impl DueFlags {
    pub fn evaluate(todo: &Todo, now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let start_of_today = today.and_time(NaiveTime::MIN).and_utc();

        let mut flags = DueFlags::default();

        if let Some(reminder) = todo.reminder {
            flags.is_reminder_today = reminder.date_naive() == today;
            flags.is_reminder_overdue = reminder < start_of_today;
        }

        if let Some(deadline) = todo.deadline {
            flags.is_deadline_today = deadline.date_naive() == today;
            flags.is_deadline_overdue = deadline < start_of_today;
            flags.is_deadline_soon = !flags.is_deadline_today
                && deadline > start_of_today
                && deadline - start_of_today <= Duration::days(2);
        }

        flags
    }
}

/// A todo as returned to its owner, with due flags alongside.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoView {
    #[serde(flatten)]
    pub todo: Todo,
    #[serde(flatten)]
    pub due: DueFlags,
}

impl TodoView {
    pub fn new(todo: Todo, now: DateTime<Utc>) -> Self {
        let due = DueFlags::evaluate(&todo, now);
        Self { todo, due }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::TodoStatus;

    fn todo(deadline: Option<DateTime<Utc>>, reminder: Option<DateTime<Utc>>) -> Todo {
        let created = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Todo {
            id: 1,
            title: "t".to_string(),
            description: None,
            tags: vec![],
            deadline,
            reminder,
            status: TodoStatus::Todo,
            completed: false,
            user_id: 1,
            created_at: created,
            updated_at: created,
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn no_dates_no_flags() {
        assert_eq!(DueFlags::evaluate(&todo(None, None), at(10, 12)), DueFlags::default());
    }

    #[test]
    fn deadline_states() {
        let now = at(10, 12);

        let today = DueFlags::evaluate(&todo(Some(at(10, 8)), None), now);
        assert!(today.is_deadline_today);
        assert!(!today.is_deadline_overdue);
        assert!(!today.is_deadline_soon);

        let overdue = DueFlags::evaluate(&todo(Some(at(9, 23)), None), now);
        assert!(overdue.is_deadline_overdue);
        assert!(!overdue.is_deadline_today);

        let soon = DueFlags::evaluate(&todo(Some(at(11, 18)), None), now);
        assert!(soon.is_deadline_soon);

        let edge = DueFlags::evaluate(&todo(Some(at(12, 0)), None), now);
        assert!(edge.is_deadline_soon);

        let later = DueFlags::evaluate(&todo(Some(at(12, 1)), None), now);
        assert!(!later.is_deadline_soon);
    }

    #[test]
    fn reminder_states() {
        let now = at(10, 12);

        let today = DueFlags::evaluate(&todo(None, Some(at(10, 20))), now);
        assert!(today.is_reminder_today);
        assert!(!today.is_reminder_overdue);

        let overdue = DueFlags::evaluate(&todo(None, Some(at(8, 9))), now);
        assert!(overdue.is_reminder_overdue);
        assert!(!overdue.is_reminder_today);
    }

    #[test]
    fn view_flattens_todo_fields() {
        let view = TodoView::new(todo(Some(at(10, 8)), None), at(10, 12));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["title"], "t");
        assert_eq!(json["status"], "todo");
        assert_eq!(json["isDeadlineToday"], true);
        assert_eq!(json["isReminderOverdue"], false);
        assert!(json.get("due").is_none());
    }
}
