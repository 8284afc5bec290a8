use chrono::{Days, Local, Months, NaiveDate};

pub const PRESENT: &str = "Present";
pub const ABSENT: &str = "Absent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Present,
    Absent,
}

impl Status {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            PRESENT => Some(Status::Present),
            ABSENT => Some(Status::Absent),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Present => PRESENT,
            Status::Absent => ABSENT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Teacher,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "admin" => Some(Role::Admin),
            "teacher" => Some(Role::Teacher),
            _ => None,
        }
    }

    /// A missing or unrecognised profile role resolves to the lower privilege.
    pub fn from_profile(raw: Option<&str>) -> Self {
        raw.and_then(Role::parse).unwrap_or(Role::Teacher)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Daily,
    Weekly,
    Monthly,
}

impl Window {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(Window::Daily),
            "weekly" => Some(Window::Weekly),
            "monthly" => Some(Window::Monthly),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Window::Daily => "daily",
            Window::Weekly => "weekly",
            Window::Monthly => "monthly",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Window::Daily => "Today",
            Window::Weekly => "Last 7 Days",
            Window::Monthly => "Last Month",
        }
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn date_key(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// First calendar day included in a summary window ending on `today`.
/// A month back from the 31st clamps to the last day of the shorter month.
pub fn window_start(window: Window, today: NaiveDate) -> NaiveDate {
    match window {
        Window::Daily => today,
        Window::Weekly => today.checked_sub_days(Days::new(7)).unwrap_or(today),
        Window::Monthly => today.checked_sub_months(Months::new(1)).unwrap_or(today),
    }
}

/// Nearest integer percentage, halves round up; 0 when nothing was recorded.
pub fn percentage(present: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (p, t) = (present as u64, total as u64);
    ((200 * p + t) / (2 * t)) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub present: u32,
    pub absent: u32,
    pub total: u32,
    pub percentage: u32,
}

pub fn summarize<'a>(statuses: impl IntoIterator<Item = &'a str>) -> Summary {
    let mut s = Summary::default();
    for status in statuses {
        s.total += 1;
        match Status::parse(status) {
            Some(Status::Present) => s.present += 1,
            Some(Status::Absent) => s.absent += 1,
            None => {}
        }
    }
    s.percentage = percentage(s.present, s.total);
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
    }

    #[test]
    fn percentage_rounds_to_nearest() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(1, 1), 100);
    }

    #[test]
    fn window_start_uses_calendar_arithmetic() {
        let today = d(2024, 3, 15);
        assert_eq!(window_start(Window::Daily, today), today);
        assert_eq!(window_start(Window::Weekly, today), d(2024, 3, 8));
        assert_eq!(window_start(Window::Monthly, today), d(2024, 2, 15));
        assert_eq!(window_start(Window::Weekly, d(2024, 1, 3)), d(2023, 12, 27));
        assert_eq!(window_start(Window::Monthly, d(2024, 3, 31)), d(2024, 2, 29));
    }

    #[test]
    fn summarize_counts_each_status() {
        let s = summarize(["Present", "Absent", "Present"]);
        assert_eq!(
            s,
            Summary {
                present: 2,
                absent: 1,
                total: 3,
                percentage: 67
            }
        );
        assert_eq!(summarize(std::iter::empty()), Summary::default());
    }

    #[test]
    fn missing_profile_role_is_teacher() {
        assert_eq!(Role::from_profile(None), Role::Teacher);
        assert_eq!(Role::from_profile(Some("superuser")), Role::Teacher);
        assert_eq!(Role::from_profile(Some("admin")), Role::Admin);
    }

    #[test]
    fn status_tokens_are_exact() {
        assert_eq!(Status::parse("Present"), Some(Status::Present));
        assert_eq!(Status::parse("present"), None);
        assert_eq!(Window::parse(" Weekly "), Some(Window::Weekly));
    }
}
