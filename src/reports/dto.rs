use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct WeeklyQuery {
    pub week_start: Option<String>,
    pub regenerate: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<String>,
}
