use std::fmt;

use crate::progression::ProfileRecord;

/// Read-only rendering of the signed-in player's profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileView {
    pub username: String,
    pub level: u32,
    pub xp: u64,
    pub diamond: u64,
    pub gold: u64,
    /// Xp needed to leave the current level.
    pub next_level: u64,
}

impl ProfileView {
    pub fn lines(&self) -> Vec<String> {
        vec![
            self.username.clone(),
            format!("Level: {}", self.level),
            format!("Xp: {}", self.xp),
            format!("Diamond: {}", self.diamond),
            format!("Gold: {}", self.gold),
            format!("Next level: {}", self.next_level),
        ]
    }
}

impl From<&ProfileRecord> for ProfileView {
    fn from(record: &ProfileRecord) -> Self {
        Self {
            username: record.username.clone(),
            level: record.level,
            xp: record.xp,
            diamond: record.diamond,
            gold: record.gold,
            next_level: record.next_threshold(),
        }
    }
}

impl fmt::Display for ProfileView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines().join("\n"))
    }
}
