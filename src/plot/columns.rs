// src/plot/columns.rs
//! Recognising the columns a chart needs, and ordering stories.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::table::Table;

static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").expect("valid regex"));

/// Headings reduced for loose comparison: trimmed, lower-cased, without
/// spaces and the usual separators.
pub fn column_key(heading: &str) -> String {
    heading
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-' | ',' | ':' | ';'))
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Story,
    Joint,
    Case,
    Direction,
    Drift,
}

impl Role {
    const ALL: [Role; 5] = [Role::Story, Role::Joint, Role::Case, Role::Direction, Role::Drift];

    fn keys(&self) -> &'static [&'static str] {
        match self {
            Role::Story => &["story", "nivel", "piso", "storyname", "storylabel"],
            Role::Joint => &["joint", "point", "label", "name", "node", "uniquename"],
            Role::Case => &["outputcase", "case", "loadcase", "combo", "combination"],
            Role::Direction => &["direction", "dir", "eje", "orientacion"],
            Role::Drift => &["drift", "maxdrift", "maximumdrift", "storydrift", "deriva"],
        }
    }
}

/// Column index for each role present in a table. The first matching
/// heading wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub story: Option<usize>,
    pub joint: Option<usize>,
    pub case: Option<usize>,
    pub direction: Option<usize>,
    pub drift: Option<usize>,
}

impl ColumnMap {
    pub fn detect(table: &Table) -> Self {
        let mut map = ColumnMap::default();
        for (idx, heading) in table.columns.iter().enumerate() {
            let key = column_key(heading);
            for role in Role::ALL {
                if role.keys().contains(&key.as_str()) {
                    let slot = map.slot(role);
                    if slot.is_none() {
                        *slot = Some(idx);
                    }
                }
            }
        }
        map
    }

    fn slot(&mut self, role: Role) -> &mut Option<usize> {
        match role {
            Role::Story => &mut self.story,
            Role::Joint => &mut self.joint,
            Role::Case => &mut self.case,
            Role::Direction => &mut self.direction,
            Role::Drift => &mut self.drift,
        }
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum StoryKey {
    Base,
    Numbered(u64),
    Named(String),
}

fn story_key(name: &str) -> StoryKey {
    let lower = name.trim().to_lowercase();
    if matches!(lower.as_str(), "base" | "basement" | "foundation") {
        return StoryKey::Base;
    }
    match FIRST_NUMBER
        .captures(name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
    {
        Some(n) => StoryKey::Numbered(n),
        None => StoryKey::Named(lower),
    }
}

/// Bottom-to-top story order: the preferred names first, exactly as given,
/// then base levels, then numbered stories by their first number, then the
/// rest alphabetically.
pub fn order_stories(names: &[String], preferred: &[String]) -> Vec<String> {
    let mut rest: Vec<String> = names
        .iter()
        .filter(|n| !preferred.contains(n))
        .cloned()
        .collect();
    rest.sort_by_key(|n| story_key(n));

    let mut ordered = preferred.to_vec();
    ordered.extend(rest);
    ordered
}
