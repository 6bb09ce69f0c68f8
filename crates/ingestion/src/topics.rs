//! Topic selection by name keywords.

use crate::api_client::Topic;

/// Keywords matching the "Economy & Growth" topic.
pub const ECONOMY_GROWTH_KEYWORDS: &[&str] = &["economy", "growth"];

/// Keywords matching "External Debt" and related debt topics.
pub const EXTERNAL_DEBT_KEYWORDS: &[&str] = &["debt"];

/// Default keyword sets for a load.
pub fn default_keyword_sets() -> Vec<Vec<String>> {
    [ECONOMY_GROWTH_KEYWORDS, EXTERNAL_DEBT_KEYWORDS]
        .iter()
        .map(|set| set.iter().map(|k| k.to_string()).collect())
        .collect()
}

/// Ids of topics whose name contains every keyword, ignoring case.
pub fn pick_topic_ids<S: AsRef<str>>(topics: &[Topic], keywords: &[S]) -> Vec<String> {
    topics
        .iter()
        .filter(|topic| {
            let name = topic.value.to_lowercase();
            keywords
                .iter()
                .all(|kw| name.contains(&kw.as_ref().to_lowercase()))
        })
        .map(|topic| topic.id.clone())
        .collect()
}

/// Concatenate the matches of several keyword sets, dropping repeated ids
/// while keeping first-seen order.
pub fn select_topic_ids<S: AsRef<str>>(topics: &[Topic], keyword_sets: &[Vec<S>]) -> Vec<String> {
    let mut selected: Vec<String> = Vec::new();
    for keywords in keyword_sets {
        for id in pick_topic_ids(topics, keywords) {
            if !selected.contains(&id) {
                selected.push(id);
            }
        }
    }
    selected
}
