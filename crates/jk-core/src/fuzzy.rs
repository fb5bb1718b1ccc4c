//! Fuzzy scoring for job paths.
//!
//! Ranks discovered job paths against a free-text query so `jk search
//! --query` can surface `Tools/ada/master` for "ada" without an exact
//! glob. Scores are additive across match layers; only paths with a
//! component- or word-level hit receive the character-similarity bonus,
//! which keeps unrelated paths at zero.

/// A scored candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub value: String,
    pub score: i64,
}

/// Scores `items` against `query` and returns matches ordered best-first.
/// Ties prefer the shorter path. An empty query matches nothing.
pub fn search(query: &str, items: &[String], max_results: usize) -> Vec<Match> {
    if query.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<Match> = items
        .iter()
        .filter_map(|item| {
            let score = score(query, item);
            (score > 0).then(|| Match {
                value: item.clone(),
                score,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.value.len().cmp(&b.value.len()))
    });

    if max_results > 0 && matches.len() > max_results {
        matches.truncate(max_results);
    }
    matches
}

fn score(query: &str, target: &str) -> i64 {
    let query = query.to_lowercase();
    let target_lower = target.to_lowercase();
    let mut score = 0i64;

    if query == target_lower {
        return 1000;
    }

    if target_lower.contains(&query) {
        score += if target_lower.starts_with(&query) {
            500
        } else {
            300
        };
    }

    let query_parts: Vec<&str> = query
        .split('/')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let target_parts: Vec<&str> = target_lower.split('/').collect();

    let mut component_matched = false;
    for q_part in &query_parts {
        for t_part in &target_parts {
            if q_part == t_part {
                score += 100;
                component_matched = true;
            } else if t_part.contains(q_part) {
                score += 50;
                component_matched = true;
            }
        }
    }

    let query_words: Vec<&str> = query.split(['/', ' ']).filter(|w| !w.is_empty()).collect();
    let target_words: Vec<&str> = target_lower
        .split(['/', ' '])
        .filter(|w| !w.is_empty())
        .collect();

    let mut word_matched = false;
    for q_word in &query_words {
        for t_word in &target_words {
            if q_word == t_word {
                score += 80;
                word_matched = true;
            } else if t_word.starts_with(q_word) {
                score += 40;
                word_matched = true;
            } else if t_word.contains(q_word) {
                score += 20;
                word_matched = true;
            }
        }
    }

    if (component_matched || word_matched) && query.chars().count() > 3 {
        score += common_chars(&query, &target_lower) * 2;
    }

    // Prefer mainline branches over PR branches on equal relevance.
    if score > 0
        && (target_lower.ends_with("/master")
            || target_lower.ends_with("/main")
            || target_lower.ends_with("/develop"))
    {
        score += 50;
    }

    score
}

fn common_chars(query: &str, target: &str) -> i64 {
    let mut available = std::collections::HashMap::new();
    for ch in target.chars() {
        *available.entry(ch).or_insert(0i64) += 1;
    }

    let mut common = 0;
    for ch in query.chars() {
        if let Some(count) = available.get_mut(&ch) {
            if *count > 0 {
                *count -= 1;
                common += 1;
            }
        }
    }
    common
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_match_wins() {
        let items = paths(&["Tools/ada/master", "ada", "Tools/ada/PR-22"]);
        let results = search("ada", &items, 0);
        assert_eq!(results[0].value, "ada");
        assert_eq!(results[0].score, 1000);
    }

    #[test]
    fn test_component_match_ranks_mainline_first() {
        let items = paths(&["Tools/ada/PR-22", "Tools/ada/master"]);
        let results = search("ada", &items, 0);
        assert_eq!(results[0].value, "Tools/ada/master");
    }

    #[test]
    fn test_unrelated_paths_score_zero() {
        let items = paths(&["Infra/terraform/prod"]);
        assert!(search("ada", &items, 0).is_empty());
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        let items = paths(&["Tools/ada/master"]);
        assert!(search("", &items, 0).is_empty());
    }

    #[test]
    fn test_max_results_truncates() {
        let items = paths(&["ada-one", "ada-two", "ada-three"]);
        assert_eq!(search("ada", &items, 2).len(), 2);
    }
}
