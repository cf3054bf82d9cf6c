// Fuzzy matching for "did you mean" suggestions on list, campaign and agent names

/// Levenshtein distance: the minimum number of single-character insertions,
/// deletions and substitutions turning `s1` into `s2`
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for i in 1..=a.len() {
        current[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            current[j] = (previous[j] + 1)
                .min(current[j - 1] + 1)
                .min(previous[j - 1] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Names close to `search`, closest first, at most 5.
///
/// Case-insensitive. Names containing the search text also match, with
/// prefix matches ranked ahead of other substring matches.
pub fn find_near_matches<S: AsRef<str>>(search: &str, names: &[S], max_distance: usize) -> Vec<(String, usize)> {
    let search_lower = search.to_lowercase();
    let mut matches: Vec<(String, usize)> = Vec::new();

    for name in names {
        let name = name.as_ref();
        let name_lower = name.to_lowercase();
        let distance = levenshtein_distance(&search_lower, &name_lower);

        if distance <= max_distance {
            matches.push((name.to_string(), distance));
        } else if !search_lower.is_empty() && name_lower.contains(&search_lower) {
            let extra = name_lower.len() - search_lower.len();
            let penalty = if name_lower.starts_with(&search_lower) { 0 } else { 1 };
            matches.push((name.to_string(), (extra + penalty).min(max_distance)));
        }
    }

    matches.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    matches.truncate(5);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }

    #[test]
    fn test_find_near_matches() {
        let names = ["Vilnius SMB", "Kaunas", "Kaunas retail", "Riga"];

        let matches = find_near_matches("kaunas", &names, 2);
        assert_eq!(matches[0], ("Kaunas".to_string(), 0));
        assert!(matches.iter().any(|(name, _)| name == "Kaunas retail"));

        let matches = find_near_matches("Rgia", &names, 2);
        assert_eq!(matches[0].0, "Riga");

        assert!(find_near_matches("Tallinn", &names, 2).is_empty());
    }
}
