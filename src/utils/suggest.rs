fn normalize_token(value: &str) -> Vec<char> {
    value
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a == b {
        return 0;
    }
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn contains(haystack: &[char], needle: &[char]) -> bool {
    needle.len() <= haystack.len() && haystack.windows(needle.len()).any(|w| w == needle)
}

fn score_candidate(input: &[char], candidate: &str) -> usize {
    let other = normalize_token(candidate);
    if input.is_empty() || other.is_empty() {
        return usize::MAX;
    }
    if input == other.as_slice() {
        return 0;
    }
    if contains(&other, input) || contains(input, &other) {
        return 1;
    }
    levenshtein(input, &other)
}

fn max_allowed_distance(len: usize) -> usize {
    match len {
        0 => 0,
        1..=4 => 1,
        5..=8 => 2,
        _ => ((len as f32) * 0.35).floor().max(3.0) as usize,
    }
}

/// Closest candidates to `input` (case and punctuation insensitive), best first.
/// Used for "did you mean" hints on unknown tools and fields.
pub fn suggest(input: &str, candidates: &[String], limit: usize) -> Vec<String> {
    let needle = normalize_token(input);
    if needle.is_empty() || candidates.is_empty() {
        return Vec::new();
    }
    let allowed = max_allowed_distance(needle.len());

    let mut scored: Vec<(&String, usize)> = candidates
        .iter()
        .take(2000)
        .map(|candidate| (candidate, score_candidate(&needle, candidate)))
        .filter(|(_, score)| *score <= allowed)
        .collect();

    scored.sort_by(|a, b| {
        a.1.cmp(&b.1)
            .then_with(|| a.0.len().cmp(&b.0.len()))
            .then_with(|| a.0.cmp(b.0))
    });

    let mut out: Vec<String> = Vec::new();
    for (candidate, _) in scored {
        if out.contains(candidate) {
            continue;
        }
        out.push(candidate.clone());
        if out.len() >= limit.max(1) {
            break;
        }
    }
    out
}
