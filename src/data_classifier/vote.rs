/// Returns the most frequent label.
///
/// Ties go to the label seen first in `labels`, so the answer depends only
/// on neighbor order and never on hash iteration order.
pub fn majority_vote<S: AsRef<str>>(labels: &[S]) -> Option<&str> {
    let mut tallies: Vec<(&str, usize)> = Vec::new();
    for label in labels {
        let label = label.as_ref();
        match tallies.iter_mut().find(|(seen, _)| *seen == label) {
            Some((_, count)) => *count += 1,
            None => tallies.push((label, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (label, count) in tallies {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label)
}
