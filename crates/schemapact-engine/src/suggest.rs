//! Typo suggestions for missing tables and columns
//!
//! A cheap nearest-name lookup: candidates of similar length sharing a
//! short prefix or suffix with the missing name. Suggestions only improve
//! messages; they never change severity.

/// Prefix/suffix length compared for table names
pub const TABLE_AFFIX_LEN: usize = 3;

/// Prefix/suffix length compared for column names
pub const COLUMN_AFFIX_LEN: usize = 2;

/// Largest length difference still considered similar
pub const MAX_LENGTH_DIFF: usize = 2;

/// Most suggestions returned
pub const MAX_SUGGESTIONS: usize = 3;

fn prefix(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn suffix(s: &str, n: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(n)).collect()
}

/// Whether `candidate` looks like a misspelling of `target`
pub fn is_similar(target: &str, candidate: &str, affix_len: usize) -> bool {
    let target = target.to_lowercase();
    let candidate = candidate.to_lowercase();

    if target.chars().count().abs_diff(candidate.chars().count()) > MAX_LENGTH_DIFF {
        return false;
    }

    target.starts_with(&prefix(&candidate, affix_len))
        || candidate.starts_with(&prefix(&target, affix_len))
        || target.ends_with(&suffix(&candidate, affix_len))
        || candidate.ends_with(&suffix(&target, affix_len))
}

/// Up to three similar names, in candidate order
pub fn similar_names<'a, I>(target: &str, candidates: I, affix_len: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .filter(|candidate| is_similar(target, candidate, affix_len))
        .take(MAX_SUGGESTIONS)
        .map(str::to_string)
        .collect()
}

/// Similar table names
pub fn similar_tables<'a, I>(target: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    similar_names(target, candidates, TABLE_AFFIX_LEN)
}

/// Similar column names
pub fn similar_columns<'a, I>(target: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    similar_names(target, candidates, COLUMN_AFFIX_LEN)
}

/// "Did you mean: a, b?" or the fallback advice
pub fn did_you_mean(similar: &[String], fallback: &str) -> String {
    if similar.is_empty() {
        fallback.to_string()
    } else {
        format!("Did you mean: {}?", similar.join(", "))
    }
}
