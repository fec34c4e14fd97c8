//! Free-text extraction heuristics for model replies.
//!
//! Model backends answer in prose; these functions pull the usable part out.
//! Both are best-effort with a documented fallback order and never fail —
//! the worst case is returning the whole reply lightly normalized.

use regex::Regex;

/// Extract a SQL statement from a free-text model reply.
///
/// Fallback order:
/// 1. fenced code block tagged `sql`
/// 2. any fenced code block
/// 3. first substring starting with SELECT or WITH up to the next `;`
/// 4. the whole reply
///
/// The winner has whitespace runs collapsed to single spaces and always
/// ends with `;`.
pub fn clean_sql_reply(text: &str) -> String {
    if let Ok(re) = Regex::new(r"(?is)```sql\s*(.*?)\s*```") {
        if let Some(caps) = re.captures(text) {
            return finish_sql(&caps[1]);
        }
    }

    if let Ok(re) = Regex::new(r"(?s)```(.*?)```") {
        if let Some(caps) = re.captures(text) {
            return finish_sql(&caps[1]);
        }
    }

    if let Ok(re) = Regex::new(r"(?is)(?:SELECT|WITH).+?;") {
        if let Some(m) = re.find(text) {
            return finish_sql(m.as_str());
        }
    }

    finish_sql(text)
}

/// Collapse whitespace, trim, and make sure the statement terminator is there.
fn finish_sql(candidate: &str) -> String {
    let mut sql = collapse_whitespace(candidate);
    if !sql.ends_with(';') {
        sql.push(';');
    }
    sql
}

/// Extract the final sentence from a summarizer reply that was instructed to
/// quote its answer. Takes the *last* double-quoted substring; if the model
/// ignored the instruction, returns the whole reply collapsed and trimmed.
pub fn last_quoted_sentence(text: &str) -> String {
    let collapsed = collapse_whitespace(text);

    if let Ok(re) = Regex::new(r#""([^"]+)""#) {
        if let Some(caps) = re.captures_iter(&collapsed).last() {
            return caps[1].to_string();
        }
    }

    collapsed
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
