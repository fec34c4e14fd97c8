//! Fixed prompt templates for the sales dataset.
//!
//! The table schema is hard-coded here on purpose: the demo answers questions
//! about exactly one table, and the translator's whole job is embedding the
//! question into this preamble.

/// Schema + rules + few-shot examples for text-to-SQL generation.
pub const TEXT_TO_SQL_PREAMBLE: &str = r#"You are a SQL expert tasked with generating ONLY valid PostgreSQL queries.

**Database Schema:**
- Table: sales
- Columns:
  1) date (DATE)
  2) week_day (VARCHAR)
  3) hour (VARCHAR)
  4) ticket_number (VARCHAR)
  5) waiter (INT)
  6) product_name (VARCHAR)
  7) quantity (INT)
  8) unitary_price (DECIMAL(10,2))
  9) total (DECIMAL(10,2))

**Constraints & Rules:**
1) Output must be strictly valid PostgreSQL (no MySQL or other dialect).
2) Use correct column names (e.g., 'product_name', 'quantity', 'week_day', etc.).
3) Include a semicolon at the end of the query.
4) Never include comments, markdown, or extraneous text, just the SQL.
5) Format the SQL nicely if possible, but correctness is paramount.

**Examples:**

Example A (simple):
- Question: "Which 5 products are the most sold overall?"
- SQL:
  SELECT product_name, SUM(quantity) AS total_sold
  FROM sales
  GROUP BY product_name
  ORDER BY total_sold DESC
  LIMIT 5;

Example B (with a condition):
- Question: "What is the total money spent on Fridays?"
- SQL:
  SELECT SUM(total) AS total_spent
  FROM sales
  WHERE week_day = 'Friday';

Example C (joining multiple conditions):
- Question: "Which hour of Friday has the highest sum of total?"
- SQL:
  SELECT hour, SUM(total) AS total_per_hour
  FROM sales
  WHERE week_day = 'Friday'
  GROUP BY hour
  ORDER BY total_per_hour DESC
  LIMIT 1;

Example D (single best or worst):
- Question: "What is the least sold product?"
- SQL:
  SELECT product_name, SUM(quantity) AS total_quantity
  FROM sales
  GROUP BY product_name
  ORDER BY total_quantity ASC
  LIMIT 1;"#;

/// System message for summarization with chat-style backends.
pub const SUMMARY_SYSTEM: &str = "You are a helpful assistant summarizing SQL data.";

/// The user-turn part of the translation prompt.
pub fn translate_prompt(question: &str) -> String {
    format!("**Now your turn**:\n\nQuestion: \"{}\"\n\nSQL:", question)
}

/// One-short-sentence summary prompt. Explicitly forbids mentioning SQL or
/// raw data, and asks for the final sentence in quotes so the extraction
/// heuristic has something to anchor on.
pub fn summarize_prompt(question: &str, sql: &str, results_json: &str) -> String {
    format!(
        r#"You are a helpful data assistant who explains results in exactly one short sentence.
- Do NOT prefix with 'Answer:' or 'Conclusion:' or any label.
- No mention of SQL or raw data. Only the key insight in a friendly style.

Example:
If the results show product='Alfajor DDL' with 123,
respond: "Alfajor DDL is our top seller with 123 units!"

Now do the same for:
Question: {question}
SQL: {sql}
Results: {results_json}

Only produce your final sentence in quotes."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_prompt_embeds_the_question() {
        let p = translate_prompt("What is the total money spent on Fridays?");
        assert!(p.contains("Question: \"What is the total money spent on Fridays?\""));
        assert!(p.ends_with("SQL:"));
    }

    #[test]
    fn preamble_names_every_sales_column() {
        for col in [
            "date", "week_day", "hour", "ticket_number", "waiter",
            "product_name", "quantity", "unitary_price", "total",
        ] {
            assert!(TEXT_TO_SQL_PREAMBLE.contains(col), "missing column {}", col);
        }
    }

    #[test]
    fn summarize_prompt_forbids_sql_talk() {
        let p = summarize_prompt("q", "SELECT 1;", "[]");
        assert!(p.contains("No mention of SQL or raw data"));
        assert!(p.contains("Results: []"));
    }
}
