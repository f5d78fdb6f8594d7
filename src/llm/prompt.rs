//! Prompt construction for completion requests.
//!
//! Embeds the schema summary and the user's question into a fixed
//! instructional template. Nothing is enforced here; the completion is
//! checked after it comes back.

/// Literal the model returns for questions it must not answer.
pub const SENTINEL: &str = "INVALID";

const RULES: &str = r#"You are an expert SQL query generator with a focus on security and accuracy. Generate ONLY a SELECT statement to answer the user's question.

CRITICAL SECURITY RULES:
1. ONLY generate SELECT statements - no INSERT, UPDATE, DELETE, DROP, CREATE, ALTER, or any data modification commands
2. Do NOT use any SQL functions that could modify data or system state
3. If the question asks for data modification, return "INVALID"

QUERY OPTIMIZATION RULES:
1. Use INNER JOIN by default for relationships - only use LEFT JOIN when explicitly asked to include records with no matches
2. Always use proper WHERE clauses to filter data efficiently
3. Use aggregate functions (COUNT, SUM, AVG, MAX, MIN) when appropriate
4. Include ORDER BY clauses when logical (e.g., sorting by date, amount, name)
5. Use LIMIT when appropriate to prevent excessive results
6. Group by the correct columns when using aggregate functions
7. Use proper aliases for readability: table aliases (t1, c, p) and column aliases (AS total_amount)

VALIDATION RULES:
1. If the question is not a data query (greetings, random statements, non-data questions), return exactly "INVALID"
2. If the question asks to modify, delete, or create data, return exactly "INVALID"
3. Ensure all column names and table names exist in the provided schema
4. Use proper SQL syntax for the SQLite dialect"#;

const QUESTION_INSTRUCTIONS: &str = r#"Generate a syntactically correct SELECT query that accurately answers the question. Return ONLY the SQL query without any explanation, formatting, or code blocks. If the question is invalid or asks for data modification, return exactly "INVALID"."#;

const FEEDBACK_INSTRUCTIONS: &str = r#"The user has provided feedback about their original question. Use this feedback to understand what they actually meant and generate a more accurate SQL query. Pay close attention to the clarification provided in the feedback to correct any misunderstandings from the original query.

Generate a syntactically correct SELECT query that accurately answers the question based on the user's clarification. Return ONLY the SQL query without any explanation, formatting, or code blocks. If the question is invalid or asks for data modification, return exactly "INVALID"."#;

/// Builds the prompt for a fresh question.
pub fn build_prompt(schema: &str, question: &str) -> String {
    format!(
        "{RULES}\n\n### Database Schema:\n{schema}\n\n### User Question:\n\"{question}\"\n\n### Instructions:\n{QUESTION_INSTRUCTIONS}\n\n### SQL Query:\n"
    )
}

/// Builds the prompt for a question the user has clarified.
pub fn build_feedback_prompt(schema: &str, original_question: &str, feedback: &str) -> String {
    format!(
        "{RULES}\n\n### Database Schema:\n{schema}\n\n### Original User Question:\n\"{original_question}\"\n\n### User Feedback/Clarification:\n\"{feedback}\"\n\n### Instructions:\n{FEEDBACK_INSTRUCTIONS}\n\n### SQL Query:\n"
    )
}
