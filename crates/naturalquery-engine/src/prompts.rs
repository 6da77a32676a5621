//! Prompt texts for every pipeline stage
//!
//! Each builder returns the complete two-turn conversation for one call.

use naturalquery_core::{Conversation, Language};

/// Query the model is told to return when the schema cannot answer
pub const UNANSWERABLE_SENTINEL: &str = "SELECT 'Answer is not in the database' AS Response;";

pub const ENRICH_SYSTEM: &str = "You are a helpful coding assistant. Add comments to all columns \
to describe them, do it for all tables provided.";

pub const GENERATE_SYSTEM: &str = "You are a helpful SQL developer.\n\
- Reply with exactly one SQL code snippet, for example: ```sql select * from table```.\n\
- If the question provided cannot be answered in the database return \
```sql\n SELECT 'Answer is not in the database' AS Response;```";

pub const CORRECT_SYSTEM: &str = "You are a helpful SQL developer.\n\
- Look at the error and the DDL to find a fix.\n\
- Make sure all join keys are consistent with the database schema or DDL.\n\
- Reply with exactly one corrected SQL code snippet in a ```sql block.";

pub const INTERPRET_SYSTEM: &str = "You are a helpful assistant";

/// Ask for column comments on raw DDL
pub fn enrich(ddl: &str) -> Conversation {
    Conversation::with_system(
        ENRICH_SYSTEM,
        format!("Enhance the following SQL DDL with comments:\n{}", ddl),
    )
}

/// Ask for one SQL statement answering `question`
pub fn generate(ddl: &str, dialect: &str, question: &str) -> Conversation {
    Conversation::with_system(
        GENERATE_SYSTEM,
        format!(
            "Depending on the following SQL DDL:\n{}\nAnswer the question in SQL for {}: {}\n",
            ddl, dialect, question
        ),
    )
}

/// Ask for a fixed statement given the database error
pub fn correct(error: &str, ddl: &str) -> Conversation {
    Conversation::with_system(
        CORRECT_SYSTEM,
        format!(
            "Fix the SQL query based on the error \n {}.\nSQL DDL is the following:\n {}",
            error, ddl
        ),
    )
}

/// Ask for a terse answer from the executed query and its rows
///
/// For a non-English `language` the system prompt also demands the answer in
/// that language.
pub fn interpret(sql: &str, results: &str, question: &str, language: Language) -> Conversation {
    let mut system = INTERPRET_SYSTEM.to_string();
    if !language.is_english() {
        let name = language.name();
        system.push_str(&format!(
            " who talks {name}.\n- Reply in {name} language.\n- Don't use English in your response."
        ));
    }

    Conversation::with_system(
        system,
        format!(
            "Answer the following question based on this query {} and the results of the \
             execution of the query: {}\n{}.\nDon't give explanations, just answer the question.",
            sql, results, question
        ),
    )
}

pub const TO_ENGLISH_SYSTEM: &str = "You are a helpful assistant translating to English the \
provided text. Provide only the translated text as response.";

pub fn to_english(text: &str, source: Language) -> Conversation {
    Conversation::with_system(
        TO_ENGLISH_SYSTEM,
        format!("Translate this text from {} to English:\n{}", source.name(), text),
    )
}

pub fn from_english(text: &str, target: Language) -> Conversation {
    Conversation::with_system(
        format!(
            "You are a helpful assistant translating to {} the provided text. \
             Provide only the translated text as response.",
            target.name()
        ),
        format!("Translate this text from English to {}:\n{}", target.name(), text),
    )
}
