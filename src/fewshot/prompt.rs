use crate::fewshot::exemplars::Exemplar;
use std::fmt::Write;

const DUCKDB_PREFIX: &str = r#"You are a DuckDB expert. Given an input question, first create a syntactically correct DuckDB query to run, then look at the results of the query and return the answer to the input question.
Unless the user specifies in the question a specific number of examples to obtain, query for at most {top_k} results using the LIMIT clause as per DuckDB. You can order the results to return the most informative data in the database.
Never query for all columns from a table. You must query only the columns that are needed to answer the question. Wrap each column name in double quotes (") to denote them as delimited identifiers.
Pay attention to use only the column names you can see in the tables below. Be careful to not query for columns that do not exist. Also, pay attention to which column is in which table.
Pay attention to use the current_date function to get the current date, if the question involves "today".

Use the following format:

Question: Question here
SQLQuery: SQL Query to run
SQLResult: Result of the SQLQuery
Answer: Final answer here"#;

pub const SQL_STOP: &str = "\nSQLResult:";
pub const ANSWER_STOP: &str = "\nQuestion:";

/// Builds few-shot prompts from instructions, exemplars and schema info.
pub struct PromptAssembler {
    top_k: usize,
}

impl PromptAssembler {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Prefix, exemplars and suffix separated by blank lines.
    pub fn build(&self, question: &str, table_info: &str, exemplars: &[&Exemplar]) -> String {
        let mut sections = Vec::with_capacity(exemplars.len() + 2);
        sections.push(DUCKDB_PREFIX.replace("{top_k}", &self.top_k.to_string()));
        sections.extend(exemplars.iter().map(|e| format_exemplar(e)));
        sections.push(format!(
            "Only use the following tables:\n{}\n\nQuestion: {}",
            table_info, question
        ));
        sections.join("\n\n")
    }

    /// The prompt the model completes with a query.
    pub fn sql_prompt(&self, prompt: &str) -> String {
        format!("{}\nSQLQuery:", prompt)
    }

    /// The prompt the model completes with an answer, given the query and its result.
    pub fn answer_prompt(&self, prompt: &str, sql: &str, result: &str) -> String {
        format!("{}\nSQLQuery:{}\nSQLResult: {}\nAnswer:", prompt, sql, result)
    }
}

fn format_exemplar(exemplar: &Exemplar) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "\nQuestion: {}\nSQLQuery: {}\nSQLResult: {}\nAnswer: {}",
        exemplar.question, exemplar.sql, exemplar.result_template, exemplar.answer_template
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fewshot::exemplars::default_exemplars;

    #[test]
    fn test_prompt_layout() {
        let exemplars = default_exemplars();
        let selected = vec![&exemplars[4], &exemplars[0]];
        let assembler = PromptAssembler::new(7);

        let prompt = assembler.build(
            "How many red shirts?",
            "CREATE TABLE t_shirts (\"brand\" VARCHAR);",
            &selected,
        );

        assert!(prompt.starts_with("You are a DuckDB expert."));
        assert!(prompt.contains("query for at most 7 results"));
        assert!(!prompt.contains("{top_k}"));

        // Exemplars appear in the order given, after the prefix
        let levi = prompt.find("How many white color Levi's shirts do I have?").unwrap();
        let nike = prompt.find("for Nike in XS size").unwrap();
        let tables = prompt.find("Only use the following tables:").unwrap();
        assert!(levi < nike && nike < tables);
        assert!(prompt.contains("Answer: Final answer here\n\n\nQuestion: How many white color"));
        assert!(prompt.ends_with("CREATE TABLE t_shirts (\"brand\" VARCHAR);\n\nQuestion: How many red shirts?"));
    }

    #[test]
    fn test_without_exemplars() {
        let prompt = PromptAssembler::new(5).build("q", "info", &[]);
        assert!(prompt.contains("Answer: Final answer here\n\nOnly use the following tables:\ninfo"));
    }

    #[test]
    fn test_continuations() {
        let assembler = PromptAssembler::new(5);
        assert_eq!(assembler.sql_prompt("P"), "P\nSQLQuery:");
        assert_eq!(
            assembler.answer_prompt("P", " SELECT 1", "[(1,)]"),
            "P\nSQLQuery: SELECT 1\nSQLResult: [(1,)]\nAnswer:"
        );
    }
}
