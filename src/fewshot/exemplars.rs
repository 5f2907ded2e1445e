use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExemplarError {
    #[error("failed to read exemplar file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid exemplar file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("exemplar file contains no exemplars")]
    Empty,
}

/// A hand-written question with the query and answer that resolve it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exemplar {
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "SQLQuery")]
    pub sql: String,
    #[serde(rename = "SQLResult")]
    pub result_template: String,
    #[serde(rename = "Answer")]
    pub answer_template: String,
}

impl Exemplar {
    fn new(question: &str, sql: &str, answer: &str) -> Self {
        Self {
            question: question.to_string(),
            sql: sql.trim().to_string(),
            result_template: "Result of the SQL query".to_string(),
            answer_template: answer.to_string(),
        }
    }

    /// Text handed to the embedder: every field, in field-name order.
    pub fn embedding_text(&self) -> String {
        [
            self.answer_template.as_str(),
            self.question.as_str(),
            self.sql.as_str(),
            self.result_template.as_str(),
        ]
        .join(" ")
    }
}

/// The built-in t-shirt inventory exemplars.
pub fn default_exemplars() -> Vec<Exemplar> {
    vec![
        Exemplar::new(
            "How many t-shirts do we have left for Nike in XS size and white color?",
            "SELECT sum(stock_quantity) FROM t_shirts WHERE brand = 'Nike' AND color = 'White' AND size = 'XS'",
            "The total stock for Nike t-shirts in XS size and white color is [some_number].",
        ),
        Exemplar::new(
            "How much is the total price of the inventory for all S-size t-shirts?",
            "SELECT SUM(price*stock_quantity) FROM t_shirts WHERE size = 'S'",
            "The total price of inventory for all small size T-shirts is 19117.",
        ),
        Exemplar::new(
            "If we have to sell all the Levi’s T-shirts today with discounts applied. How much revenue our store will generate (post discounts)?",
            r#"
SELECT sum(a.total_amount * ((100-COALESCE(d.pct_discount,0))/100)) as total_revenue
FROM (
    SELECT sum(price*stock_quantity) as total_amount, t_shirt_id
    FROM t_shirts
    WHERE brand = 'Levi'
    GROUP BY t_shirt_id
) a
LEFT JOIN discounts d ON a.t_shirt_id = d.t_shirt_id
"#,
            "The total revenue from Levi t-shirts, after applying discounts, is 19126.10.",
        ),
        Exemplar::new(
            "If we have to sell all the Levi’s T-shirts today. How much revenue our store will generate without discount?",
            "SELECT SUM(price * stock_quantity) FROM t_shirts WHERE brand = 'Levi'",
            "The total value of Levi t-shirts in stock is 20581.",
        ),
        Exemplar::new(
            "How many white color Levi's shirts do I have?",
            "SELECT sum(stock_quantity) FROM t_shirts WHERE brand = 'Levi' AND color = 'White'",
            "There are 100 white Levi's shirts available.",
        ),
    ]
}

/// Loads exemplars from a JSON array using the `Question`/`SQLQuery`/`SQLResult`/`Answer` keys.
pub fn load_exemplars(path: &Path) -> Result<Vec<Exemplar>, ExemplarError> {
    let content = std::fs::read_to_string(path)?;
    let exemplars: Vec<Exemplar> = serde_json::from_str(&content)?;
    if exemplars.is_empty() {
        return Err(ExemplarError::Empty);
    }
    Ok(exemplars)
}
