//! Business record storage and analytics.
//!
//! Ingested tabular rows live here twice over: as queryable SQL rows for
//! the aggregation and chart modes, and (via [`BusinessRecord::sentence`])
//! as natural-language text handed to the retrieval index.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use sage_core::Result;

/// One ingested business row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BusinessRecord {
    pub customer_name: String,
    pub finance_type: String,
    pub product: String,
    pub amount: f64,
    pub month: String,
    pub quantity: i64,
}

impl BusinessRecord {
    /// Render the row as a sentence for the text index, so retrieval can
    /// answer questions about tabular data without a SQL planner.
    pub fn sentence(&self) -> String {
        format!(
            "Customer {} made a {} purchase of {} worth {} in {}. Sales count: {}.",
            self.customer_name, self.finance_type, self.product, self.amount, self.month,
            self.quantity
        )
    }
}

/// Chart payload in the shape the frontend chart widget consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartPayload {
    #[serde(rename = "type")]
    pub chart_type: String,
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartDataset {
    pub label: String,
    pub data: Vec<f64>,
}

/// Result of the top-customer aggregation.
#[derive(Debug, Clone, Serialize)]
pub struct TopCustomer {
    pub customer_name: String,
    pub total: f64,
}

impl TopCustomer {
    pub fn answer(&self) -> String {
        format!(
            "{} spent the most with a total of {}.",
            self.customer_name, self.total
        )
    }
}

/// SQLite-backed record repository.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct MonthTotalRow {
    month: String,
    total: f64,
}

/// Calendar position for chart label ordering. Unknown labels sort last,
/// alphabetically among themselves.
fn month_ordinal(month: &str) -> (usize, String) {
    const MONTHS: [&str; 12] = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];
    let lowered = month.to_lowercase();
    let pos = MONTHS
        .iter()
        .position(|m| *m == lowered)
        .unwrap_or(MONTHS.len());
    (pos, lowered)
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a batch of records. Returns the number inserted.
    pub async fn insert_records(&self, records: &[BusinessRecord]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(
                "INSERT INTO business_records
                   (customer_name, finance_type, product, amount, month, quantity)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&record.customer_name)
            .bind(&record.finance_type)
            .bind(&record.product)
            .bind(record.amount)
            .bind(&record.month)
            .bind(record.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            subsystem = "ledger",
            component = "records",
            op = "insert",
            row_count = records.len(),
            "Inserted business records"
        );
        Ok(records.len() as u64)
    }

    pub async fn count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM business_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Total sales per month as a bar chart payload, months in calendar
    /// order.
    pub async fn sales_by_month(&self) -> Result<ChartPayload> {
        let mut rows: Vec<MonthTotalRow> = sqlx::query_as(
            "SELECT month, SUM(amount) AS total
             FROM business_records
             GROUP BY month",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.sort_by_key(|r| month_ordinal(&r.month));

        let (labels, data) = rows.into_iter().map(|r| (r.month, r.total)).unzip();

        Ok(ChartPayload {
            chart_type: "bar".to_string(),
            labels,
            datasets: vec![ChartDataset {
                label: "Sales by Month".to_string(),
                data,
            }],
        })
    }

    /// Customer with the highest total spend. `None` when no records
    /// exist.
    pub async fn top_customer(&self) -> Result<Option<TopCustomer>> {
        let row: Option<(String, f64)> = sqlx::query_as(
            "SELECT customer_name, SUM(amount) AS total
             FROM business_records
             GROUP BY customer_name
             ORDER BY total DESC
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(customer_name, total)| TopCustomer {
            customer_name,
            total,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_rendering() {
        let record = BusinessRecord {
            customer_name: "Alice".to_string(),
            finance_type: "credit".to_string(),
            product: "Laptop".to_string(),
            amount: 1200.5,
            month: "March".to_string(),
            quantity: 2,
        };
        assert_eq!(
            record.sentence(),
            "Customer Alice made a credit purchase of Laptop worth 1200.5 in March. \
             Sales count: 2."
        );
    }

    #[test]
    fn test_month_ordinal_calendar_order() {
        assert!(month_ordinal("January") < month_ordinal("February"));
        assert!(month_ordinal("December") < month_ordinal("Q5"));
    }

    #[test]
    fn test_top_customer_answer() {
        let top = TopCustomer {
            customer_name: "Bob".to_string(),
            total: 340.0,
        };
        assert_eq!(top.answer(), "Bob spent the most with a total of 340.");
    }

    #[test]
    fn test_chart_payload_wire_shape() {
        let payload = ChartPayload {
            chart_type: "bar".to_string(),
            labels: vec!["January".to_string()],
            datasets: vec![ChartDataset {
                label: "Sales by Month".to_string(),
                data: vec![10.0],
            }],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "bar");
        assert_eq!(json["datasets"][0]["label"], "Sales by Month");
    }
}
