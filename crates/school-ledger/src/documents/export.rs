use serde::Deserialize;
use serde_json::Value;

use super::{french_date, Attachment, RenderError};
use crate::tuition::statement::StatementSummary;

/// UTF-8 byte order mark so spreadsheet applications pick the right encoding.
const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Tabular export payload. Cells may be strings, numbers, booleans or null.
#[derive(Debug, Clone, Deserialize)]
pub struct Spreadsheet {
    #[serde(default)]
    pub filename: Option<String>,
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl Spreadsheet {
    /// Semicolon separated, which is what French-locale Excel expects.
    pub fn to_csv(&self) -> Result<Vec<u8>, RenderError> {
        if self.columns.is_empty() {
            return Err(RenderError::InvalidPayload("columns cannot be empty".into()));
        }
        if let Some(index) = self
            .rows
            .iter()
            .position(|row| row.len() != self.columns.len())
        {
            return Err(RenderError::InvalidPayload(format!(
                "row {} has {} cells, expected {}",
                index + 1,
                self.rows[index].len(),
                self.columns.len()
            )));
        }

        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .from_writer(BOM.to_vec());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(cell_text))?;
        }
        writer
            .into_inner()
            .map_err(|error| RenderError::Io(error.into_error()))
    }

    pub fn into_attachment(self) -> Result<Attachment, RenderError> {
        let bytes = self.to_csv()?;
        let stem = self
            .filename
            .as_deref()
            .map(|name| name.trim_end_matches(".csv").trim_end_matches(".xlsx"))
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("export");
        Ok(Attachment::new(
            format!("{stem}.csv"),
            mime::TEXT_CSV_UTF_8,
            bytes,
        ))
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(true) => "Oui".to_string(),
        Value::Bool(false) => "Non".to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

/// Payment-status listing of a class. Amounts stay numeric so the sheet can sum them.
pub fn class_status_sheet(class_name: &str, summaries: &[StatementSummary]) -> Spreadsheet {
    let columns = [
        "Matricule",
        "Nom et prénoms",
        "Total dû",
        "Total payé",
        "Reste à payer",
        "Statut",
        "Prochaine échéance",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    let rows = summaries
        .iter()
        .map(|summary| {
            vec![
                Value::from(summary.matricule.clone()),
                Value::from(summary.full_name.clone()),
                Value::from(summary.total_due),
                Value::from(summary.total_paid),
                Value::from(summary.balance),
                Value::from(summary.status_label.clone()),
                summary
                    .next_due_date
                    .map(|date| Value::from(french_date(date)))
                    .unwrap_or(Value::Null),
            ]
        })
        .collect();

    Spreadsheet {
        filename: Some(format!("etat-paiements-{class_name}")),
        columns,
        rows,
    }
}
