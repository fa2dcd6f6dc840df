use crate::workorder::model::{Store, WorkOrder};
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

/// Spreadsheet programs need the byte order mark to pick UTF-8.
const UTF8_BOM: &[u8] = "\u{feff}".as_bytes();

pub const CSV_HEADERS: [&str; 9] = [
    "OS",
    "Data",
    "Cliente",
    "Telefone",
    "Equipamento",
    "Defeito/Serviço",
    "Status",
    "Valor",
    "Observações",
];

fn row(record: &WorkOrder) -> [String; 9] {
    [
        record.id.to_string(),
        record.created_date.clone(),
        record.client.clone(),
        record.phone.clone(),
        record.equipment_label.clone(),
        record.diagnosis_or_estimate.clone(),
        record.status.as_str().to_string(),
        record.price.clone(),
        record.notes.clone(),
    ]
}

/// `;`-separated rows in store order. Text fields are quoted, with inner
/// quotes doubled; the id column stays bare.
pub fn to_csv(store: &Store) -> Result<Vec<u8>> {
    let mut buf = UTF8_BOM.to_vec();
    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .quote_style(csv::QuoteStyle::NonNumeric)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(&mut buf);
        writer.write_record(CSV_HEADERS)?;
        for record in &store.records {
            writer.write_record(row(record))?;
        }
        writer.flush()?;
    }
    Ok(buf)
}

/// Write the export next to `output` first, then rename it into place.
/// Returns the number of rows written.
pub fn export_csv(store: &Store, output: &Path) -> Result<usize> {
    let bytes = to_csv(store)?;
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to stage export in {}", dir.display()))?;
    temp.write_all(&bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(path = %output.display(), rows = store.records.len(), "store exported");
    Ok(store.records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workorder::model::{Status, order};
    use tempfile::tempdir;

    fn sample() -> Store {
        let mut first = order(7, "Ana; Maria");
        first.created_date = "02/02/2024".into();
        first.notes = r#"trocar "fusor""#.into();
        first.status = Status::delivered();
        let second = order(8, "Bruno");
        Store {
            last_number: 8,
            records: vec![first, second],
        }
    }

    #[test]
    fn starts_with_bom_and_keeps_column_order() {
        let bytes = to_csv(&sample()).expect("csv");
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).expect("utf8");
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some(r#""OS";"Data";"Cliente";"Telefone";"Equipamento";"Defeito/Serviço";"Status";"Valor";"Observações""#)
        );
        let first = lines.next().expect("first row");
        assert!(first.starts_with(r#"7;"02/02/2024";"Ana; Maria";"#), "{first}");
        assert!(first.contains(r#";"Aprovado - Entregue";"#), "{first}");
        assert!(first.ends_with(r#";"trocar ""fusor"""#), "{first}");
        assert!(lines.next().expect("second row").starts_with("8;"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn export_writes_the_file_and_counts_rows() {
        let tmp = tempdir().expect("tempdir");
        let output = tmp.path().join("relatorios").join("os.csv");
        assert_eq!(export_csv(&sample(), &output).expect("export"), 2);
        assert_eq!(fs::read(&output).expect("read"), to_csv(&sample()).expect("csv"));
    }
}
